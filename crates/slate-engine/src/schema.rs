use serde::{Deserialize, Serialize};

/// Scalar type constraint used for schema validation on write. Required
/// fields and their declared types are enforced; unknown fields are always
/// allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Number,
    Bool,
    Array,
    Object,
    Any,
}

impl FieldType {
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredField {
    pub name: String,
    pub ty: FieldType,
}

/// Declares the primary-key field, the revision field, required fields for
/// write validation, and which field paths carry a secondary index that the
/// query planner may probe instead of scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub primary_key_field: String,
    pub revision_field: String,
    pub required_fields: Vec<RequiredField>,
    pub indexes: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            primary_key_field: "_id".to_string(),
            revision_field: "_rev".to_string(),
            required_fields: Vec::new(),
            indexes: Vec::new(),
        }
    }
}

impl Schema {
    pub fn new(primary_key_field: impl Into<String>) -> Self {
        Self { primary_key_field: primary_key_field.into(), ..Self::default() }
    }

    pub fn with_revision_field(mut self, field: impl Into<String>) -> Self {
        self.revision_field = field.into();
        self
    }

    pub fn require(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.required_fields.push(RequiredField { name: name.into(), ty });
        self
    }

    pub fn with_index(mut self, field: impl Into<String>) -> Self {
        self.indexes.push(field.into());
        self
    }

    pub fn validate(&self, doc: &crate::document::Document) -> Result<(), crate::error::EngineError> {
        for req in &self.required_fields {
            match doc.get(&req.name) {
                None => {
                    return Err(crate::error::EngineError::SchemaViolation(format!(
                        "missing required field `{}`",
                        req.name
                    )))
                }
                Some(value) if !req.ty.matches(value) => {
                    return Err(crate::error::EngineError::SchemaViolation(format!(
                        "field `{}` has wrong type",
                        req.name
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
