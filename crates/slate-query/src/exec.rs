//! In-memory filter/sort/skip/take pipeline, evaluated directly against
//! `serde_json::Value` documents. Filtering streams; sorting collects first
//! since it needs the whole matched set; skip/take always apply after sort.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::filter::{Filter, FilterGroup, FilterNode, LogicalOp};
use crate::operator::Operator;
use crate::query::Query;
use crate::sort::{Sort, SortDirection};

pub fn get_path<'a>(doc: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Run the full pipeline over an already-scanned candidate set.
pub fn execute(mut docs: Vec<Map<String, Value>>, query: &Query) -> Vec<Map<String, Value>> {
    docs.retain(|doc| match &query.filter {
        None => true,
        Some(group) => matches_group(doc, group),
    });

    if !query.sort.is_empty() {
        apply_sort(&mut docs, &query.sort);
    }

    let skipped = docs.into_iter().skip(query.skip.unwrap_or(0));
    match query.take {
        Some(take) => skipped.take(take).collect(),
        None => skipped.collect(),
    }
}

pub fn matches_group(doc: &Map<String, Value>, group: &FilterGroup) -> bool {
    match group.logical {
        LogicalOp::And => group.children.iter().all(|child| matches_node(doc, child)),
        LogicalOp::Or => group.children.iter().any(|child| matches_node(doc, child)),
    }
}

pub fn matches_node(doc: &Map<String, Value>, node: &FilterNode) -> bool {
    match node {
        FilterNode::Condition(filter) => matches_filter(doc, filter),
        FilterNode::Group(group) => matches_group(doc, group),
        FilterNode::Not(inner) => !matches_node(doc, inner),
    }
}

fn matches_filter(doc: &Map<String, Value>, filter: &Filter) -> bool {
    let field_value = get_path(doc, &filter.field);

    match filter.operator {
        Operator::Eq => field_value.is_some_and(|v| values_eq(v, &filter.value)),
        Operator::Ne => !field_value.is_some_and(|v| values_eq(v, &filter.value)),
        Operator::Gt => compare(field_value, &filter.value, |o| o == Ordering::Greater),
        Operator::Gte => compare(field_value, &filter.value, |o| o != Ordering::Less),
        Operator::Lt => compare(field_value, &filter.value, |o| o == Ordering::Less),
        Operator::Lte => compare(field_value, &filter.value, |o| o != Ordering::Greater),
        Operator::In => match (field_value, filter.value.as_array()) {
            (Some(v), Some(candidates)) => candidates.iter().any(|c| values_eq(v, c)),
            _ => false,
        },
        Operator::Nin => match (field_value, filter.value.as_array()) {
            (Some(v), Some(candidates)) => !candidates.iter().any(|c| values_eq(v, c)),
            (None, _) => true,
            _ => false,
        },
        Operator::Regex => match (field_value.and_then(Value::as_str), filter.value.as_str()) {
            (Some(haystack), Some(pattern)) => {
                regex::Regex::new(pattern).map(|re| re.is_match(haystack)).unwrap_or(false)
            }
            _ => false,
        },
    }
}

fn values_eq(a: &Value, b: &Value) -> bool {
    a == b
}

fn compare(field_value: Option<&Value>, query_val: &Value, predicate: fn(Ordering) -> bool) -> bool {
    match field_value {
        Some(v) => match compare_two(v, query_val) {
            Some(ord) => predicate(ord),
            None => false,
        },
        None => false,
    }
}

fn compare_two(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

fn apply_sort(docs: &mut [Map<String, Value>], sorts: &[Sort]) {
    docs.sort_by(|a, b| {
        for sort in sorts {
            let a_val = get_path(a, &sort.field);
            let b_val = get_path(b, &sort.field);
            let ord = compare_optional(a_val, b_val);
            let ord = match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_two(a, b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn eq_matches_scalar() {
        let d = doc(json!({"name": "Clark"}));
        let f = Filter::new("name", Operator::Eq, json!("Clark"));
        assert!(matches_filter(&d, &f));
    }

    #[test]
    fn gt_orders_numbers() {
        let d = doc(json!({"age": 30}));
        let f = Filter::new("age", Operator::Gt, json!(18));
        assert!(matches_filter(&d, &f));
        let f = Filter::new("age", Operator::Gt, json!(40));
        assert!(!matches_filter(&d, &f));
    }

    #[test]
    fn in_checks_membership() {
        let d = doc(json!({"status": "active"}));
        let f = Filter::new("status", Operator::In, json!(["active", "pending"]));
        assert!(matches_filter(&d, &f));
    }

    #[test]
    fn not_negates_inner_node() {
        let d = doc(json!({"status": "active"}));
        let inner = FilterNode::Condition(Filter::new("status", Operator::Eq, json!("retired")));
        assert!(matches_node(&d, &FilterNode::Not(Box::new(inner))));
    }

    #[test]
    fn and_group_requires_all() {
        let d = doc(json!({"age": 30, "status": "active"}));
        let group = FilterGroup::and(vec![
            FilterNode::Condition(Filter::new("age", Operator::Gte, json!(18))),
            FilterNode::Condition(Filter::new("status", Operator::Eq, json!("active"))),
        ]);
        assert!(matches_group(&d, &group));
    }

    #[test]
    fn sort_skip_take_pipeline() {
        let docs = vec![
            doc(json!({"_id": "a", "age": 40})),
            doc(json!({"_id": "b", "age": 20})),
            doc(json!({"_id": "c", "age": 30})),
        ];
        let query = Query::new().with_sort(vec![Sort::asc("age")]).with_skip(1).with_take(1);
        let result = execute(docs, &query);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].get("_id"), Some(&json!("c")));
    }

    #[test]
    fn count_short_circuits_via_take_one() {
        let docs = vec![doc(json!({"_id": "a"})), doc(json!({"_id": "b"}))];
        let query = Query::new().with_take(1);
        assert_eq!(execute(docs, &query).len(), 1);
    }
}
