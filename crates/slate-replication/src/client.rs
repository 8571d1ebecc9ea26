use serde_json::Value;
use slate_engine::Document;

use crate::config::ReplicationConfig;
use crate::error::ReplicationError;

/// Thin wrapper around a PostgREST-compatible row endpoint: pull rows newer
/// than a watermark, push row-level mutations keyed by primary key.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
    primary_key: String,
    updated_at_field: String,
}

impl RestClient {
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
            primary_key: config.primary_key.clone(),
            updated_at_field: config.updated_at_field.clone(),
        }
    }

    fn auth_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", value.clone());
            let mut bearer = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .unwrap_or_else(|_| value.clone());
            bearer.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, bearer);
        }
        headers
    }

    /// `GET table?updatedAtField=gte.<since>`, or unfiltered when `since` is
    /// `None` (first pull).
    pub async fn pull(&self, since: Option<&str>) -> Result<Vec<Document>, ReplicationError> {
        let mut request = self.http.get(format!("{}/{}", self.base_url, self.table)).headers(self.auth_headers());
        if let Some(since) = since {
            request = request.query(&[(&self.updated_at_field, format!("gte.{since}"))]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ReplicationError::Http(format!("pull failed: HTTP {}", response.status())));
        }
        let rows: Vec<Value> = response.json().await?;
        Ok(rows.into_iter().filter_map(|v| v.as_object().cloned()).collect())
    }

    /// Insert `doc`. A `409 Conflict` means the primary key already exists
    /// remotely, per the REST contract; re-issued as an update rather than
    /// surfaced as a failure.
    pub async fn push_insert(&self, doc: &Document) -> Result<(), ReplicationError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, self.table))
            .headers(self.auth_headers())
            .header("Prefer", "return=minimal")
            .json(doc)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::CONFLICT {
            let id = doc
                .get(&self.primary_key)
                .and_then(Value::as_str)
                .ok_or_else(|| ReplicationError::Http(format!("insert conflict but `{}` is missing or non-string", self.primary_key)))?;
            return self.push_update(id, doc).await;
        }
        Self::expect_success(response).await
    }

    pub async fn push_update(&self, id: &str, doc: &Document) -> Result<(), ReplicationError> {
        let response = self
            .http
            .patch(format!("{}/{}", self.base_url, self.table))
            .query(&[(self.primary_key.as_str(), format!("eq.{id}"))])
            .headers(self.auth_headers())
            .header("Prefer", "return=minimal")
            .json(doc)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    pub async fn push_delete(&self, id: &str) -> Result<(), ReplicationError> {
        let response = self
            .http
            .delete(format!("{}/{}", self.base_url, self.table))
            .query(&[(self.primary_key.as_str(), format!("eq.{id}"))])
            .headers(self.auth_headers())
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        Self::expect_success(response).await
    }

    async fn expect_success(response: reqwest::Response) -> Result<(), ReplicationError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ReplicationError::Http(format!("request failed: HTTP {}", response.status())))
        }
    }
}
