use std::time::Duration;

use slate_engine::Document;

/// `(local, remote) -> merged or local or remote`. Returning `None` means
/// "keep local." Called only from the pull path.
pub type ConflictHandler = Box<dyn Fn(&Document, &Document) -> Option<Document> + Send + Sync>;

/// Default conflict handler: the remote row always wins.
pub fn server_wins(_local: &Document, remote: &Document) -> Option<Document> {
    Some(remote.clone())
}

pub struct ReplicationConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub primary_key: String,
    pub updated_at_field: String,
    pub pull_interval: Duration,
    pub push_on_change: bool,
    pub conflict_handler: ConflictHandler,
}

impl ReplicationConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            table: table.into(),
            primary_key: "_id".to_string(),
            updated_at_field: "updated_at".to_string(),
            pull_interval: Duration::from_secs(30),
            push_on_change: true,
            conflict_handler: Box::new(server_wins),
        }
    }

    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = field.into();
        self
    }

    pub fn with_updated_at_field(mut self, field: impl Into<String>) -> Self {
        self.updated_at_field = field.into();
        self
    }

    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = interval;
        self
    }

    pub fn with_push_on_change(mut self, push_on_change: bool) -> Self {
        self.push_on_change = push_on_change;
        self
    }

    pub fn with_conflict_handler(mut self, handler: ConflictHandler) -> Self {
        self.conflict_handler = handler;
        self
    }
}

/// Extra knobs for the durable variant: a persisted retry queue instead of
/// best-effort push.
pub struct DurableConfig {
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub queue_process_interval: Duration,
}

impl Default for DurableConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_interval: Duration::from_secs(10),
            queue_process_interval: Duration::from_secs(5),
        }
    }
}
