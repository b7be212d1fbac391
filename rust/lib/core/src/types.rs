use serde::{Deserialize, Serialize};

/// Paging and filtering of list endpoints, from the query string.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub offset: usize,

    /// Case-insensitive substring filter.
    #[serde(default)]
    pub q: Option<String>,
}

fn default_limit() -> usize {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
            q: None,
        }
    }
}

impl ListParams {
    /// `limit`, but never more than `max`.
    pub fn capped_limit(&self, max: usize) -> usize {
        self.limit.min(max)
    }

    /// The filter, trimmed; `None` when blank.
    pub fn query(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// One page of items plus the total matching count.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Random record id: UUIDv4 without dashes.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
