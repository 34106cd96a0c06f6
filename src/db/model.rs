//! Records returned by the image store repositories.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An image registered in the store. Titles are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub id: i64,
    pub title: String,
    pub file_name: String,
    pub byte_len: i64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}
