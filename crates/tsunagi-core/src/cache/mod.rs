//! Local query cache boundary.
//!
//! A cached query result is an opaque JSON document addressed by a
//! [`QueryShape`] and the variables it was fetched with. Stale documents
//! read as absent so the query layer refetches them.

mod memory;
mod sqlite;
mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TsunagiError;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use store::CacheStore;

/// The kinds of queries the UI caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryShape {
    /// Media detail page; carries the viewer's `mediaListEntry`.
    AnimePage,
    /// A page of the user's list, filtered by status.
    ListEntries,
    /// A single list entry, keyed by media ID.
    ListEntry,
    /// Cached episodes of one media item on one streaming provider.
    EpisodeList,
    /// Watch marker of one cached episode.
    EpisodeProgress,
}

impl QueryShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnimePage => "AnimePage",
            Self::ListEntries => "ListEntries",
            Self::ListEntry => "ListEntry",
            Self::EpisodeList => "EpisodeList",
            Self::EpisodeProgress => "EpisodeProgress",
        }
    }
}

impl std::fmt::Display for QueryShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document store holding cached query results.
///
/// Implementations must not hold a lock across an `.await`; each call is
/// one short critical section.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Fetch a fresh cached document, `None` when absent or stale.
    async fn read(&self, shape: QueryShape, variables: &Value)
        -> Result<Option<Value>, TsunagiError>;

    /// Store a document, clearing any stale mark on the slot.
    async fn write(
        &self,
        shape: QueryShape,
        variables: &Value,
        document: Value,
    ) -> Result<(), TsunagiError>;

    /// Mark cached results of `shape` stale, either every variables set
    /// (`None`) or exactly one. Returns how many documents were marked.
    async fn invalidate(
        &self,
        shape: QueryShape,
        variables: Option<&Value>,
    ) -> Result<usize, TsunagiError>;
}

/// Document counts, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub documents: usize,
    pub stale: usize,
}

/// Canonical string form of a variables object.
///
/// Keys are sorted at every level before serializing, so equal variables
/// produce the same key whatever map ordering `serde_json` is built with.
pub fn variables_key(variables: &Value) -> String {
    canonical(variables).to_string()
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}
