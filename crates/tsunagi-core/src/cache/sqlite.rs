use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::store::CacheStore;
use super::{variables_key, CacheStats, QueryCache, QueryShape};
use crate::error::TsunagiError;

/// Persistent [`QueryCache`]. The SQLite connection lives on a dedicated
/// thread; this handle talks to it over a channel and is cheap to clone.
#[derive(Clone)]
pub struct SqliteCache {
    tx: mpsc::UnboundedSender<CacheCommand>,
}

enum CacheCommand {
    Get {
        shape: QueryShape,
        key: String,
        reply: oneshot::Sender<Result<Option<String>, TsunagiError>>,
    },
    Put {
        shape: QueryShape,
        key: String,
        document: String,
        reply: oneshot::Sender<Result<(), TsunagiError>>,
    },
    MarkStale {
        shape: QueryShape,
        key: Option<String>,
        reply: oneshot::Sender<Result<usize, TsunagiError>>,
    },
    Clear {
        reply: oneshot::Sender<Result<usize, TsunagiError>>,
    },
    Stats {
        reply: oneshot::Sender<Result<CacheStats, TsunagiError>>,
    },
}

impl SqliteCache {
    pub fn open(path: &Path) -> Result<Self, TsunagiError> {
        Self::spawn(CacheStore::open(path)?)
    }

    pub fn open_memory() -> Result<Self, TsunagiError> {
        Self::spawn(CacheStore::open_memory()?)
    }

    fn spawn(store: CacheStore) -> Result<Self, TsunagiError> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("cache-actor".into())
            .spawn(move || actor_loop(store, rx))?;

        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T, TsunagiError>>) -> CacheCommand,
    ) -> Result<T, TsunagiError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(command(reply));
        rx.await
            .unwrap_or_else(|_| Err(TsunagiError::Cache("cache actor closed".into())))
    }

    /// Drop every cached document.
    pub async fn clear(&self) -> Result<usize, TsunagiError> {
        self.request(|reply| CacheCommand::Clear { reply }).await
    }

    pub async fn stats(&self) -> Result<CacheStats, TsunagiError> {
        self.request(|reply| CacheCommand::Stats { reply }).await
    }
}

#[async_trait]
impl QueryCache for SqliteCache {
    async fn read(
        &self,
        shape: QueryShape,
        variables: &Value,
    ) -> Result<Option<Value>, TsunagiError> {
        let key = variables_key(variables);
        let raw = self
            .request(|reply| CacheCommand::Get { shape, key, reply })
            .await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write(
        &self,
        shape: QueryShape,
        variables: &Value,
        document: Value,
    ) -> Result<(), TsunagiError> {
        let key = variables_key(variables);
        let document = serde_json::to_string(&document)?;
        self.request(|reply| CacheCommand::Put {
            shape,
            key,
            document,
            reply,
        })
        .await
    }

    async fn invalidate(
        &self,
        shape: QueryShape,
        variables: Option<&Value>,
    ) -> Result<usize, TsunagiError> {
        let key = variables.map(variables_key);
        self.request(|reply| CacheCommand::MarkStale { shape, key, reply })
            .await
    }
}

fn actor_loop(store: CacheStore, mut rx: mpsc::UnboundedReceiver<CacheCommand>) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            CacheCommand::Get { shape, key, reply } => {
                let _ = reply.send(store.get(shape, &key));
            }
            CacheCommand::Put {
                shape,
                key,
                document,
                reply,
            } => {
                let result = store.put(shape, &key, &document);
                if let Err(e) = &result {
                    tracing::warn!(shape = %shape, "Failed to write cached document: {e}");
                }
                let _ = reply.send(result);
            }
            CacheCommand::MarkStale { shape, key, reply } => {
                let _ = reply.send(store.mark_stale(shape, key.as_deref()));
            }
            CacheCommand::Clear { reply } => {
                let _ = reply.send(store.clear());
            }
            CacheCommand::Stats { reply } => {
                let _ = reply.send(store.stats());
            }
        }
    }
    tracing::debug!("Cache actor stopped");
}
