use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{variables_key, CacheStats, QueryCache, QueryShape};
use crate::error::TsunagiError;

#[derive(Debug)]
struct Slot {
    document: Value,
    stale: bool,
}

/// Process-local cache. Also the test double for [`QueryCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    slots: Mutex<HashMap<(QueryShape, String), Slot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<(QueryShape, String), Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The stored document regardless of its stale mark.
    pub fn peek(&self, shape: QueryShape, variables: &Value) -> Option<Value> {
        self.slots()
            .get(&(shape, variables_key(variables)))
            .map(|slot| slot.document.clone())
    }

    pub fn is_stale(&self, shape: QueryShape, variables: &Value) -> bool {
        self.slots()
            .get(&(shape, variables_key(variables)))
            .is_some_and(|slot| slot.stale)
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.slots();
        CacheStats {
            documents: slots.len(),
            stale: slots.values().filter(|slot| slot.stale).count(),
        }
    }
}

#[async_trait]
impl QueryCache for MemoryCache {
    async fn read(
        &self,
        shape: QueryShape,
        variables: &Value,
    ) -> Result<Option<Value>, TsunagiError> {
        Ok(self
            .slots()
            .get(&(shape, variables_key(variables)))
            .filter(|slot| !slot.stale)
            .map(|slot| slot.document.clone()))
    }

    async fn write(
        &self,
        shape: QueryShape,
        variables: &Value,
        document: Value,
    ) -> Result<(), TsunagiError> {
        self.slots().insert(
            (shape, variables_key(variables)),
            Slot {
                document,
                stale: false,
            },
        );
        Ok(())
    }

    async fn invalidate(
        &self,
        shape: QueryShape,
        variables: Option<&Value>,
    ) -> Result<usize, TsunagiError> {
        let key = variables.map(variables_key);
        let mut marked = 0;
        for ((slot_shape, slot_key), slot) in self.slots().iter_mut() {
            if *slot_shape != shape {
                continue;
            }
            if key.as_ref().is_some_and(|k| k != slot_key) {
                continue;
            }
            slot.stale = true;
            marked += 1;
        }
        Ok(marked)
    }
}
