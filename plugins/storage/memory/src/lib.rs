use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use relay_api::{resolve_range, KvStore, StoreError, StoreFuture};

// ═══════════════════════════════════════════════════════════════
//  Value
// ═══════════════════════════════════════════════════════════════

enum Value {
    Str(String),
    List(VecDeque<String>),
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::protocol(format!(
        "WRONGTYPE key '{key}' holds a value of a different type"
    ))
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

/// In-process store. Для тестов и single-node запуска без внешнего
/// Redis; state is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => Ok(None),
                Some(Value::Str(s)) => Ok(Some(s.clone())),
                Some(Value::List(_)) => Err(wrong_type(key)),
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            entries.insert(key.to_string(), Value::Str(value.to_string()));
            Ok(())
        })
    }

    fn append_to_list<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            match entries
                .entry(key.to_string())
                .or_insert_with(|| Value::List(VecDeque::new()))
            {
                Value::List(list) => {
                    list.push_back(value.to_string());
                    Ok(())
                }
                Value::Str(_) => Err(wrong_type(key)),
            }
        })
    }

    fn pop_front<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            let popped = match entries.get_mut(key) {
                None => return Ok(None),
                Some(Value::Str(_)) => return Err(wrong_type(key)),
                Some(Value::List(list)) => (list.pop_front(), list.is_empty()),
            };
            // Redis drops a list key once it is drained.
            if popped.1 {
                entries.remove(key);
            }
            Ok(popped.0)
        })
    }

    fn range_of_list<'a>(
        &'a self,
        key: &'a str,
        start: i64,
        stop: i64,
    ) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => Ok(Vec::new()),
                Some(Value::Str(_)) => Err(wrong_type(key)),
                Some(Value::List(list)) => Ok(match resolve_range(list.len(), start, stop) {
                    Some((from, to)) => list.range(from..=to).cloned().collect(),
                    None => Vec::new(),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_api::ErrorKind;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_list_fifo() {
        let store = MemoryStore::new();
        store.append_to_list("q", "a").await.unwrap();
        store.append_to_list("q", "b").await.unwrap();

        assert_eq!(store.range_of_list("q", 0, 0).await.unwrap(), vec!["a"]);
        assert_eq!(store.range_of_list("q", 0, -1).await.unwrap(), vec!["a", "b"]);

        assert_eq!(store.pop_front("q").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.pop_front("q").await.unwrap(), Some("b".to_string()));
        assert_eq!(store.pop_front("q").await.unwrap(), None);
        assert!(store.range_of_list("q", 0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_list() {
        let store = MemoryStore::new();
        assert!(store.range_of_list("nope", 0, 0).await.unwrap().is_empty());
        assert_eq!(store.pop_front("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.set("s", "v").await.unwrap();
        let err = store.append_to_list("s", "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);

        store.append_to_list("l", "x").await.unwrap();
        let err = store.get("l").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_drained_list_can_become_string() {
        let store = MemoryStore::new();
        store.append_to_list("k", "x").await.unwrap();
        store.pop_front("k").await.unwrap();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }
}
