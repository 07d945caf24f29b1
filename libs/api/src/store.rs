use std::future::Future;
use std::pin::Pin;

use crate::StoreError;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Store Adapter
// ════════════════════════════════════════════════════════════════

/// Key/value store with an ordered list type. The relay keeps all of its
/// durable state behind this trait; the store is the only point of
/// synchronization between concurrent requests.
///
/// Backends: `storage-memory` (in-process), `storage-resp` (Redis-compatible
/// server over TCP).
pub trait KvStore: Send + Sync {
    /// Read a string key. `None` when the key does not exist.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Overwrite a string key.
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

    /// RPUSH: append to the tail of a list, creating it if absent.
    fn append_to_list<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

    /// LPOP: remove and return the head of a list. `None` if empty or absent.
    fn pop_front<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// LRANGE: inclusive range without removal. Negative indices count
    /// from the tail (`-1` is the last element). `(0, 0)` reads only the head.
    fn range_of_list<'a>(
        &'a self,
        key: &'a str,
        start: i64,
        stop: i64,
    ) -> StoreFuture<'a, Vec<String>>;
}

/// Resolve inclusive `[start, stop]` list indices against a list of `len`
/// elements the way LRANGE does. Returns `None` for an empty selection.
pub fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}
