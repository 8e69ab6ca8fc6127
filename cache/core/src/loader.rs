//! Backend data loading.
//!
//! The prefetcher and warmer fill the cache through a [`DataLoader`]; the
//! application supplies the implementation. Loads may block and may return
//! absent; both are normal.

use bytes::Bytes;

/// Loads a value for a key from the backing system.
pub trait DataLoader: Send + Sync {
    /// Fetch the value for `key`, or `None` when the backend has nothing.
    fn load(&self, key: &str) -> Option<Bytes>;
}

/// Loader that knows nothing. The production default until a real backend
/// is wired in; prefetch dispatch and accuracy accounting still run.
pub struct NoopLoader;

impl DataLoader for NoopLoader {
    fn load(&self, _key: &str) -> Option<Bytes> {
        None
    }
}

/// Closures are loaders, which keeps test backends one line long.
impl<F> DataLoader for F
where
    F: Fn(&str) -> Option<Bytes> + Send + Sync,
{
    fn load(&self, key: &str) -> Option<Bytes> {
        self(key)
    }
}
