use std::sync::Arc;

use parking_lot::Mutex;

/// Typed values attached to a request that never show up as context entries, such as the
/// compiled schema or the host context.
///
/// Clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct Extensions {
    inner: Arc<Mutex<http::Extensions>>,
}

impl Extensions {
    /// Run `func` with exclusive access to the stored values.
    pub fn with_lock<T>(&self, func: impl FnOnce(&mut http::Extensions) -> T) -> T {
        func(&mut self.inner.lock())
    }

    /// Store `value`, returning the previous value of the same type.
    pub fn insert<T: Clone + Send + Sync + 'static>(&self, value: T) -> Option<T> {
        self.with_lock(|extensions| extensions.insert(value))
    }

    /// A clone of the stored value of type `T`.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.with_lock(|extensions| extensions.get::<T>().cloned())
    }
}
