//! Registry of transfer codings negotiated via `Transfer-Encoding`.

use crate::errors::Fault;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A named transfer coding: a stateless `encode`/`decode` pair over raw
/// bytes.
///
/// `decode(encode(x)) == x` is not guaranteed in general - a coding may be
/// framing only, not a content transform - but `decode` must fail with a
/// malformed-input [`Fault`] rather than produce silently wrong bytes.
pub trait TransferCoding: Send + Sync {
    /// The coding name as it appears in `Transfer-Encoding`, e.g. `chunked`,
    /// according to
    /// [RFC 9112, section 7](https://www.rfc-editor.org/rfc/rfc9112.html#transfer.codings).
    fn name(&self) -> &str;

    fn encode(&self, bytes: &[u8]) -> Vec<u8>;

    /// Errors with [`Fault::Malformed`] when the bytes do not conform to
    /// the coding.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, Fault>;
}

/// Ordered, concurrency-safe registry of [`TransferCoding`]s.
///
/// Codings are resolved from index `0` upward: the first registered coding
/// with a matching name shadows any later duplicate. Registering a
/// duplicate name is not an error - both remain registered, but only the
/// earlier-indexed one is ever resolved.
///
/// Readers may proceed concurrently; a writer excludes all readers and
/// other writers. The linear scan is deliberate: the coder count is
/// bounded by deployment configuration, not request volume.
pub struct CodingRegistry {
    coders: RwLock<Vec<Arc<dyn TransferCoding>>>,
}

impl CodingRegistry {
    #[inline]
    pub fn new() -> Self {
        CodingRegistry {
            coders: RwLock::new(Vec::new()),
        }
    }

    /// Appends a coding to the registry.
    pub fn register(&self, coder: Arc<dyn TransferCoding>) {
        self.write_coders().push(coder);
    }

    /// Inserts a coding at the given index, clamped to the current length.
    /// Lower indexes take priority on [`resolve`](Self::resolve).
    pub fn register_at(&self, index: usize, coder: Arc<dyn TransferCoding>) {
        let mut coders = self.write_coders();
        let index = index.min(coders.len());
        coders.insert(index, coder);
    }

    /// Resolves the first registered coding whose name matches, ignoring
    /// ASCII case.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn TransferCoding>> {
        self.read_coders()
            .iter()
            .find(|coder| coder.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.read_coders().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read_coders().is_empty()
    }

    // A poisoned lock only means another thread panicked mid-operation;
    // the Vec itself is always left in a usable state.
    fn read_coders(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn TransferCoding>>> {
        self.coders.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_coders(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn TransferCoding>>> {
        self.coders.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CodingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
