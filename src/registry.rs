use crate::{MemoryView, Result};
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Arc, PoisonError, RwLock};

/// A type-erased host function.
///
/// It receives the whole slot stack of a call (result slots first, then one
/// slot per argument) and the linear memory, if the runtime has one.
#[doc(hidden)]
pub type HostFunc =
    Arc<dyn Fn(&mut [u64], Option<MemoryView<'_>>) -> Result<()> + Send + Sync + 'static>;

/// Erases the type of a host function.
pub(crate) fn host_func<F>(func: F) -> HostFunc
where
    F: Fn(&mut [u64], Option<MemoryView<'_>>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(func)
}

/// Identifies one linked import within a [`LinkedFunctionRegistry`].
///
/// Keys are handed to the engine as the context pointer of a linked import.
/// The pointer is the key's index plus one, so that a key is never null.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ContextKey(usize);

impl ContextKey {
    pub(crate) fn into_raw(self) -> *mut c_void {
        std::ptr::without_provenance_mut(self.0 + 1)
    }

    pub(crate) fn from_raw(raw: *mut c_void) -> Option<ContextKey> {
        raw.addr().checked_sub(1).map(ContextKey)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LinkKey {
    module: usize,
    namespace: String,
    name: String,
}

#[derive(Default)]
struct Entries {
    keys: HashMap<LinkKey, ContextKey>,
    funcs: Vec<Option<HostFunc>>,
}

/// The host functions linked into one runtime.
///
/// Every `(module, namespace, name)` import is assigned a stable
/// [`ContextKey`] the first time it is linked; linking it again replaces the
/// function stored under that key. The registry is shared between the thread
/// linking functions and whichever thread runs wasm, so all access goes
/// through a lock. Entries live as long as the registry, which is owned by
/// its runtime.
#[derive(Default)]
pub(crate) struct LinkedFunctionRegistry {
    entries: RwLock<Entries>,
}

impl LinkedFunctionRegistry {
    /// Returns the key for an import, allocating one on first use.
    pub(crate) fn key(&self, module: usize, namespace: &str, name: &str) -> ContextKey {
        let link = LinkKey {
            module,
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = entries.keys.get(&link) {
            return *key;
        }
        let key = ContextKey(entries.funcs.len());
        entries.funcs.push(None);
        entries.keys.insert(link, key);
        key
    }

    /// Stores `func` under `key`, replacing any previous function.
    pub(crate) fn set(&self, key: ContextKey, func: HostFunc) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = entries.funcs.get_mut(key.0) {
            *slot = Some(func);
        }
    }

    /// Returns the function currently stored under `key`.
    pub(crate) fn get(&self, key: ContextKey) -> Option<HostFunc> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.funcs.get(key.0)?.clone()
    }

    /// Number of imports that have been assigned a key.
    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .funcs
            .len()
    }
}
