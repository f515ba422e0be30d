//! Function imports and the dispatch stubs that forward them to raw host
//! functions.
//!
//! Every function import of a loaded module is satisfied with a wasmtime
//! `Func` that does nothing but look up its [`ImportSlot`] and, if a raw
//! function has been linked there, marshal wasm values into the slot stack
//! and invoke it. Linking therefore only has to fill in a slot's target; the
//! instance never needs to be rebuilt.

use crate::runtime::StoreState;
use crate::slot::{slot_to_val, val_to_slot};
use crate::{
    EngineError, EngineResult, FUNCTION_IMPORT_MISSING, MALFORMED_SIGNATURE, RawFunction,
    TRAP_UNREACHABLE, ValueType,
};
use smallvec::SmallVec;
use std::ffi::{CStr, c_void};
use std::fmt;
use std::sync::Arc;
use wasmtime::{Caller, Extern, Val};

/// An opaque pointer passed back to a raw function.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Context(pub(crate) *mut c_void);

// The engine never dereferences these pointers; whoever supplied them is
// responsible for their thread safety.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

#[derive(Copy, Clone, Debug)]
pub(crate) struct LinkedTarget {
    pub(crate) call: RawFunction,
    pub(crate) context: Context,
}

/// One function import of a loaded module.
#[derive(Debug)]
pub(crate) struct ImportSlot {
    pub(crate) module: usize,
    pub(crate) namespace: String,
    pub(crate) name: String,
    pub(crate) params: Box<[ValueType]>,
    pub(crate) results: Arc<[ValueType]>,
    pub(crate) target: Option<LinkedTarget>,
}

impl ImportSlot {
    pub(crate) fn matches(&self, module: usize, namespace: &str, name: &str) -> bool {
        self.module == module && self.namespace == namespace && self.name == name
    }
}

/// A trap raised from host code.
///
/// Carried through wasmtime as the error of a host call so the trampoline's
/// message can be recovered once the call unwinds back to the runtime.
#[derive(Debug)]
pub(crate) struct HostTrap(pub(crate) String);

impl fmt::Display for HostTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HostTrap {}

impl HostTrap {
    fn unreachable() -> HostTrap {
        HostTrap(TRAP_UNREACHABLE.to_string())
    }
}

/// Runs the import in slot `index` on behalf of wasm code.
pub(crate) fn dispatch(
    mut caller: Caller<'_, StoreState>,
    index: usize,
    result_types: &[ValueType],
    params: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let state = caller.data();
    let Some(target) = state.imports.get(index).and_then(|slot| slot.target) else {
        log::trace!("call to unlinked import slot {index}");
        return Err(HostTrap(FUNCTION_IMPORT_MISSING.to_string()).into());
    };
    let user_data = state.user_data;
    let runtime_memory = state.memory;

    let mut stack: SmallVec<[u64; 8]> = SmallVec::with_capacity(results.len() + params.len());
    stack.resize(results.len(), 0);
    for param in params {
        stack.push(val_to_slot(param).ok_or_else(HostTrap::unreachable)?);
    }

    // The calling instance's own memory is the one its loads and stores touch.
    let memory = caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .or(runtime_memory);
    let (mem, mem_len) = match memory {
        Some(memory) => {
            let data = memory.data_mut(&mut caller);
            (data.as_mut_ptr(), data.len())
        }
        None => (std::ptr::null_mut(), 0),
    };

    let trap = unsafe {
        (target.call)(
            user_data.0,
            target.context.0,
            stack.as_mut_ptr(),
            stack.len(),
            mem,
            mem_len,
        )
    };
    if !trap.is_null() {
        let message = unsafe { CStr::from_ptr(trap) };
        return Err(HostTrap(message.to_string_lossy().into_owned()).into());
    }

    for ((result, slot), ty) in results.iter_mut().zip(&stack).zip(result_types) {
        *result = slot_to_val(*slot, *ty).ok_or_else(HostTrap::unreachable)?;
    }
    Ok(())
}

/// A parsed raw function signature.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Signature {
    pub(crate) results: Vec<ValueType>,
    pub(crate) params: Vec<ValueType>,
}

/// Parses a signature of the form `<ret>(<args>)`, where `<ret>` is `v` for
/// no result and each type is one of `i`, `I`, `f` or `F`.
pub(crate) fn parse_signature(signature: &str) -> EngineResult<Signature> {
    let malformed = || EngineError::from(MALFORMED_SIGNATURE);
    let mut chars = signature.chars().filter(|c| !c.is_whitespace());

    let results = match chars.next().ok_or_else(malformed)? {
        'v' => Vec::new(),
        code => vec![ValueType::from_signature_code(code).ok_or_else(malformed)?],
    };
    if chars.next() != Some('(') {
        return Err(malformed());
    }

    let mut params = Vec::new();
    loop {
        match chars.next().ok_or_else(malformed)? {
            ')' => break,
            code => params.push(ValueType::from_signature_code(code).ok_or_else(malformed)?),
        }
    }
    if chars.next().is_some() {
        return Err(malformed());
    }
    Ok(Signature { results, params })
}
