//! The untyped embedding boundary used by `wasmlink`.
//!
//! This crate exposes a small, deliberately low-level surface over Wasmtime
//! that looks much more like a C interpreter API than a Rust one: values
//! cross the boundary as 64-bit slots paired with a [`ValueType`] tag,
//! failures are reported as opaque [`EngineError`] messages, and host
//! functions are attached to imports as a raw [`RawFunction`] pointer plus an
//! opaque context pointer.
//!
//! Nothing here knows about Rust types beyond the four wasm number types. The
//! typed layer on top of this lives in the `wasmlink` crate.
//!
//! # Slots
//!
//! Every value is stored in a `u64` slot holding its bit pattern zero-extended
//! to 64 bits: `i32` values occupy the low 32 bits, `f32` values are stored as
//! their IEEE-754 bits, and so on. When a linked host function is invoked its
//! stack contains one slot per result followed by one slot per argument.

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};
use std::fmt;

mod environment;
mod imports;
mod module;
mod runtime;
mod slot;

pub use crate::environment::{Environment, Settings};
pub use crate::module::{ParsedModule, parse_module};
pub use crate::runtime::{Function, GlobalHandle, ImportHandle, ModuleIndex, Runtime};
pub use crate::slot::{TaggedValue, ValueType};
pub use wasmtime::OptLevel;

/// Returned when a module binary ends before a complete item could be read.
pub const WASM_UNDERRUN: &str = "underrun while parsing Wasm binary";
/// Returned when a module binary does not start with the wasm magic number.
pub const WASM_MALFORMED: &str = "malformed Wasm binary";
/// Returned when a module binary declares a version other than 1.
pub const INCOMPATIBLE_WASM_VERSION: &str = "incompatible Wasm binary version";
/// Returned when a function or import cannot be found by name.
pub const FUNCTION_LOOKUP_FAILED: &str = "function lookup failed";
/// Returned when a function is resolved whose module still has unlinked imports.
pub const FUNCTION_IMPORT_MISSING: &str = "missing imported function";
/// Returned when a raw function's signature does not match the import.
pub const SIGNATURE_MISMATCH: &str = "function signature mismatch";
/// Returned when a raw function's signature string cannot be parsed.
pub const MALFORMED_SIGNATURE: &str = "malformed function signature";
/// Returned when the number of arguments or results does not match a function.
pub const ARGUMENT_COUNT_MISMATCH: &str = "argument count mismatch";
/// Returned when a global is written with a value of the wrong type.
pub const GLOBAL_TYPE_MISMATCH: &str = "global type mismatch";
/// Returned when an immutable global is written.
pub const IMMUTABLE_GLOBAL: &str = "attempting to set an immutable global";
/// Returned when a module defines a memory but the runtime already has one.
pub const MEMORY_ALREADY_DEFINED: &str = "runtime already has a linear memory";
/// Returned when a module defines a memory without exporting it.
pub const MEMORY_NOT_EXPORTED: &str = "module defines a linear memory it does not export";
/// Prefix of every message produced by a wasm trap.
pub const TRAP_PREFIX: &str = "[trap]";
/// Message of the trap raised by `unreachable` and by failed host calls.
pub const TRAP_UNREACHABLE: &str = "[trap] unreachable executed";
/// [`TRAP_UNREACHABLE`] as a C string, for returning from a [`RawFunction`].
pub const RAW_TRAP_UNREACHABLE: &CStr = c"[trap] unreachable executed";

/// The signature of a host function linked with
/// [`Runtime::link_raw_function`].
///
/// * `user_data` is the pointer the [`Runtime`] was created with.
/// * `context` is the pointer given when the function was linked.
/// * `sp` points at `slot_count` slots: one per result, then one per argument.
/// * `mem`/`mem_len` describe the runtime's linear memory, or are null/zero
///   when the runtime has none.
///
/// A null return means the call completed and any results have been written
/// to the leading slots. A non-null return is a NUL-terminated trap message.
pub type RawFunction = unsafe extern "C" fn(
    user_data: *mut c_void,
    context: *mut c_void,
    sp: *mut u64,
    slot_count: usize,
    mem: *mut u8,
    mem_len: usize,
) -> *const c_char;

/// An error reported by the engine.
///
/// Errors are opaque messages. Well-known conditions use the message
/// constants exported from this crate so that callers can match on them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineError(Cow<'static, str>);

/// Result type used throughout this crate.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Creates an error carrying `message`.
    pub fn new(message: impl Into<Cow<'static, str>>) -> EngineError {
        EngineError(message.into())
    }

    /// The error message.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this error was produced by a wasm trap.
    pub fn is_trap(&self) -> bool {
        self.0.starts_with(TRAP_PREFIX)
    }

    pub(crate) fn from_wasmtime(err: wasmtime::Error) -> EngineError {
        if let Some(trap) = err.downcast_ref::<imports::HostTrap>() {
            return EngineError(Cow::Owned(trap.0.clone()));
        }
        if let Some(trap) = err.downcast_ref::<wasmtime::Trap>() {
            return EngineError(trap_message(trap));
        }
        EngineError(Cow::Owned(format!("{err:#}")))
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EngineError {}

impl From<&'static str> for EngineError {
    fn from(message: &'static str) -> EngineError {
        EngineError(Cow::Borrowed(message))
    }
}

fn trap_message(trap: &wasmtime::Trap) -> Cow<'static, str> {
    use wasmtime::Trap;

    let message = match trap {
        Trap::UnreachableCodeReached => TRAP_UNREACHABLE,
        Trap::MemoryOutOfBounds => "[trap] out of bounds memory access",
        Trap::IntegerDivisionByZero => "[trap] integer divide by zero",
        Trap::IntegerOverflow => "[trap] integer overflow",
        Trap::StackOverflow => "[trap] stack overflow",
        Trap::BadConversionToInteger => "[trap] invalid conversion to integer",
        Trap::IndirectCallToNull => "[trap] indirect call to null",
        Trap::BadSignature => "[trap] indirect call type mismatch",
        Trap::TableOutOfBounds => "[trap] out of bounds table access",
        other => return Cow::Owned(format!("{TRAP_PREFIX} {other}")),
    };
    Cow::Borrowed(message)
}

/// Helper for creating Rust slices from raw trampoline inputs.
///
/// The `ptr` argument is disregarded if the length is zero; it may be null in
/// that case, and a zero-length slice must not be built from a null pointer.
///
/// # Safety
///
/// When `len` is non-zero, `ptr` must be valid for reads and writes of `len`
/// elements for the lifetime `'a`, and nothing else may access that memory
/// during `'a`.
pub unsafe fn slice_from_raw_parts_mut<'a, T>(ptr: *mut T, len: usize) -> &'a mut [T] {
    if len == 0 || ptr.is_null() {
        &mut []
    } else {
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }
}
