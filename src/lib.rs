//! Typed host bindings for embedding WebAssembly modules.
//!
//! `wasmlink` sits on top of the untyped, slot-based boundary exposed by
//! `wasmlink-engine` and gives it a statically typed Rust face:
//!
//! * An [`Environment`] parses binaries into [`ParsedModule`]s.
//! * A [`Runtime`] instantiates parsed modules with a bounded call stack and
//!   owns their single linear memory.
//! * Exported functions are resolved as [`Function`]s and called with tuples
//!   of Rust values, with arity and return types checked against the wasm
//!   signature before anything runs.
//! * Globals are accessed through typed [`Global`] handles.
//! * Linear memory is read and written through a bounds-checked
//!   [`MemoryView`].
//! * Rust closures are linked to function imports with
//!   [`Module::link_function`], optionally receiving a [`MemoryView`] as their
//!   first parameter.
//!
//! ```ignore
//! use wasmlink::{Environment, Runtime};
//!
//! let env = Environment::new()?;
//! let mut runtime = Runtime::new(&env, 64 * 1024)?;
//! let module = runtime.parse_and_load_module(&wasm_bytes)?;
//! module.link_function(&mut runtime, "env", "add", |a: i32, b: i32| a + b)?;
//! let run = runtime.find_function("run")?;
//! let answer: i32 = run.call_typed(&mut runtime, (1, 2))?;
//! ```
//!
//! Values of the supported types ([`WasmType`]) cross into wasm by bit
//! pattern, so an `i32` and a `u32` are interchangeable wherever wasm expects
//! an `i32`: `-1i32` and `u32::MAX` are the same wasm value.

#![warn(missing_docs)]

// Invokes `$mac` once for every supported host function arity.
macro_rules! for_each_function_signature {
    ($mac:ident) => {
        $mac!(0);
        $mac!(1 A1);
        $mac!(2 A1 A2);
        $mac!(3 A1 A2 A3);
        $mac!(4 A1 A2 A3 A4);
        $mac!(5 A1 A2 A3 A4 A5);
        $mac!(6 A1 A2 A3 A4 A5 A6);
        $mac!(7 A1 A2 A3 A4 A5 A6 A7);
        $mac!(8 A1 A2 A3 A4 A5 A6 A7 A8);
        $mac!(9 A1 A2 A3 A4 A5 A6 A7 A8 A9);
        $mac!(10 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10);
        $mac!(11 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11);
        $mac!(12 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12);
        $mac!(13 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13);
        $mac!(14 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13 A14);
        $mac!(15 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13 A14 A15);
        $mac!(16 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13 A14 A15 A16);
    };
}

mod config;
pub mod convert;
mod environment;
mod error;
mod func;
mod global;
mod linker;
mod memory;
mod module;
mod registry;
mod runtime;
mod types;

pub use crate::config::{Config, OptLevel};
pub use crate::environment::Environment;
pub use crate::error::{Error, Result};
pub use crate::func::{Function, WasmArgs};
pub use crate::global::Global;
pub use crate::linker::IntoHostFunc;
pub use crate::memory::MemoryView;
pub use crate::module::{Module, ParsedModule};
pub use crate::runtime::Runtime;
pub use crate::types::{WasmRet, WasmType};
pub use wasmlink_engine::ValueType;
