use wasmlink_engine::{
    ARGUMENT_COUNT_MISMATCH, EngineError, FUNCTION_IMPORT_MISSING, FUNCTION_LOOKUP_FAILED,
    GLOBAL_TYPE_MISMATCH, INCOMPATIBLE_WASM_VERSION, SIGNATURE_MISMATCH, TRAP_PREFIX,
    WASM_UNDERRUN,
};

/// Errors produced by this crate.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The engine failed to produce a handle or a result buffer.
    #[error("allocation failed")]
    AllocationFailed,
    /// A memory access fell outside the linear memory, or there is no
    /// linear memory.
    #[error("invalid memory access")]
    InvalidMemoryAccess,
    /// The types or arity of a call, global access or import link do not
    /// match the wasm declaration.
    #[error("invalid signature")]
    InvalidSignature,
    /// A module was loaded into a runtime of a different environment than
    /// the one it was parsed against.
    #[error("mismatched environments")]
    MismatchedEnvironments,
    /// An export exists but is not a function.
    #[error("missing function")]
    MissingFunction,
    /// The module binary has an unsupported version.
    #[error("incompatible wasm version")]
    IncompatibleWasmVersion,
    /// The module binary is truncated.
    #[error("wasm underrun")]
    WasmUnderrun,
    /// No export or import with the requested name exists.
    #[error("function lookup failed")]
    FunctionLookupFailed,
    /// A function import required by the module has not been linked.
    #[error("missing imported function")]
    MissingImportedFunction,
    /// Any other failure reported by the engine, including traps.
    #[error("{0}")]
    Engine(String),
}

/// A `Result` alias where the `Err` case is [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Returns whether this error was raised by a wasm trap, including traps
    /// raised on behalf of a failing host function.
    pub fn is_trap(&self) -> bool {
        matches!(self, Error::Engine(message) if message.starts_with(TRAP_PREFIX))
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Error {
        match err.as_str() {
            INCOMPATIBLE_WASM_VERSION => Error::IncompatibleWasmVersion,
            WASM_UNDERRUN => Error::WasmUnderrun,
            FUNCTION_LOOKUP_FAILED => Error::FunctionLookupFailed,
            FUNCTION_IMPORT_MISSING => Error::MissingImportedFunction,
            SIGNATURE_MISMATCH | ARGUMENT_COUNT_MISMATCH | GLOBAL_TYPE_MISMATCH => {
                Error::InvalidSignature
            }
            message => Error::Engine(message.to_string()),
        }
    }
}
