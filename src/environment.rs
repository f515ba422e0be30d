use crate::{Config, ParsedModule, Result, Runtime};
use std::fmt;
use std::sync::Arc;

/// The top-level context shared by parsed modules and runtimes.
///
/// An environment is cheap to clone; clones refer to the same underlying
/// engine context and compare equal. Modules may only be loaded into
/// runtimes created from the environment they were parsed against.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<wasmlink_engine::Environment>,
}

impl Environment {
    /// Creates an environment with the default [`Config`].
    pub fn new() -> Result<Environment> {
        Environment::with_config(&Config::default())
    }

    /// Creates an environment with the given configuration.
    pub fn with_config(config: &Config) -> Result<Environment> {
        let inner = wasmlink_engine::Environment::with_settings(config.settings())?;
        Ok(Environment {
            inner: Arc::new(inner),
        })
    }

    /// Creates a runtime whose wasm call stack is limited to `stack_size`
    /// bytes.
    pub fn create_runtime(&self, stack_size: usize) -> Result<Runtime> {
        Runtime::new(self, stack_size)
    }

    /// Parses and validates a wasm binary.
    pub fn parse_module(&self, bytes: &[u8]) -> Result<ParsedModule> {
        ParsedModule::parse(self, bytes)
    }

    /// Returns whether `a` and `b` are the same environment.
    pub fn ptr_eq(a: &Environment, b: &Environment) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn raw(&self) -> &wasmlink_engine::Environment {
        &self.inner
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Environment) -> bool {
        Environment::ptr_eq(self, other)
    }
}

impl Eq for Environment {}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.inner.id())
            .finish()
    }
}
