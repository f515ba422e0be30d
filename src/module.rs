use crate::{Environment, Function, Global, IntoHostFunc, Result, Runtime, WasmType};
use std::sync::Arc;
use wasmlink_engine::ModuleIndex;

/// A validated wasm module that has not been loaded into a runtime yet.
///
/// Load it with [`Runtime::load_module`]. The module keeps a copy of its
/// binary, which the runtime retains once the module is loaded.
#[derive(Clone)]
pub struct ParsedModule {
    env: Environment,
    raw: wasmlink_engine::ParsedModule,
}

impl ParsedModule {
    /// Parses and validates `bytes` against `env`.
    ///
    /// Fails with [`Error::WasmUnderrun`](crate::Error::WasmUnderrun) for
    /// truncated binaries and
    /// [`Error::IncompatibleWasmVersion`](crate::Error::IncompatibleWasmVersion)
    /// for binaries of an unsupported version.
    pub fn parse(env: &Environment, bytes: &[u8]) -> Result<ParsedModule> {
        let raw = wasmlink_engine::parse_module(env.raw(), bytes)?;
        Ok(ParsedModule {
            env: env.clone(),
            raw,
        })
    }

    /// The environment this module was parsed against.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The binary this module was parsed from.
    pub fn bytes(&self) -> &[u8] {
        self.raw.bytes()
    }

    /// The module name from the name section, if any.
    pub fn name(&self) -> Option<&str> {
        self.raw.name()
    }

    pub(crate) fn raw(&self) -> &wasmlink_engine::ParsedModule {
        &self.raw
    }

    pub(crate) fn retained_bytes(&self) -> Arc<[u8]> {
        self.raw.bytes().clone()
    }
}

impl std::fmt::Debug for ParsedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedModule")
            .field("name", &self.name())
            .field("len", &self.bytes().len())
            .finish()
    }
}

/// A module instantiated inside a [`Runtime`].
///
/// This is a lightweight handle: the instance itself lives as long as the
/// runtime that loaded it, and every operation takes that runtime as an
/// argument. Using a module with any other runtime panics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Module {
    runtime: u64,
    index: ModuleIndex,
}

impl Module {
    pub(crate) fn new(runtime: u64, index: ModuleIndex) -> Module {
        Module { runtime, index }
    }

    /// Parses `bytes` against `env`. See [`ParsedModule::parse`].
    pub fn parse(env: &Environment, bytes: &[u8]) -> Result<ParsedModule> {
        ParsedModule::parse(env, bytes)
    }

    /// The module name from the name section, if any.
    ///
    /// # Panics
    ///
    /// Panics if this module was not loaded into `runtime`.
    pub fn name<'a>(&self, runtime: &'a Runtime) -> Option<&'a str> {
        runtime.assert_owns(self.runtime);
        runtime.raw.module_name(self.index)
    }

    /// Resolves a function exported by this module.
    ///
    /// Fails with [`Error::FunctionLookupFailed`](crate::Error::FunctionLookupFailed)
    /// if there is no export called `name`,
    /// [`Error::MissingFunction`](crate::Error::MissingFunction) if the export
    /// is not a function, and
    /// [`Error::MissingImportedFunction`](crate::Error::MissingImportedFunction)
    /// while any function import of this module is still unlinked.
    ///
    /// # Panics
    ///
    /// Panics if this module was not loaded into `runtime`.
    pub fn find_function(&self, runtime: &mut Runtime, name: &str) -> Result<Function> {
        runtime.assert_owns(self.runtime);
        let raw = runtime.raw.find_module_function(self.index, name)?;
        runtime.wrap_function(raw)
    }

    /// Finds a global of this module by export name, or else by the field
    /// name of a global import.
    ///
    /// # Panics
    ///
    /// Panics if this module was not loaded into `runtime`.
    pub fn find_global<T: WasmType>(
        &self,
        runtime: &mut Runtime,
        name: &str,
    ) -> Result<Option<Global<T>>> {
        runtime.assert_owns(self.runtime);
        let raw = runtime.raw.find_global(self.index, name)?;
        Ok(raw.map(|raw| Global::new(self.runtime, raw)))
    }

    /// Links `func` to the function import `namespace.name` of this module.
    ///
    /// The import's wasm signature must match the closure's parameter and
    /// return types exactly, otherwise this fails with
    /// [`Error::InvalidSignature`](crate::Error::InvalidSignature). Linking
    /// the same import again replaces the previous function.
    ///
    /// # Panics
    ///
    /// Panics if this module was not loaded into `runtime`.
    pub fn link_function<Params, Results>(
        &self,
        runtime: &mut Runtime,
        namespace: &str,
        name: &str,
        func: impl IntoHostFunc<Params, Results>,
    ) -> Result<()> {
        runtime.assert_owns(self.runtime);
        runtime.link(self.index, namespace, name, func)
    }
}
