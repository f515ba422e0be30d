use crate::registry::LinkedFunctionRegistry;
use crate::{Environment, Error, Function, IntoHostFunc, MemoryView, Module, ParsedModule, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use wasmlink_engine::ModuleIndex;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// An execution context in which modules are instantiated and run.
///
/// A runtime has a fixed maximum wasm call-stack size, owns every module
/// loaded into it along with their binaries, and owns a single linear memory
/// shared by all of them. [`Module`], [`Function`] and
/// [`Global`](crate::Global) handles refer back to the runtime that produced
/// them and panic when used with any other.
pub struct Runtime {
    // Dropped before `registry`, which the engine runtime points into.
    pub(crate) raw: wasmlink_engine::Runtime,
    registry: Arc<LinkedFunctionRegistry>,
    env: Environment,
    module_data: Vec<Arc<[u8]>>,
    id: u64,
}

impl Runtime {
    /// Creates a runtime in `env` whose wasm call stack is limited to
    /// `stack_size` bytes.
    pub fn new(env: &Environment, stack_size: usize) -> Result<Runtime> {
        let registry = Arc::new(LinkedFunctionRegistry::default());
        let user_data = Arc::as_ptr(&registry).cast_mut().cast();
        let raw = wasmlink_engine::Runtime::new(env.raw(), stack_size, user_data)?;
        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("created runtime {id} with {stack_size} byte stack");
        Ok(Runtime {
            raw,
            registry,
            env: env.clone(),
            module_data: Vec::new(),
            id,
        })
    }

    /// The environment this runtime was created from.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The maximum wasm call-stack size in bytes.
    pub fn stack_size(&self) -> usize {
        self.raw.stack_size()
    }

    /// Instantiates `module` in this runtime.
    ///
    /// Fails with [`Error::MismatchedEnvironments`] if the module was parsed
    /// against a different environment. A runtime has a single linear
    /// memory, so a module that defines its own memory fails with an
    /// [`Error::Engine`] once an earlier module has provided one.
    pub fn load_module(&mut self, module: ParsedModule) -> Result<Module> {
        if module.environment() != &self.env {
            return Err(Error::MismatchedEnvironments);
        }
        let index = self.raw.load_module(module.raw())?;
        self.module_data.push(module.retained_bytes());
        Ok(Module::new(self.id, index))
    }

    /// Parses `bytes` against this runtime's environment and loads the
    /// result.
    pub fn parse_and_load_module(&mut self, bytes: &[u8]) -> Result<Module> {
        let module = ParsedModule::parse(&self.env, bytes)?;
        self.load_module(module)
    }

    /// Resolves an exported function, searching every loaded module in load
    /// order.
    ///
    /// See [`Module::find_function`] for the possible errors.
    pub fn find_function(&mut self, name: &str) -> Result<Function> {
        let raw = self.raw.find_function(name)?;
        self.wrap_function(raw)
    }

    pub(crate) fn wrap_function(
        &self,
        raw: Option<wasmlink_engine::Function>,
    ) -> Result<Function> {
        let raw = raw.ok_or(Error::MissingFunction)?;
        Ok(Function {
            runtime: self.id,
            raw,
        })
    }

    /// Finds the first loaded module whose name section declares `name`.
    pub fn find_module(&self, name: &str) -> Option<Module> {
        let index = self.raw.find_module(name)?;
        Some(Module::new(self.id, index))
    }

    /// The loaded modules in load order.
    pub fn modules(&self) -> Vec<Module> {
        self.raw
            .modules()
            .map(|index| Module::new(self.id, index))
            .collect()
    }

    /// The binaries of the loaded modules in load order.
    pub fn module_bytes(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.module_data.iter().map(|bytes| &bytes[..])
    }

    /// A view of the linear memory.
    ///
    /// Fails with [`Error::InvalidMemoryAccess`] until a loaded module has
    /// defined or imported a memory.
    pub fn memory(&mut self) -> Result<MemoryView<'_>> {
        let data = self.raw.memory().ok_or(Error::InvalidMemoryAccess)?;
        Ok(MemoryView::new(data))
    }

    /// Sets the size of the linear memory to `pages` 64 KiB pages.
    ///
    /// Memory can only grow; requesting fewer pages than the memory already
    /// has is an error. Views taken before the resize cannot outlive it.
    ///
    /// Before any module has provided a memory the size is remembered and
    /// applied to the first memory a module defines or imports.
    pub fn resize_memory(&mut self, pages: u32) -> Result<()> {
        self.raw.resize_memory(pages)?;
        Ok(())
    }

    pub(crate) fn link<Params, Results>(
        &mut self,
        module: ModuleIndex,
        namespace: &str,
        name: &str,
        func: impl IntoHostFunc<Params, Results>,
    ) -> Result<()> {
        crate::linker::link(&mut self.raw, &self.registry, module, namespace, name, func)
    }

    #[track_caller]
    pub(crate) fn assert_owns(&self, runtime: u64) {
        assert!(
            runtime == self.id,
            "object used with the wrong runtime: it belongs to runtime {runtime}, not {}",
            self.id
        );
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.id)
            .field("stack_size", &self.stack_size())
            .field("modules", &self.module_data.len())
            .field("linked_functions", &self.registry.len())
            .finish()
    }
}
