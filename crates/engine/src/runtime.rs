use crate::imports::{self, Context, ImportSlot, LinkedTarget};
use crate::slot::{TaggedValue, ValueType, default_val, slot_to_val, val_to_slot};
use crate::{
    ARGUMENT_COUNT_MISMATCH, EngineError, EngineResult, Environment, FUNCTION_IMPORT_MISSING,
    FUNCTION_LOOKUP_FAILED, GLOBAL_TYPE_MISMATCH, IMMUTABLE_GLOBAL, MEMORY_ALREADY_DEFINED,
    MEMORY_NOT_EXPORTED, ParsedModule, RawFunction, SIGNATURE_MISMATCH,
};
use smallvec::SmallVec;
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;
use wasmtime::{
    Caller, Engine, Extern, ExternType, Func, Global, Instance, Memory, Mutability, Store, Val,
};

/// Host state stored inside the wasmtime `Store` of a [`Runtime`].
pub(crate) struct StoreState {
    pub(crate) imports: Vec<ImportSlot>,
    pub(crate) memory: Option<Memory>,
    pub(crate) user_data: Context,
}

struct LoadedModule {
    name: Option<String>,
    instance: Instance,
    imported_globals: Vec<(String, Global)>,
}

/// The index of a module loaded into a [`Runtime`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleIndex(usize);

impl ModuleIndex {
    /// Position of the module in load order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// An exported function resolved in a [`Runtime`].
#[derive(Clone, Debug)]
pub struct Function {
    module: ModuleIndex,
    func: Func,
    params: Box<[ValueType]>,
    results: Box<[ValueType]>,
}

impl Function {
    /// The module exporting this function.
    pub fn module(&self) -> ModuleIndex {
        self.module
    }

    /// Parameter types in declaration order.
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// Result types in declaration order.
    pub fn results(&self) -> &[ValueType] {
        &self.results
    }
}

/// A function import of a loaded module, checked against a signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImportHandle(usize);

/// A global resolved in a [`Runtime`].
#[derive(Copy, Clone, Debug)]
pub struct GlobalHandle {
    global: Global,
    ty: ValueType,
    mutable: bool,
}

impl GlobalHandle {
    /// The declared type of the global.
    pub fn ty(&self) -> ValueType {
        self.ty
    }

    /// Whether the global may be written.
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }
}

/// An execution context with a fixed call-stack size.
///
/// A runtime owns every module loaded into it together with a single linear
/// memory. The memory is the first one a module defines or imports; every
/// later module that imports a memory is given that same memory, and a later
/// module that defines its own is rejected. All handles a runtime returns are
/// only meaningful for this runtime.
pub struct Runtime {
    env_id: usize,
    stack_size: usize,
    engine: Engine,
    store: Store<StoreState>,
    modules: Vec<LoadedModule>,
    results: Vec<u64>,
    // Size requested by `resize_memory` before any module provided a memory.
    pending_pages: Option<u32>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("env_id", &self.env_id)
            .field("stack_size", &self.stack_size)
            .field("modules", &self.modules.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Creates a runtime whose wasm call stack is limited to `stack_size`
    /// bytes.
    ///
    /// `user_data` is passed unchanged to every raw function linked into this
    /// runtime.
    pub fn new(
        env: &Environment,
        stack_size: usize,
        user_data: *mut c_void,
    ) -> EngineResult<Runtime> {
        if stack_size == 0 {
            return Err(EngineError::new("stack size must be non-zero"));
        }
        let engine = env.engine(stack_size)?;
        let store = Store::new(
            &engine,
            StoreState {
                imports: Vec::new(),
                memory: None,
                user_data: Context(user_data),
            },
        );
        Ok(Runtime {
            env_id: env.id(),
            stack_size,
            engine,
            store,
            modules: Vec::new(),
            results: Vec::new(),
            pending_pages: None,
        })
    }

    /// The id of the environment this runtime was created from.
    pub fn environment_id(&self) -> usize {
        self.env_id
    }

    /// The maximum wasm stack size in bytes.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// The loaded modules in load order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleIndex> + use<> {
        (0..self.modules.len()).map(ModuleIndex)
    }

    /// Instantiates `parsed` in this runtime.
    ///
    /// Function imports start out unlinked and must be linked with
    /// [`Runtime::link_raw_function`] before any function of the module can
    /// be resolved. Imported globals are created on the fly. An imported
    /// memory is the runtime's memory, created on the fly if there is none
    /// yet. A module that defines a memory must export it and may only be
    /// loaded while the runtime has no memory.
    pub fn load_module(&mut self, parsed: &ParsedModule) -> EngineResult<ModuleIndex> {
        if parsed.environment_id() != self.env_id {
            return Err(EngineError::new(
                "module was parsed against a different environment",
            ));
        }
        let module = parsed.module_for(&self.engine, self.stack_size)?;
        let defines_memory = module.resources_required().num_memories > 0;
        if defines_memory && self.store.data().memory.is_some() {
            return Err(MEMORY_ALREADY_DEFINED.into());
        }

        let index = self.modules.len();
        let first_import = self.store.data().imports.len();
        let had_memory = self.store.data().memory.is_some();

        let mut imported_globals = Vec::new();
        let instance = match self.instantiate(index, &module, defines_memory, &mut imported_globals)
        {
            Ok(instance) => instance,
            Err(err) => {
                let state = self.store.data_mut();
                state.imports.truncate(first_import);
                if !had_memory {
                    state.memory = None;
                }
                log::debug!("failed to load module: {err}");
                return Err(err);
            }
        };
        if self.store.data().memory.is_some() {
            self.pending_pages = None;
        }

        let name = module.name().map(str::to_string);
        log::debug!(
            "loaded module {:?} at index {index} with {} function imports",
            name.as_deref().unwrap_or("<unnamed>"),
            self.store.data().imports.len() - first_import,
        );
        self.modules.push(LoadedModule {
            name,
            instance,
            imported_globals,
        });
        Ok(ModuleIndex(index))
    }

    fn instantiate(
        &mut self,
        index: usize,
        module: &wasmtime::Module,
        defines_memory: bool,
        imported_globals: &mut Vec<(String, Global)>,
    ) -> EngineResult<Instance> {
        let externs = self.import_externs(index, module, imported_globals)?;
        let instance =
            Instance::new(&mut self.store, module, &externs).map_err(EngineError::from_wasmtime)?;
        if defines_memory {
            let memory = instance
                .exports(&mut self.store)
                .find_map(|export| export.into_memory())
                .ok_or(EngineError::from(MEMORY_NOT_EXPORTED))?;
            self.apply_pending_pages(memory)?;
            self.store.data_mut().memory = Some(memory);
        }
        Ok(instance)
    }

    fn apply_pending_pages(&mut self, memory: Memory) -> EngineResult<()> {
        match self.pending_pages {
            Some(pages) => self.grow_to(memory, u64::from(pages)),
            None => Ok(()),
        }
    }

    fn grow_to(&mut self, memory: Memory, pages: u64) -> EngineResult<()> {
        let current = memory.size(&self.store);
        if pages < current {
            return Err(EngineError::new(format!(
                "cannot shrink linear memory from {current} to {pages} pages"
            )));
        }
        if pages > current {
            memory
                .grow(&mut self.store, pages - current)
                .map_err(EngineError::from_wasmtime)?;
            log::debug!("grew linear memory from {current} to {pages} pages");
        }
        Ok(())
    }

    fn import_externs(
        &mut self,
        index: usize,
        module: &wasmtime::Module,
        imported_globals: &mut Vec<(String, Global)>,
    ) -> EngineResult<Vec<Extern>> {
        let mut externs = Vec::new();
        for import in module.imports() {
            let ext: Extern = match import.ty() {
                ExternType::Func(ty) => {
                    let params = ty.params().map(|t| ValueType::from_wasmtime(&t)).collect();
                    let results: Arc<[ValueType]> =
                        ty.results().map(|t| ValueType::from_wasmtime(&t)).collect();
                    let state = self.store.data_mut();
                    let slot = state.imports.len();
                    state.imports.push(ImportSlot {
                        module: index,
                        namespace: import.module().to_string(),
                        name: import.name().to_string(),
                        params,
                        results: results.clone(),
                        target: None,
                    });
                    Func::new(
                        &mut self.store,
                        ty,
                        move |caller: Caller<'_, StoreState>, params: &[Val], out: &mut [Val]| {
                            imports::dispatch(caller, slot, &results, params, out)
                        },
                    )
                    .into()
                }
                ExternType::Global(ty) => {
                    let value = default_val(ValueType::from_wasmtime(ty.content()))
                        .ok_or_else(|| unsupported_import(import.module(), import.name()))?;
                    let global = Global::new(&mut self.store, ty, value)
                        .map_err(EngineError::from_wasmtime)?;
                    imported_globals.push((import.name().to_string(), global));
                    global.into()
                }
                ExternType::Memory(ty) => {
                    let memory = match self.store.data().memory {
                        Some(memory) => memory,
                        None => {
                            let memory = Memory::new(&mut self.store, ty)
                                .map_err(EngineError::from_wasmtime)?;
                            self.apply_pending_pages(memory)?;
                            self.store.data_mut().memory = Some(memory);
                            memory
                        }
                    };
                    memory.into()
                }
                _ => return Err(unsupported_import(import.module(), import.name())),
            };
            externs.push(ext);
        }
        Ok(externs)
    }

    /// Resolves an exported function by searching every module in load
    /// order.
    pub fn find_function(&mut self, name: &str) -> EngineResult<Option<Function>> {
        for index in 0..self.modules.len() {
            if let Some(export) = self.modules[index]
                .instance
                .get_export(&mut self.store, name)
            {
                return self.resolve_function(ModuleIndex(index), export);
            }
        }
        Err(FUNCTION_LOOKUP_FAILED.into())
    }

    /// Resolves a function exported by `module`.
    pub fn find_module_function(
        &mut self,
        module: ModuleIndex,
        name: &str,
    ) -> EngineResult<Option<Function>> {
        let instance = self.loaded(module)?.instance;
        match instance.get_export(&mut self.store, name) {
            Some(export) => self.resolve_function(module, export),
            None => Err(FUNCTION_LOOKUP_FAILED.into()),
        }
    }

    fn resolve_function(
        &mut self,
        module: ModuleIndex,
        export: Extern,
    ) -> EngineResult<Option<Function>> {
        let Some(func) = export.into_func() else {
            return Ok(None);
        };
        let unlinked = self
            .store
            .data()
            .imports
            .iter()
            .find(|slot| slot.module == module.0 && slot.target.is_none());
        if let Some(slot) = unlinked {
            log::debug!(
                "module {} has unlinked import {}::{}",
                module.0,
                slot.namespace,
                slot.name
            );
            return Err(FUNCTION_IMPORT_MISSING.into());
        }
        let ty = func.ty(&self.store);
        Ok(Some(Function {
            module,
            func,
            params: ty.params().map(|t| ValueType::from_wasmtime(&t)).collect(),
            results: ty.results().map(|t| ValueType::from_wasmtime(&t)).collect(),
        }))
    }

    /// Resolves a global of `module`, first among its exports and then among
    /// its imports by field name.
    pub fn find_global(
        &mut self,
        module: ModuleIndex,
        name: &str,
    ) -> EngineResult<Option<GlobalHandle>> {
        let loaded = self.loaded(module)?;
        let instance = loaded.instance;
        let imported = loaded
            .imported_globals
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, global)| *global);
        let Some(global) = instance.get_global(&mut self.store, name).or(imported) else {
            return Ok(None);
        };
        let ty = global.ty(&self.store);
        Ok(Some(GlobalHandle {
            global,
            ty: ValueType::from_wasmtime(ty.content()),
            mutable: ty.mutability() == Mutability::Var,
        }))
    }

    /// The name of `module` from its name section.
    pub fn module_name(&self, module: ModuleIndex) -> Option<&str> {
        self.modules.get(module.0)?.name.as_deref()
    }

    /// Finds the first loaded module with the given name.
    pub fn find_module(&self, name: &str) -> Option<ModuleIndex> {
        self.modules
            .iter()
            .position(|m| m.name.as_deref() == Some(name))
            .map(ModuleIndex)
    }

    fn loaded(&self, module: ModuleIndex) -> EngineResult<&LoadedModule> {
        self.modules
            .get(module.0)
            .ok_or_else(|| EngineError::new("module index out of range"))
    }

    /// Calls `function`.
    ///
    /// Results are kept until the next call and can be read with
    /// [`Runtime::get_results`].
    ///
    /// # Safety
    ///
    /// Every pointer in `args` must point at a readable 8-byte slot holding
    /// the argument for the corresponding parameter. `function` must have
    /// been resolved by this runtime.
    pub unsafe fn call(&mut self, function: &Function, args: &[*const c_void]) -> EngineResult<()> {
        self.results.clear();
        if args.len() != function.params.len() {
            return Err(ARGUMENT_COUNT_MISMATCH.into());
        }
        let mut params: SmallVec<[Val; 8]> = SmallVec::with_capacity(args.len());
        for (arg, ty) in args.iter().zip(function.params.iter()) {
            let slot = unsafe { arg.cast::<u64>().read_unaligned() };
            params.push(slot_to_val(slot, *ty).ok_or(EngineError::from(SIGNATURE_MISMATCH))?);
        }
        let mut results: SmallVec<[Val; 2]> = function
            .results
            .iter()
            .map(|ty| default_val(*ty).unwrap_or(Val::I32(0)))
            .collect();

        function
            .func
            .call(&mut self.store, &params, &mut results)
            .map_err(EngineError::from_wasmtime)?;

        for result in &results {
            let slot = val_to_slot(result).ok_or(EngineError::from(SIGNATURE_MISMATCH))?;
            self.results.push(slot);
        }
        Ok(())
    }

    /// Returns the results of the last successful call of `function`.
    pub fn get_results(&self, function: &Function, n: usize) -> EngineResult<&[u64]> {
        if n != function.results.len() || self.results.len() != n {
            return Err(ARGUMENT_COUNT_MISMATCH.into());
        }
        Ok(&self.results)
    }

    /// The runtime's linear memory, if it has one.
    pub fn memory(&mut self) -> Option<&mut [u8]> {
        let memory = self.store.data().memory?;
        Some(memory.data_mut(&mut self.store))
    }

    /// Sets the size of the linear memory to `pages` 64 KiB pages.
    ///
    /// Memories can only grow. While no module has provided a memory the
    /// size is remembered and applied to the first memory a module defines
    /// or imports.
    pub fn resize_memory(&mut self, pages: u32) -> EngineResult<()> {
        let Some(memory) = self.store.data().memory else {
            if let Some(pending) = self.pending_pages.filter(|pending| pages < *pending) {
                return Err(EngineError::new(format!(
                    "cannot shrink linear memory from {pending} to {pages} pages"
                )));
            }
            self.pending_pages = Some(pages);
            log::debug!("no linear memory yet, deferring resize to {pages} pages");
            return Ok(());
        };
        self.grow_to(memory, u64::from(pages))
    }

    /// Reads the current value of `global`.
    pub fn get_global(&mut self, global: &GlobalHandle) -> EngineResult<TaggedValue> {
        let value = global.global.get(&mut self.store);
        let slot = val_to_slot(&value).ok_or(EngineError::from(GLOBAL_TYPE_MISMATCH))?;
        Ok(TaggedValue {
            ty: global.ty,
            slot,
        })
    }

    /// Writes `value` to `global`.
    pub fn set_global(&mut self, global: &GlobalHandle, value: TaggedValue) -> EngineResult<()> {
        if !global.mutable {
            return Err(IMMUTABLE_GLOBAL.into());
        }
        if value.ty != global.ty {
            return Err(GLOBAL_TYPE_MISMATCH.into());
        }
        let value = slot_to_val(value.slot, value.ty).ok_or(EngineError::from(GLOBAL_TYPE_MISMATCH))?;
        global
            .global
            .set(&mut self.store, value)
            .map_err(EngineError::from_wasmtime)
    }

    /// Finds the function import `namespace.name` of `module` and checks
    /// that `signature` describes its type exactly.
    pub fn find_import(
        &self,
        module: ModuleIndex,
        namespace: &str,
        name: &str,
        signature: &str,
    ) -> EngineResult<ImportHandle> {
        let (index, slot) = self
            .store
            .data()
            .imports
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.matches(module.0, namespace, name))
            .ok_or(EngineError::from(FUNCTION_LOOKUP_FAILED))?;
        let signature = imports::parse_signature(signature)?;
        if signature.params[..] != slot.params[..] || signature.results[..] != slot.results[..] {
            return Err(SIGNATURE_MISMATCH.into());
        }
        Ok(ImportHandle(index))
    }

    /// Routes calls of `import` to `call`, replacing any previous target.
    ///
    /// # Safety
    ///
    /// `call` must be safe to invoke with `context` and this runtime's user
    /// data for as long as the runtime exists.
    pub unsafe fn set_import_target(
        &mut self,
        import: ImportHandle,
        call: RawFunction,
        context: *mut c_void,
    ) {
        let Some(slot) = self.store.data_mut().imports.get_mut(import.0) else {
            log::debug!("ignoring link of unknown import slot {}", import.0);
            return;
        };
        slot.target = Some(LinkedTarget {
            call,
            context: Context(context),
        });
        log::trace!(
            "linked {}::{} in module {}",
            slot.namespace,
            slot.name,
            slot.module
        );
    }

    /// Links the function import `namespace.name` of `module` to `call`.
    ///
    /// This is [`Runtime::find_import`] followed by
    /// [`Runtime::set_import_target`].
    ///
    /// # Safety
    ///
    /// See [`Runtime::set_import_target`].
    pub unsafe fn link_raw_function(
        &mut self,
        module: ModuleIndex,
        namespace: &str,
        name: &str,
        signature: &str,
        call: RawFunction,
        context: *mut c_void,
    ) -> EngineResult<()> {
        let import = self.find_import(module, namespace, name, signature)?;
        unsafe { self.set_import_target(import, call, context) };
        Ok(())
    }
}

fn unsupported_import(module: &str, name: &str) -> EngineError {
    EngineError::new(format!("unsupported import {module}::{name}"))
}
