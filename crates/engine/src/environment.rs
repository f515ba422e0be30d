use crate::{EngineError, EngineResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use wasmtime::{Engine, OptLevel, WasmFeatures};

/// Stack size used for engines that only parse modules.
pub(crate) const DEFAULT_STACK_SIZE: usize = 512 * 1024;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Compilation settings shared by every engine of an [`Environment`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Optimization level used when compiling modules.
    pub opt_level: OptLevel,
    /// Whether the bulk memory proposal is enabled.
    pub bulk_memory: bool,
    /// Whether the multi-value proposal is enabled.
    pub multi_value: bool,
    /// Whether DWARF debug information is emitted for compiled code.
    pub debug_info: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            opt_level: OptLevel::Speed,
            bulk_memory: true,
            multi_value: true,
            debug_info: false,
        }
    }
}

/// The top-level engine context.
///
/// Modules are compiled against an environment and may only be loaded into
/// runtimes created from the same environment. Wasmtime fixes the maximum
/// stack size per `Engine`, so one engine is kept for each stack size that
/// has been requested.
pub struct Environment {
    id: usize,
    settings: Settings,
    engines: Mutex<HashMap<usize, Engine>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Creates an environment with default settings.
    pub fn new() -> EngineResult<Environment> {
        Environment::with_settings(Settings::default())
    }

    /// Creates an environment with the given settings.
    ///
    /// The parse engine is created eagerly so that invalid settings are
    /// reported here rather than on first use.
    pub fn with_settings(settings: Settings) -> EngineResult<Environment> {
        let env = Environment {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            settings,
            engines: Mutex::new(HashMap::new()),
        };
        env.engine(DEFAULT_STACK_SIZE)?;
        log::trace!("created engine environment {}", env.id);
        Ok(env)
    }

    /// A process-unique identifier for this environment.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The settings this environment was created with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the engine for `stack_size`, creating it on first use.
    pub(crate) fn engine(&self, stack_size: usize) -> EngineResult<Engine> {
        let mut engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = engines.get(&stack_size) {
            return Ok(engine.clone());
        }

        let mut config = wasmtime::Config::new();
        config
            .max_wasm_stack(stack_size)
            .cranelift_opt_level(self.settings.opt_level)
            .wasm_bulk_memory(self.settings.bulk_memory)
            .wasm_multi_value(self.settings.multi_value)
            .debug_info(self.settings.debug_info)
            .wasm_backtrace(false);
        if !self.settings.bulk_memory {
            // Reference types cannot be enabled without bulk memory.
            config.wasm_features(WasmFeatures::REFERENCE_TYPES, false);
        }
        let engine = Engine::new(&config).map_err(EngineError::from_wasmtime)?;
        log::debug!(
            "environment {}: created engine for {} byte stack",
            self.id,
            stack_size
        );
        engines.insert(stack_size, engine.clone());
        Ok(engine)
    }

    pub(crate) fn parse_engine(&self) -> EngineResult<Engine> {
        self.engine(DEFAULT_STACK_SIZE)
    }
}
