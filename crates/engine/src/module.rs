use crate::environment::DEFAULT_STACK_SIZE;
use crate::{
    EngineError, EngineResult, Environment, INCOMPATIBLE_WASM_VERSION, WASM_MALFORMED,
    WASM_UNDERRUN,
};
use std::sync::Arc;
use wasmtime::{Engine, Module};

const WASM_MAGIC: [u8; 4] = *b"\0asm";
const WASM_VERSION: u32 = 1;

/// A compiled module that has not been loaded into a runtime yet.
#[derive(Clone)]
pub struct ParsedModule {
    env_id: usize,
    stack_size: usize,
    bytes: Arc<[u8]>,
    module: Module,
}

impl ParsedModule {
    /// The id of the environment this module was parsed against.
    pub fn environment_id(&self) -> usize {
        self.env_id
    }

    /// The binary this module was parsed from.
    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    /// The module name from the name section, if any.
    pub fn name(&self) -> Option<&str> {
        self.module.name()
    }

    /// Returns a module compiled for an engine with `stack_size`.
    ///
    /// Wasmtime ties compiled code to the engine that produced it, so a
    /// module parsed with one stack size is recompiled from its retained
    /// bytes before being loaded into a runtime with another.
    pub(crate) fn module_for(&self, engine: &Engine, stack_size: usize) -> EngineResult<Module> {
        if self.stack_size == stack_size && Engine::same(self.module.engine(), engine) {
            return Ok(self.module.clone());
        }
        log::trace!("recompiling module for {stack_size} byte stack");
        compile(engine, &self.bytes)
    }
}

/// Parses and validates `bytes` against `env`.
pub fn parse_module(env: &Environment, bytes: &[u8]) -> EngineResult<ParsedModule> {
    check_header(bytes)?;
    let engine = env.parse_engine()?;
    let module = compile(&engine, bytes)?;
    log::debug!(
        "parsed module {:?} ({} bytes)",
        module.name().unwrap_or("<unnamed>"),
        bytes.len()
    );
    Ok(ParsedModule {
        env_id: env.id(),
        stack_size: DEFAULT_STACK_SIZE,
        bytes: Arc::from(bytes),
        module,
    })
}

fn check_header(bytes: &[u8]) -> EngineResult<()> {
    let Some((magic, rest)) = bytes.split_first_chunk::<4>() else {
        return Err(WASM_UNDERRUN.into());
    };
    let Some((version, _)) = rest.split_first_chunk::<4>() else {
        return Err(WASM_UNDERRUN.into());
    };
    if *magic != WASM_MAGIC {
        return Err(WASM_MALFORMED.into());
    }
    if u32::from_le_bytes(*version) != WASM_VERSION {
        return Err(INCOMPATIBLE_WASM_VERSION.into());
    }
    Ok(())
}

fn compile(engine: &Engine, bytes: &[u8]) -> EngineResult<Module> {
    Module::from_binary(engine, bytes).map_err(|err| {
        let message = format!("{err:#}");
        if message.contains("unexpected end") {
            EngineError::from(WASM_UNDERRUN)
        } else {
            EngineError::new(message)
        }
    })
}
