mod func;
mod globals;
mod memory;

use wasmlink::{Environment, Module, Runtime};

/// Stack size used by every runtime created in these tests.
pub(crate) const STACK_SIZE: usize = 60 * 1024;

/// Exports of this module cover every scalar type and the common call
/// shapes.
pub(crate) const ARITHMETIC: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "add_u32") (param i32 i32) (result i32)
    local.get 0
    local.get 1
    i32.add)
  (func (export "add_u64") (param i64 i64) (result i64)
    local.get 0
    local.get 1
    i64.add)
  (func (export "invert") (param i64) (result i64)
    local.get 0
    i64.const -1
    i64.xor)
  (func (export "constant") (result i64)
    i64.const 0xDEADBEEF0000FFFF)
  (func (export "u32") (result i32)
    i32.const 0xDEADBEEF)
  (func (export "half") (param f32) (result f32)
    local.get 0
    f32.const 0.5
    f32.mul)
  (func (export "scale") (param f64 i32) (result f64)
    local.get 0
    local.get 1
    f64.convert_i32_s
    f64.mul)
  (func (export "div") (param i32 i32) (result i32)
    local.get 0
    local.get 1
    i32.div_s)
  (func (export "no_return") (param i64))
  (func (export "empty"))
  (func (export "trap")
    unreachable)
  (global (export "answer") i32 (i32.const 42))
)
"#;

/// Creates a runtime in a fresh environment and loads the module written
/// in `wat` into it.
pub(crate) fn instantiate(wat: &str) -> anyhow::Result<(Runtime, Module)> {
    let _ = env_logger::try_init();
    let env = Environment::new()?;
    let mut runtime = env.create_runtime(STACK_SIZE)?;
    let module = runtime.parse_and_load_module(&wat::parse_str(wat)?)?;
    Ok((runtime, module))
}
