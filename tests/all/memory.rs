use crate::{STACK_SIZE, instantiate};
use anyhow::Result;
use wasmlink::{Environment, Error, MemoryView};

const FILL: &str = r#"
(module
  (memory (export "mem") 1)
  (func (export "fill") (param i32 i32 i32)
    local.get 0
    local.get 1
    local.get 2
    memory.fill)
  (func (export "load") (param i32) (result i32)
    local.get 0
    i32.load)
)
"#;

const MEMORY_SIZE: &str = r#"
(module
  (memory (export "memory") 0)
  (func (export "memory_size") (result i32)
    memory.size)
)
"#;

const PAGE: usize = 64 * 1024;

#[test]
fn fill() -> Result<()> {
    let (mut runtime, _) = instantiate(FILL)?;
    let fill = runtime.find_function("fill")?;
    fill.call(&mut runtime, (0u32, 13u32, 5u32))?;
    fill.call(&mut runtime, (10u32, 77u32, 7u32))?;
    fill.call(&mut runtime, (20u32, 255u32, 1000u32))?;

    let memory = runtime.memory()?;
    assert_eq!(memory.len(), PAGE);
    assert!(memory.read_bytes(0, 5)?.iter().all(|b| *b == 13));
    assert!(memory.read_bytes(5, 5)?.iter().all(|b| *b == 0));
    assert!(memory.read_bytes(10, 7)?.iter().all(|b| *b == 77));
    assert!(memory.read_bytes(17, 3)?.iter().all(|b| *b == 0));
    assert!(memory.read_bytes(20, 1000)?.iter().all(|b| *b == 255));
    assert_eq!(memory.read_bytes(1020, 1)?, &[0]);
    Ok(())
}

#[test]
fn wasm_out_of_bounds_traps() -> Result<()> {
    let (mut runtime, _) = instantiate(FILL)?;
    let fill = runtime.find_function("fill")?;
    let err = fill
        .call(&mut runtime, (PAGE as u32 - 2, 1u32, 4u32))
        .unwrap_err();
    assert!(err.is_trap(), "{err}");
    assert!(err.to_string().contains("out of bounds"), "{err}");
    assert!(runtime.memory()?.as_slice().iter().all(|b| *b == 0));
    Ok(())
}

#[test]
fn host_and_wasm_share_memory() -> Result<()> {
    let (mut runtime, _) = instantiate(FILL)?;
    runtime.memory()?.write_value(100, 0xDEAD_BEEF_u32)?;
    let load = runtime.find_function("load")?;
    assert_eq!(load.call_typed::<u32>(&mut runtime, 100u32)?, 0xDEAD_BEEF);

    let fill = runtime.find_function("fill")?;
    fill.call(&mut runtime, (200u32, 0x41u32, 3u32))?;
    assert_eq!(runtime.memory()?.read_string(200, 3)?, "AAA");
    Ok(())
}

#[test]
fn typed_access() -> Result<()> {
    let (mut runtime, _) = instantiate(FILL)?;
    let mut memory = runtime.memory()?;
    memory.write_values(8, &[1.5f64, -2.0, 0.0])?;
    assert_eq!(memory.read_values::<f64>(8, 3)?, vec![1.5, -2.0, 0.0]);
    assert_eq!(memory.read_value::<u64>(16)?, (-2.0f64).to_bits());

    memory.write_values(64, &[-1i32, 7])?;
    assert_eq!(memory.read_bytes(64, 8)?, &[0xff, 0xff, 0xff, 0xff, 7, 0, 0, 0]);

    memory.write_str(128, "hello")?;
    assert_eq!(memory.read_string(128, 5)?, "hello");
    Ok(())
}

#[test]
fn host_out_of_bounds() -> Result<()> {
    let (mut runtime, _) = instantiate(FILL)?;
    let mut memory = runtime.memory()?;
    assert!(memory.valid(0, PAGE));
    assert!(!memory.valid(0, PAGE + 1));
    assert!(!memory.valid(PAGE, 0));
    assert!(!memory.valid(usize::MAX, 2));

    assert_eq!(
        memory.write(PAGE - 2, &[1, 2, 3]),
        Err(Error::InvalidMemoryAccess)
    );
    assert_eq!(memory.read_bytes(PAGE - 2, 2)?, &[0, 0]);
    assert_eq!(
        memory.read_value::<u64>(PAGE - 4),
        Err(Error::InvalidMemoryAccess)
    );
    let mut buf = [0u8; 4];
    assert_eq!(memory.read(PAGE, &mut buf), Err(Error::InvalidMemoryAccess));
    Ok(())
}

#[test]
fn resize() -> Result<()> {
    let (mut runtime, _) = instantiate(MEMORY_SIZE)?;
    let size = runtime.find_function("memory_size")?;
    assert_eq!(size.call_typed::<u32>(&mut runtime, ())?, 0);
    assert!(runtime.memory()?.is_empty());

    runtime.resize_memory(1)?;
    assert_eq!(size.call_typed::<u32>(&mut runtime, ())?, 1);
    runtime.resize_memory(5)?;
    assert_eq!(size.call_typed::<u32>(&mut runtime, ())?, 5);
    assert_eq!(runtime.memory()?.len(), 5 * PAGE);

    runtime.resize_memory(5)?;
    assert_eq!(size.call_typed::<u32>(&mut runtime, ())?, 5);
    assert!(runtime.resize_memory(3).is_err());
    assert_eq!(runtime.memory()?.len(), 5 * PAGE);
    Ok(())
}

#[test]
fn resize_preserves_contents() -> Result<()> {
    let (mut runtime, _) = instantiate(FILL)?;
    runtime.memory()?.write(PAGE - 1, &[9])?;
    runtime.resize_memory(3)?;
    let memory = runtime.memory()?;
    assert_eq!(memory.len(), 3 * PAGE);
    assert_eq!(memory.read_bytes(PAGE - 1, 2)?, &[9, 0]);
    Ok(())
}

#[test]
fn no_memory() -> Result<()> {
    let env = Environment::new()?;
    let mut runtime = env.create_runtime(STACK_SIZE)?;
    assert_eq!(runtime.memory().unwrap_err(), Error::InvalidMemoryAccess);

    // The size is kept until a module brings a memory.
    runtime.resize_memory(2)?;
    assert_eq!(runtime.memory().unwrap_err(), Error::InvalidMemoryAccess);
    assert!(runtime.resize_memory(1).is_err());

    runtime.parse_and_load_module(&wat::parse_str(MEMORY_SIZE)?)?;
    let size = runtime.find_function("memory_size")?;
    assert_eq!(size.call_typed::<u32>(&mut runtime, ())?, 2);
    let mut memory = runtime.memory()?;
    assert_eq!(memory.len(), 2 * PAGE);
    memory.write_value(PAGE, 7i64)?;
    assert_eq!(memory.read_value::<i64>(PAGE)?, 7);
    Ok(())
}

const STORE_AND_PEEK: &str = r#"
(module
  (import "env" "peek" (func $peek (param i32) (result i32)))
  (memory (export "memory") 1)
  (func (export "store_and_peek") (result i32)
    i32.const 10
    i32.const 99
    i32.store8
    i32.const 10
    call $peek)
  (func (export "memory_size") (result i32)
    memory.size)
)
"#;

const IMPORTED_STORE_AND_PEEK: &str = r#"
(module
  (import "env" "memory" (memory 1))
  (import "env" "peek" (func $peek (param i32) (result i32)))
  (func (export "store_and_peek_imported") (result i32)
    i32.const 20
    i32.const 99
    i32.store8
    i32.const 20
    call $peek)
)
"#;

fn link_peek(runtime: &mut wasmlink::Runtime, module: wasmlink::Module) -> Result<()> {
    module.link_function(runtime, "env", "peek", |mem: MemoryView<'_>, at: u32| -> u32 {
        match mem.read_value::<u32>(at as usize) {
            Ok(value) => value & 0xff,
            Err(_) => u32::MAX,
        }
    })?;
    Ok(())
}

#[test]
fn resize_before_load_grows_module_memory() -> Result<()> {
    let env = Environment::new()?;
    let mut runtime = env.create_runtime(STACK_SIZE)?;
    runtime.resize_memory(2)?;
    let module = runtime.parse_and_load_module(&wat::parse_str(STORE_AND_PEEK)?)?;
    link_peek(&mut runtime, module)?;

    let run = runtime.find_function("store_and_peek")?;
    assert_eq!(run.call_typed::<u32>(&mut runtime, ())?, 99);
    let size = runtime.find_function("memory_size")?;
    assert_eq!(size.call_typed::<u32>(&mut runtime, ())?, 2);
    let memory = runtime.memory()?;
    assert_eq!(memory.len(), 2 * PAGE);
    assert_eq!(memory.read_bytes(10, 1)?, &[99]);
    Ok(())
}

#[test]
fn later_modules_share_the_first_memory() -> Result<()> {
    let (mut runtime, first) = instantiate(STORE_AND_PEEK)?;
    link_peek(&mut runtime, first)?;

    // A second module bringing its own memory is refused.
    let err = runtime
        .parse_and_load_module(&wat::parse_str(STORE_AND_PEEK)?)
        .unwrap_err();
    assert!(matches!(err, Error::Engine(_)), "{err}");
    assert!(err.to_string().contains("linear memory"), "{err}");
    assert_eq!(runtime.modules(), vec![first]);

    let second = runtime.parse_and_load_module(&wat::parse_str(IMPORTED_STORE_AND_PEEK)?)?;
    link_peek(&mut runtime, second)?;
    let run = runtime.find_function("store_and_peek_imported")?;
    assert_eq!(run.call_typed::<u32>(&mut runtime, ())?, 99);
    let run = runtime.find_function("store_and_peek")?;
    assert_eq!(run.call_typed::<u32>(&mut runtime, ())?, 99);

    let memory = runtime.memory()?;
    assert_eq!(memory.len(), PAGE);
    assert_eq!(memory.read_bytes(10, 11)?[0], 99);
    assert_eq!(memory.read_bytes(10, 11)?[10], 99);
    Ok(())
}
