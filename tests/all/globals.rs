use crate::{ARITHMETIC, instantiate};
use anyhow::Result;
use wasmlink::{Error, ValueType};

const GLOBALS: &str = r#"
(module
  (import "env" "g" (global $g (mut i32)))
  (global (export "constant") i64 (i64.const -5))
  (global (export "ratio") (mut f64) (f64.const 0.25))
  (func (export "f")
    i32.const 100
    global.set $g)
  (func (export "get_g") (result i32)
    global.get $g)
  (func (export "ratio_plus") (param f64) (result f64)
    global.get 2
    local.get 0
    f64.add)
)
"#;

#[test]
fn imported_global() -> Result<()> {
    let (mut runtime, module) = instantiate(GLOBALS)?;
    let g = module
        .find_global::<i32>(&mut runtime, "g")?
        .expect("imported global");
    assert_eq!(g.value_type(), ValueType::I32);
    assert!(g.is_mutable());
    assert_eq!(g.value(&mut runtime)?, 0);

    runtime.find_function("f")?.call(&mut runtime, ())?;
    assert_eq!(g.value(&mut runtime)?, 100);

    g.set(&mut runtime, -1)?;
    assert_eq!(g.value(&mut runtime)?, -1);
    let get_g = runtime.find_function("get_g")?;
    assert_eq!(get_g.call_typed::<i32>(&mut runtime, ())?, -1);
    Ok(())
}

#[test]
fn same_bits_through_unsigned_handle() -> Result<()> {
    let (mut runtime, module) = instantiate(GLOBALS)?;
    let signed = module.find_global::<i32>(&mut runtime, "g")?.expect("g");
    let unsigned = module.find_global::<u32>(&mut runtime, "g")?.expect("g");
    signed.set(&mut runtime, -1)?;
    assert_eq!(unsigned.value(&mut runtime)?, u32::MAX);
    unsigned.set(&mut runtime, 0x8000_0000)?;
    assert_eq!(signed.value(&mut runtime)?, i32::MIN);
    Ok(())
}

#[test]
fn immutable_global() -> Result<()> {
    let (mut runtime, module) = instantiate(GLOBALS)?;
    let constant = module
        .find_global::<i64>(&mut runtime, "constant")?
        .expect("constant");
    assert!(!constant.is_mutable());
    assert_eq!(constant.value(&mut runtime)?, -5);

    let err = constant.set(&mut runtime, 1).unwrap_err();
    assert!(matches!(err, Error::Engine(_)), "{err}");
    assert!(!err.is_trap());
    assert_eq!(constant.value(&mut runtime)?, -5);
    Ok(())
}

#[test]
fn float_global() -> Result<()> {
    let (mut runtime, module) = instantiate(GLOBALS)?;
    let ratio = module
        .find_global::<f64>(&mut runtime, "ratio")?
        .expect("ratio");
    assert_eq!(ratio.value(&mut runtime)?, 0.25);
    ratio.set(&mut runtime, 0.5)?;
    let plus = runtime.find_function("ratio_plus")?;
    assert_eq!(plus.call_typed::<f64>(&mut runtime, 1.0f64)?, 1.5);
    Ok(())
}

#[test]
fn type_mismatch() -> Result<()> {
    let (mut runtime, module) = instantiate(GLOBALS)?;
    let wrong = module
        .find_global::<i32>(&mut runtime, "constant")?
        .expect("constant");
    assert_eq!(wrong.value_type(), ValueType::I64);
    assert_eq!(wrong.value(&mut runtime), Err(Error::InvalidSignature));
    assert_eq!(wrong.set(&mut runtime, 3), Err(Error::InvalidSignature));

    let wrong = module.find_global::<f32>(&mut runtime, "ratio")?.expect("ratio");
    assert_eq!(wrong.value(&mut runtime), Err(Error::InvalidSignature));
    Ok(())
}

#[test]
fn missing_global() -> Result<()> {
    let (mut runtime, module) = instantiate(GLOBALS)?;
    assert!(module.find_global::<i32>(&mut runtime, "nope")?.is_none());
    // Function exports are not globals.
    assert!(module.find_global::<i32>(&mut runtime, "f")?.is_none());

    let (mut runtime, module) = instantiate(ARITHMETIC)?;
    let answer = module
        .find_global::<i32>(&mut runtime, "answer")?
        .expect("answer");
    assert_eq!(answer.value(&mut runtime)?, 42);
    Ok(())
}
