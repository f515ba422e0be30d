use crate::{ARITHMETIC, instantiate};
use anyhow::Result;
use proptest::prelude::*;
use wasmlink::{Error, ValueType};

#[test]
fn add_u32() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;
    let add = runtime.find_function("add_u32")?;
    assert_eq!(add.call_typed::<u32>(&mut runtime, (124u32, 612u32))?, 736);
    assert_eq!(add.call_typed::<u32>(&mut runtime, (u32::MAX, 1u32))?, 0);
    Ok(())
}

#[test]
fn add_u64() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;
    let add = runtime.find_function("add_u64")?;
    assert_eq!(
        add.call_typed::<u64>(&mut runtime, (u64::MAX - 1, 1u64))?,
        u64::MAX
    );
    Ok(())
}

#[test]
fn signed_results() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;
    let invert = runtime.find_function("invert")?;
    assert_eq!(invert.call_typed::<i64>(&mut runtime, 736i64)?, -737);
    assert_eq!(invert.call_typed::<i64>(&mut runtime, -1i64)?, 0);
    Ok(())
}

#[test]
fn results_keep_their_bits() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;

    let constant = runtime.find_function("constant")?;
    assert_eq!(
        constant.call_typed::<u64>(&mut runtime, ())?,
        0xDEAD_BEEF_0000_FFFF
    );
    assert_eq!(
        constant.call_typed::<i64>(&mut runtime, ())?,
        0xDEAD_BEEF_0000_FFFF_u64 as i64
    );

    let narrow = runtime.find_function("u32")?;
    assert_eq!(narrow.call_typed::<u32>(&mut runtime, ())?, 0xDEAD_BEEF);
    assert_eq!(
        narrow.call_typed::<i32>(&mut runtime, ())?,
        0xDEAD_BEEF_u32 as i32
    );
    Ok(())
}

#[test]
fn floats() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;
    let half = runtime.find_function("half")?;
    assert_eq!(half.call_typed::<f32>(&mut runtime, 3.0f32)?, 1.5);

    let scale = runtime.find_function("scale")?;
    assert_eq!(scale.call_typed::<f64>(&mut runtime, (0.25f64, -8i32))?, -2.0);
    Ok(())
}

#[cfg(target_pointer_width = "64")]
#[test]
fn native_width_integers() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;
    let add = runtime.find_function("add_u64")?;
    assert_eq!(add.call_typed::<isize>(&mut runtime, (-5isize, 2isize))?, -3);
    Ok(())
}

#[test]
fn introspection() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;

    let scale = runtime.find_function("scale")?;
    assert_eq!(scale.num_args(), 2);
    assert_eq!(scale.num_returns(), 1);
    assert_eq!(scale.arg_type(0), Some(ValueType::F64));
    assert_eq!(scale.arg_type(1), Some(ValueType::I32));
    assert_eq!(scale.arg_type(2), None);
    assert_eq!(scale.return_type(0), Some(ValueType::F64));

    let empty = runtime.find_function("empty")?;
    assert_eq!(empty.num_args(), 0);
    assert_eq!(empty.num_returns(), 0);
    assert_eq!(empty.return_type(0), None);
    Ok(())
}

#[test]
fn result_type_mismatch() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;
    let add = runtime.find_function("add_u32")?;
    assert_eq!(
        add.call_typed::<f64>(&mut runtime, (1u32, 2u32)),
        Err(Error::InvalidSignature)
    );
    assert_eq!(
        add.call_typed::<u64>(&mut runtime, (1u32, 2u32)),
        Err(Error::InvalidSignature)
    );

    let no_return = runtime.find_function("no_return")?;
    no_return.call(&mut runtime, 5i64)?;
    assert_eq!(
        no_return.call_typed::<i64>(&mut runtime, 5i64),
        Err(Error::InvalidSignature)
    );
    Ok(())
}

#[test]
fn argument_mismatch() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;
    let add = runtime.find_function("add_u32")?;
    assert_eq!(
        add.call_typed::<u32>(&mut runtime, 1u32),
        Err(Error::InvalidSignature)
    );
    assert_eq!(
        add.call_typed::<u32>(&mut runtime, (1u32, 2u32, 3u32)),
        Err(Error::InvalidSignature)
    );
    assert_eq!(
        add.call_typed::<u32>(&mut runtime, (1u64, 2u64)),
        Err(Error::InvalidSignature)
    );
    // The function is still usable afterwards.
    assert_eq!(add.call_typed::<u32>(&mut runtime, (1u32, 2u32))?, 3);
    Ok(())
}

#[test]
fn traps() -> Result<()> {
    let (mut runtime, _) = instantiate(ARITHMETIC)?;

    let err = runtime.find_function("trap")?.call(&mut runtime, ()).unwrap_err();
    assert!(err.is_trap(), "{err}");
    assert!(err.to_string().contains("unreachable"), "{err}");

    let div = runtime.find_function("div")?;
    let err = div.call_typed::<i32>(&mut runtime, (1i32, 0i32)).unwrap_err();
    assert!(err.is_trap(), "{err}");
    assert!(err.to_string().contains("divide by zero"), "{err}");

    // A trap does not poison the runtime.
    assert_eq!(div.call_typed::<i32>(&mut runtime, (-9i32, 3i32))?, -3);
    Ok(())
}

#[test]
fn lookup_failures() -> Result<()> {
    let (mut runtime, module) = instantiate(ARITHMETIC)?;
    assert_eq!(
        runtime.find_function("nope").unwrap_err(),
        Error::FunctionLookupFailed
    );
    assert_eq!(
        module.find_function(&mut runtime, "nope").unwrap_err(),
        Error::FunctionLookupFailed
    );
    assert_eq!(
        runtime.find_function("memory").unwrap_err(),
        Error::MissingFunction
    );
    assert_eq!(
        module.find_function(&mut runtime, "answer").unwrap_err(),
        Error::MissingFunction
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn add_wraps_like_rust(a: u32, b: u32, c: i64, d: i64) {
        let (mut runtime, _) = instantiate(ARITHMETIC).unwrap();
        let add = runtime.find_function("add_u32").unwrap();
        prop_assert_eq!(add.call_typed::<u32>(&mut runtime, (a, b)).unwrap(), a.wrapping_add(b));
        let add = runtime.find_function("add_u64").unwrap();
        prop_assert_eq!(add.call_typed::<i64>(&mut runtime, (c, d)).unwrap(), c.wrapping_add(d));
    }
}
