use crate::convert;
use std::mem;
use wasmlink_engine::ValueType;

/// A trait implemented for the Rust types that can cross the wasm boundary:
/// arguments and results of calls and host functions, global values, and
/// typed memory reads and writes.
///
/// This trait is sealed and cannot be implemented outside this crate.
///
/// | Rust type | wasm type | signature code |
/// |-----------|-----------|----------------|
/// | `i32`, `u32` | `i32` | `i` |
/// | `i64`, `u64` | `i64` | `I` |
/// | `isize` | `i64` on 64-bit targets, `i32` on 32-bit targets | `I` / `i` |
/// | `f32` | `f32` | `f` |
/// | `f64` | `f64` | `F` |
pub trait WasmType: Copy + Send + Sync + 'static + private::Sealed {
    /// The character used for this type in import signatures.
    const SIGNATURE: char;
    /// The wasm value type this Rust type corresponds to.
    const VALUE_TYPE: ValueType;
    /// The size of the type in linear memory.
    const BYTES: usize;

    /// Encodes `self` as a 64-bit slot holding its zero-extended bits.
    #[doc(hidden)]
    fn into_slot(self) -> u64;
    /// Decodes a slot produced by [`WasmType::into_slot`] or by the engine.
    #[doc(hidden)]
    fn from_slot(slot: u64) -> Self;
    /// Writes the little-endian encoding of `self` into `out`, which is
    /// exactly [`WasmType::BYTES`] long.
    #[doc(hidden)]
    fn write_le(self, out: &mut [u8]);
    /// Reads a value from exactly [`WasmType::BYTES`] little-endian bytes.
    #[doc(hidden)]
    fn read_le(bytes: &[u8]) -> Self;
}

/// Widening into and narrowing out of a 64-bit slot.
trait Bits: Copy {
    fn widen(self) -> u64;
    fn narrow(slot: u64) -> Self;
}

impl Bits for u32 {
    #[inline]
    fn widen(self) -> u64 {
        u64::from(self)
    }
    #[inline]
    fn narrow(slot: u64) -> u32 {
        slot as u32
    }
}

impl Bits for u64 {
    #[inline]
    fn widen(self) -> u64 {
        self
    }
    #[inline]
    fn narrow(slot: u64) -> u64 {
        slot
    }
}

macro_rules! le_bytes {
    ($primitive:ident) => {
        #[inline]
        fn write_le(self, out: &mut [u8]) {
            out.copy_from_slice(&self.to_le_bytes());
        }
        #[inline]
        fn read_le(bytes: &[u8]) -> $primitive {
            let mut buf = [0; mem::size_of::<$primitive>()];
            buf.copy_from_slice(bytes);
            $primitive::from_le_bytes(buf)
        }
    };
}

macro_rules! signed_integers {
    ($($primitive:ident/$bits:ident => $ty:ident $code:literal)*) => ($(
        impl WasmType for $primitive {
            const SIGNATURE: char = $code;
            const VALUE_TYPE: ValueType = ValueType::$ty;
            const BYTES: usize = mem::size_of::<$primitive>();
            #[inline]
            fn into_slot(self) -> u64 {
                convert::unsigned_from_signed(self).widen()
            }
            #[inline]
            fn from_slot(slot: u64) -> $primitive {
                convert::signed_from_unsigned($bits::narrow(slot))
            }
            le_bytes!($primitive);
        }
    )*)
}

signed_integers! {
    i32/u32 => I32 'i'
    i64/u64 => I64 'I'
}

macro_rules! unsigned_integers {
    ($($primitive:ident => $ty:ident $code:literal)*) => ($(
        impl WasmType for $primitive {
            const SIGNATURE: char = $code;
            const VALUE_TYPE: ValueType = ValueType::$ty;
            const BYTES: usize = mem::size_of::<$primitive>();
            #[inline]
            fn into_slot(self) -> u64 {
                self.widen()
            }
            #[inline]
            fn from_slot(slot: u64) -> $primitive {
                $primitive::narrow(slot)
            }
            le_bytes!($primitive);
        }
    )*)
}

unsigned_integers! {
    u32 => I32 'i'
    u64 => I64 'I'
}

macro_rules! floats {
    ($($float:ident/$int:ident => $ty:ident $code:literal)*) => ($(
        impl WasmType for $float {
            const SIGNATURE: char = $code;
            const VALUE_TYPE: ValueType = ValueType::$ty;
            const BYTES: usize = mem::size_of::<$float>();
            #[inline]
            fn into_slot(self) -> u64 {
                self.to_bits().widen()
            }
            #[inline]
            fn from_slot(slot: u64) -> $float {
                $float::from_bits($int::narrow(slot))
            }
            le_bytes!($float);
        }
    )*)
}

floats! {
    f32/u32 => F32 'f'
    f64/u64 => F64 'F'
}

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        type NativeInt = i64;
    } else if #[cfg(target_pointer_width = "32")] {
        type NativeInt = i32;
    } else {
        compile_error!("unsupported target pointer width");
    }
}

impl WasmType for isize {
    const SIGNATURE: char = <NativeInt as WasmType>::SIGNATURE;
    const VALUE_TYPE: ValueType = NativeInt::VALUE_TYPE;
    const BYTES: usize = mem::size_of::<isize>();
    #[inline]
    fn into_slot(self) -> u64 {
        (self as NativeInt).into_slot()
    }
    #[inline]
    fn from_slot(slot: u64) -> isize {
        NativeInt::from_slot(slot) as isize
    }
    le_bytes!(isize);
}

/// A trait implemented for the return types of host functions linked with
/// [`Module::link_function`](crate::Module::link_function): either `()` or a
/// single [`WasmType`].
pub trait WasmRet: private::SealedRet {
    /// The character used for this return type in import signatures.
    const SIGNATURE: char;
    /// The number of result slots this return type occupies.
    const SLOTS: usize;

    /// Stores `self` into the leading result slots of a call stack. Returns
    /// `false` if there is no room for it.
    #[doc(hidden)]
    fn store(self, slots: &mut [u64]) -> bool;
}

impl WasmRet for () {
    const SIGNATURE: char = 'v';
    const SLOTS: usize = 0;

    #[inline]
    fn store(self, _slots: &mut [u64]) -> bool {
        true
    }
}

impl<T: WasmType> WasmRet for T {
    const SIGNATURE: char = <T as WasmType>::SIGNATURE;
    const SLOTS: usize = 1;

    #[inline]
    fn store(self, slots: &mut [u64]) -> bool {
        match slots.first_mut() {
            Some(slot) => {
                *slot = self.into_slot();
                true
            }
            None => false,
        }
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
    impl Sealed for i64 {}
    impl Sealed for u64 {}
    impl Sealed for isize {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}

    pub trait SealedRet {}
    impl SealedRet for () {}
    impl<T: super::WasmType> SealedRet for T {}
}
