//! Lossless reinterpretation between signed and unsigned integers.
//!
//! Wasm integers carry no signedness; the same bits are an `i32` or a `u32`
//! depending on who reads them. The conversions here reinterpret the two's
//! complement bit pattern and never trap or saturate, so
//! `signed_from_unsigned(unsigned_from_signed(x)) == x` for every `x`.

/// A signed integer type with an unsigned counterpart of the same width.
pub trait Signed: Copy {
    /// The unsigned integer type of the same width.
    type Unsigned: Copy;

    /// Reinterprets the bits of `self` as the unsigned type.
    fn to_unsigned(self) -> Self::Unsigned;

    /// Reinterprets the bits of `bits` as the signed type.
    fn from_unsigned(bits: Self::Unsigned) -> Self;
}

macro_rules! signed {
    ($($signed:ident => $unsigned:ident)*) => ($(
        impl Signed for $signed {
            type Unsigned = $unsigned;

            #[inline]
            fn to_unsigned(self) -> $unsigned {
                $unsigned::from_ne_bytes(self.to_ne_bytes())
            }

            #[inline]
            fn from_unsigned(bits: $unsigned) -> $signed {
                $signed::from_ne_bytes(bits.to_ne_bytes())
            }
        }
    )*)
}

signed! {
    i8 => u8
    i16 => u16
    i32 => u32
    i64 => u64
    isize => usize
}

/// Returns the unsigned integer with the same bits as `value`.
#[inline]
pub fn unsigned_from_signed<S: Signed>(value: S) -> S::Unsigned {
    value.to_unsigned()
}

/// Returns the signed integer with the same bits as `value`.
#[inline]
pub fn signed_from_unsigned<S: Signed>(value: S::Unsigned) -> S {
    S::from_unsigned(value)
}
