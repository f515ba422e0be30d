use wasmtime::{Val, ValType};

/// The type of a value crossing the engine boundary.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value; used as the return type of functions without results.
    None = 0,
    /// A 32-bit integer.
    I32 = 1,
    /// A 64-bit integer.
    I64 = 2,
    /// A 32-bit float.
    F32 = 3,
    /// A 64-bit float.
    F64 = 4,
    /// Any type this boundary cannot carry, such as references or vectors.
    Unknown = 5,
}

impl ValueType {
    /// The character used for this type in raw function signatures.
    pub fn signature_code(self) -> Option<char> {
        match self {
            ValueType::I32 => Some('i'),
            ValueType::I64 => Some('I'),
            ValueType::F32 => Some('f'),
            ValueType::F64 => Some('F'),
            ValueType::None | ValueType::Unknown => None,
        }
    }

    /// Parses a signature character back into a type.
    pub fn from_signature_code(code: char) -> Option<ValueType> {
        match code {
            'i' => Some(ValueType::I32),
            'I' => Some(ValueType::I64),
            'f' => Some(ValueType::F32),
            'F' => Some(ValueType::F64),
            _ => None,
        }
    }

    pub(crate) fn from_wasmtime(ty: &ValType) -> ValueType {
        match ty {
            ValType::I32 => ValueType::I32,
            ValType::I64 => ValueType::I64,
            ValType::F32 => ValueType::F32,
            ValType::F64 => ValueType::F64,
            _ => ValueType::Unknown,
        }
    }
}

/// A value together with its type, as returned when reading globals.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaggedValue {
    /// The type of the value.
    pub ty: ValueType,
    /// The zero-extended bit pattern of the value.
    pub slot: u64,
}

pub(crate) fn val_to_slot(val: &Val) -> Option<u64> {
    match *val {
        Val::I32(v) => Some(u64::from(v as u32)),
        Val::I64(v) => Some(v as u64),
        Val::F32(bits) => Some(u64::from(bits)),
        Val::F64(bits) => Some(bits),
        _ => None,
    }
}

pub(crate) fn slot_to_val(slot: u64, ty: ValueType) -> Option<Val> {
    match ty {
        ValueType::I32 => Some(Val::I32(slot as u32 as i32)),
        ValueType::I64 => Some(Val::I64(slot as i64)),
        ValueType::F32 => Some(Val::F32(slot as u32)),
        ValueType::F64 => Some(Val::F64(slot)),
        ValueType::None | ValueType::Unknown => None,
    }
}

pub(crate) fn default_val(ty: ValueType) -> Option<Val> {
    slot_to_val(0, ty)
}
