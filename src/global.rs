use crate::{Error, Result, Runtime, WasmType};
use std::fmt;
use std::marker;
use wasmlink_engine::{GlobalHandle, TaggedValue, ValueType};

/// A typed handle to a global of a loaded module.
///
/// The wasm type of the global is only checked when it is accessed: reading
/// or writing a global whose type is not `T`'s fails with
/// [`Error::InvalidSignature`]. Every access goes to the live global; nothing
/// is cached.
pub struct Global<T> {
    runtime: u64,
    raw: GlobalHandle,
    _marker: marker::PhantomData<fn() -> T>,
}

impl<T> Clone for Global<T> {
    fn clone(&self) -> Global<T> {
        *self
    }
}

impl<T> Copy for Global<T> {}

impl<T> fmt::Debug for Global<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Global")
            .field("ty", &self.raw.ty())
            .field("mutable", &self.raw.is_mutable())
            .finish()
    }
}

impl<T: WasmType> Global<T> {
    pub(crate) fn new(runtime: u64, raw: GlobalHandle) -> Global<T> {
        Global {
            runtime,
            raw,
            _marker: marker::PhantomData,
        }
    }

    /// The wasm type of the global.
    pub fn value_type(&self) -> ValueType {
        self.raw.ty()
    }

    /// Whether the global can be written.
    pub fn is_mutable(&self) -> bool {
        self.raw.is_mutable()
    }

    fn check_type(&self) -> Result<()> {
        if self.raw.ty() == T::VALUE_TYPE {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }

    /// Reads the current value of the global.
    ///
    /// # Panics
    ///
    /// Panics if this global was not found in `runtime`.
    pub fn value(&self, runtime: &mut Runtime) -> Result<T> {
        runtime.assert_owns(self.runtime);
        self.check_type()?;
        let value = runtime.raw.get_global(&self.raw)?;
        if value.ty != T::VALUE_TYPE {
            return Err(Error::InvalidSignature);
        }
        Ok(T::from_slot(value.slot))
    }

    /// Writes `value` to the global.
    ///
    /// Writing an immutable global fails with an [`Error::Engine`] error.
    ///
    /// # Panics
    ///
    /// Panics if this global was not found in `runtime`.
    pub fn set(&self, runtime: &mut Runtime, value: T) -> Result<()> {
        runtime.assert_owns(self.runtime);
        self.check_type()?;
        runtime.raw.set_global(
            &self.raw,
            TaggedValue {
                ty: T::VALUE_TYPE,
                slot: value.into_slot(),
            },
        )?;
        Ok(())
    }
}
