use crate::{Error, Result, Runtime, WasmType};
use smallvec::SmallVec;
use std::ffi::c_void;
use wasmlink_engine::ValueType;

/// A list of typed arguments for [`Function::call`].
///
/// Implemented for `()`, for any single [`WasmType`], and for tuples of up
/// to 16 [`WasmType`]s.
pub trait WasmArgs {
    /// Encodes the arguments as `(type, slot)` pairs in declaration order.
    #[doc(hidden)]
    fn into_slots(self) -> SmallVec<[(ValueType, u64); 8]>;
}

impl<T: WasmType> WasmArgs for T {
    fn into_slots(self) -> SmallVec<[(ValueType, u64); 8]> {
        smallvec::smallvec![(T::VALUE_TYPE, self.into_slot())]
    }
}

macro_rules! impl_wasm_args {
    ($num:tt $($args:ident)*) => {
        #[allow(non_snake_case)]
        impl<$($args: WasmType,)*> WasmArgs for ($($args,)*) {
            fn into_slots(self) -> SmallVec<[(ValueType, u64); 8]> {
                let ($($args,)*) = self;
                let mut slots = SmallVec::with_capacity($num);
                let _ = &mut slots;
                $(slots.push(($args::VALUE_TYPE, $args.into_slot()));)*
                slots
            }
        }
    };
}

for_each_function_signature!(impl_wasm_args);

/// An exported wasm function resolved in a [`Runtime`].
///
/// A function is only meaningful for the runtime that resolved it; using it
/// with any other runtime panics.
#[derive(Clone, Debug)]
pub struct Function {
    pub(crate) runtime: u64,
    pub(crate) raw: wasmlink_engine::Function,
}

impl Function {
    /// Number of parameters.
    pub fn num_args(&self) -> usize {
        self.raw.params().len()
    }

    /// Number of results.
    pub fn num_returns(&self) -> usize {
        self.raw.results().len()
    }

    /// Type of parameter `index`.
    pub fn arg_type(&self, index: usize) -> Option<ValueType> {
        self.raw.params().get(index).copied()
    }

    /// Type of result `index`.
    pub fn return_type(&self, index: usize) -> Option<ValueType> {
        self.raw.results().get(index).copied()
    }

    /// Calls this function, discarding any results.
    ///
    /// Fails with [`Error::InvalidSignature`] if the number or types of
    /// `args` do not match the function's parameters. Traps surface as
    /// [`Error::Engine`].
    ///
    /// # Panics
    ///
    /// Panics if this function was not resolved in `runtime`.
    pub fn call(&self, runtime: &mut Runtime, args: impl WasmArgs) -> Result<()> {
        runtime.assert_owns(self.runtime);
        let slots = args.into_slots();
        if slots.len() != self.num_args()
            || slots
                .iter()
                .zip(self.raw.params())
                .any(|((ty, _), param)| ty != param)
        {
            return Err(Error::InvalidSignature);
        }
        let ptrs: SmallVec<[*const c_void; 8]> = slots
            .iter()
            .map(|(_, slot)| std::ptr::from_ref(slot).cast::<c_void>())
            .collect();
        // SAFETY: every pointer refers to a live 8-byte slot in `slots`, and
        // `assert_owns` checked that the function belongs to this runtime.
        unsafe { runtime.raw.call(&self.raw, &ptrs)? };
        Ok(())
    }

    /// Calls this function and returns its single result as `R`.
    ///
    /// The function must declare exactly one result whose wasm type is `R`'s
    /// (see [`WasmType`]); otherwise this fails with
    /// [`Error::InvalidSignature`] without calling anything.
    ///
    /// # Panics
    ///
    /// Panics if this function was not resolved in `runtime`.
    pub fn call_typed<R: WasmType>(&self, runtime: &mut Runtime, args: impl WasmArgs) -> Result<R> {
        match self.raw.results() {
            [ty] if *ty == R::VALUE_TYPE => {}
            _ => return Err(Error::InvalidSignature),
        }
        self.call(runtime, args)?;
        let results = runtime.raw.get_results(&self.raw, 1)?;
        let slot = results.first().ok_or(Error::AllocationFailed)?;
        Ok(R::from_slot(*slot))
    }
}
