//! Linking Rust closures to wasm function imports.
//!
//! Every linked closure is reached through the same C-ABI [`trampoline`]. The
//! engine hands the trampoline the runtime's [`LinkedFunctionRegistry`] as
//! user data and a [`ContextKey`] as the import's context. The trampoline
//! looks the key up and runs the type-erased function that was built for the
//! closure when it was linked. That function decodes the arguments from the
//! slot stack, calls the closure and stores its result back on the stack.

use crate::registry::{ContextKey, HostFunc, LinkedFunctionRegistry, host_func};
use crate::{Error, MemoryView, Result, WasmRet, WasmType};
use std::ffi::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use wasmlink_engine::{ModuleIndex, RAW_TRAP_UNREACHABLE, slice_from_raw_parts_mut};

/// A trait implemented for closures that can be linked to a wasm function
/// import with [`Module::link_function`](crate::Module::link_function).
///
/// This is implemented for `Fn` closures taking up to 16 [`WasmType`]
/// arguments and returning a [`WasmRet`], optionally preceded by a
/// [`MemoryView`] of the runtime's linear memory:
///
/// ```ignore
/// module.link_function(&mut runtime, "env", "add", |a: i32, b: i32| a + b)?;
/// module.link_function(&mut runtime, "env", "fill", |mut mem: MemoryView<'_>, ptr: u32, len: u32| {
///     let _ = mem.write(ptr as usize, &vec![0; len as usize]);
/// })?;
/// ```
///
/// The memory view is not part of the wasm signature. A host function
/// expecting one traps if the runtime has no linear memory.
pub trait IntoHostFunc<Params, Results>: Send + Sync + 'static {
    /// The engine signature string of this function, such as `"i(ii)"`.
    #[doc(hidden)]
    fn signature() -> String;

    #[doc(hidden)]
    fn into_host_func(self) -> HostFunc;
}

fn signature<R: WasmRet>(params: &[char]) -> String {
    let mut signature = String::with_capacity(params.len() + 3);
    signature.push(R::SIGNATURE);
    signature.push('(');
    signature.extend(params);
    signature.push(')');
    signature
}

/// Returns the argument slots of `stack` after checking that it holds
/// exactly the result and argument slots of the expected signature.
#[inline]
fn arg_slots<R: WasmRet>(stack: &[u64], params: usize) -> Result<&[u64]> {
    if stack.len() != R::SLOTS + params {
        return Err(Error::InvalidSignature);
    }
    Ok(&stack[R::SLOTS..])
}

#[inline]
fn store_ret<R: WasmRet>(ret: R, stack: &mut [u64]) -> Result<()> {
    if ret.store(stack) {
        Ok(())
    } else {
        Err(Error::InvalidSignature)
    }
}

macro_rules! impl_into_host_func {
    ($num:tt $($args:ident)*) => {
        #[allow(non_snake_case)]
        impl<F, $($args,)* R> IntoHostFunc<($($args,)*), R> for F
        where
            F: Fn($($args),*) -> R + Send + Sync + 'static,
            $($args: WasmType,)*
            R: WasmRet,
        {
            fn signature() -> String {
                signature::<R>(&[$(<$args as WasmType>::SIGNATURE),*])
            }

            fn into_host_func(self) -> HostFunc {
                host_func(move |stack, _memory| {
                    let mut slots = arg_slots::<R>(stack, $num)?.iter().copied();
                    let _ = &mut slots;
                    $(let $args = $args::from_slot(slots.next().unwrap_or_default());)*
                    store_ret(self($($args),*), stack)
                })
            }
        }

        #[allow(non_snake_case)]
        impl<F, $($args,)* R> IntoHostFunc<(MemoryView<'static>, $($args,)*), R> for F
        where
            F: Fn(MemoryView<'_>, $($args),*) -> R + Send + Sync + 'static,
            $($args: WasmType,)*
            R: WasmRet,
        {
            fn signature() -> String {
                signature::<R>(&[$(<$args as WasmType>::SIGNATURE),*])
            }

            fn into_host_func(self) -> HostFunc {
                host_func(move |stack, memory| {
                    let memory = memory.ok_or(Error::InvalidMemoryAccess)?;
                    let mut slots = arg_slots::<R>(stack, $num)?.iter().copied();
                    let _ = &mut slots;
                    $(let $args = $args::from_slot(slots.next().unwrap_or_default());)*
                    store_ret(self(memory, $($args),*), stack)
                })
            }
        }
    };
}

for_each_function_signature!(impl_into_host_func);

/// The single entry point the engine calls for every linked import.
///
/// Failures cannot be reported to the caller of the host function as errors,
/// so a missing registry entry, a malformed stack, an error from the host
/// function or a panic all trap as `unreachable`.
pub(crate) unsafe extern "C" fn trampoline(
    user_data: *mut c_void,
    context: *mut c_void,
    sp: *mut u64,
    slot_count: usize,
    mem: *mut u8,
    mem_len: usize,
) -> *const c_char {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        if user_data.is_null() {
            return Err(Error::AllocationFailed);
        }
        let registry = unsafe { &*user_data.cast::<LinkedFunctionRegistry>() };
        let func = ContextKey::from_raw(context)
            .and_then(|key| registry.get(key))
            .ok_or(Error::MissingImportedFunction)?;
        let stack = unsafe { slice_from_raw_parts_mut(sp, slot_count) };
        let memory = (!mem.is_null()).then(|| unsafe { MemoryView::from_raw_parts(mem, mem_len) });
        func(stack, memory)
    }));
    match result {
        Ok(Ok(())) => std::ptr::null(),
        Ok(Err(err)) => {
            log::debug!("host function trapped: {err}");
            RAW_TRAP_UNREACHABLE.as_ptr()
        }
        Err(_) => {
            log::debug!("host function panicked");
            RAW_TRAP_UNREACHABLE.as_ptr()
        }
    }
}

/// Links `func` to the import `namespace.name` of `module`.
///
/// The import is checked by the engine before a registry slot is assigned,
/// so a failed link neither grows the registry nor disturbs a function
/// linked earlier.
pub(crate) fn link<F, Params, Results>(
    raw: &mut wasmlink_engine::Runtime,
    registry: &LinkedFunctionRegistry,
    module: ModuleIndex,
    namespace: &str,
    name: &str,
    func: F,
) -> Result<()>
where
    F: IntoHostFunc<Params, Results>,
{
    let signature = F::signature();
    let import = raw.find_import(module, namespace, name, &signature)?;
    let key = registry.key(module.index(), namespace, name);
    registry.set(key, func.into_host_func());
    // SAFETY: `trampoline` only interprets `user_data` as the registry, which
    // the owning `Runtime` keeps alive for as long as the engine runtime.
    unsafe { raw.set_import_target(import, trampoline, key.into_raw()) };
    log::debug!(
        "linked {namespace}::{name} as {signature} in module {}",
        module.index()
    );
    Ok(())
}
