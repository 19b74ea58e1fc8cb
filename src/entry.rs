//! Entry points - the boundary the host actually calls
//!
//! Turns a marshaled kernel call into the host's integer status. Errors
//! become their host error code and a panic becomes `FunctionError`;
//! nothing unwinds into the host.

use core::ffi::c_int;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug_span;

use crate::error::{LibraryError, MarshalError, MarshalResult};
use crate::host::{arguments, Host, LibraryHost, LibraryTables, MArgument};
use crate::logging;
use crate::marshal::{self, FromArguments, ToArgument};
use crate::types::MInt;

/// Run an entry point body and map its outcome to a host status
pub fn run<F>(name: &str, body: F) -> i32
where
    F: FnOnce() -> MarshalResult<()>,
{
    let _span = debug_span!("entry", function = name).entered();

    let code = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => LibraryError::NoError.code(),
        Ok(Err(err)) => {
            logging::log_marshal_error(name, &err);
            err.code()
        }
        Err(payload) => {
            let err = MarshalError::Panic(panic_message(payload.as_ref()));
            logging::log_marshal_error(name, &err);
            err.code()
        }
    };

    logging::log_entry_return(name, code);
    code
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Marshal arguments, run `kernel`, marshal its result
pub fn invoke<H, A, R, F>(name: &str, host: &H, args: &[H::Slot], result: &mut H::Slot, kernel: F) -> i32
where
    H: Host,
    A: FromArguments,
    R: ToArgument,
    F: FnOnce(A) -> R,
{
    logging::log_entry_call(name, args.len());
    run(name, || marshal::call(host, args, result, kernel))
}

/// `invoke` for kernels that report their own failures
pub fn try_invoke<H, A, R, F>(name: &str, host: &H, args: &[H::Slot], result: &mut H::Slot, kernel: F) -> i32
where
    H: Host,
    A: FromArguments,
    R: ToArgument,
    F: FnOnce(A) -> MarshalResult<R>,
{
    logging::log_entry_call(name, args.len());
    run(name, || marshal::try_call(host, args, result, kernel))
}

/// Body of an exported `extern "C"` entry point
///
/// # Safety
/// `tables` must be null or point at the host's filled tables. `args` must
/// point at `argc` slots and `result` at the result storage, each of the
/// kind the kernel's signature implies.
pub unsafe fn call_library<A, R, F>(
    name: &str,
    tables: *const LibraryTables,
    argc: MInt,
    args: *const MArgument,
    mut result: MArgument,
    kernel: F,
) -> c_int
where
    A: FromArguments,
    R: ToArgument,
    F: FnOnce(A) -> R,
{
    let Some(tables) = tables.as_ref() else {
        let err = MarshalError::NullBuffer {
            bytes: core::mem::size_of::<LibraryTables>(),
        };
        logging::log_marshal_error(name, &err);
        return LibraryError::FunctionError.code();
    };
    let host = LibraryHost::from_tables(tables);
    invoke(name, &host, arguments(args, argc), &mut result, kernel)
}

/// Export a kernel under a C symbol
///
/// ```ignore
/// wlbridge::export_kernel!(scale_vector, |(v, k): (NdArray<f64, 1>, f64)| scale(v, k));
/// ```
#[macro_export]
macro_rules! export_kernel {
    ($symbol:ident, $kernel:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            tables: *const $crate::host::LibraryTables,
            argc: $crate::types::MInt,
            args: *const $crate::host::MArgument,
            result: $crate::host::MArgument,
        ) -> ::core::ffi::c_int {
            $crate::entry::call_library(stringify!($symbol), tables, argc, args, result, $kernel)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::NdArray;
    use crate::host::{MemoryHost, MemorySlot};

    #[test]
    fn success_is_no_error() {
        let host = MemoryHost::new();
        let mut result = MemorySlot::Empty;
        let code = invoke("add", &host, &[MemorySlot::Integer(2), MemorySlot::Integer(3)], &mut result, |(a, b): (i64, i64)| a + b);
        assert_eq!(code, 0);
        assert_eq!(result, MemorySlot::Integer(5));
    }

    #[test]
    fn rank_mismatch_maps_to_rank_error() {
        let host = MemoryHost::new();
        let t = host.tensor_from_slice(&[2, 2], &[1.0f64, 2.0, 3.0, 4.0]);
        let mut result = MemorySlot::Empty;
        let code = invoke("sum", &host, &[MemorySlot::Tensor(t)], &mut result, |(v,): (NdArray<f64, 3>,)| {
            v.iter().sum::<f64>()
        });
        assert_eq!(code, LibraryError::RankError.code());
        assert_eq!(result, MemorySlot::Empty);
    }

    #[test]
    fn panic_becomes_function_error() {
        let host = MemoryHost::new();
        let mut result = MemorySlot::Empty;
        let code = invoke("boom", &host, &[], &mut result, |(): ()| -> i64 { panic!("kernel exploded") });
        assert_eq!(code, LibraryError::FunctionError.code());
    }

    #[test]
    fn kernel_errors_keep_their_code() {
        let host = MemoryHost::new();
        let mut result = MemorySlot::Empty;
        let code = try_invoke("fail", &host, &[], &mut result, |(): ()| -> MarshalResult<i64> {
            Err(MarshalError::InvalidExtent { axis: 0, extent: -1 })
        });
        assert_eq!(code, LibraryError::DimensionError.code());
    }

    #[test]
    fn panic_message_extraction() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }

    #[test]
    fn null_tables_refused() {
        let code = unsafe {
            call_library("noop", core::ptr::null(), 0, core::ptr::null(), MArgument::null(), |(): ()| ())
        };
        assert_eq!(code, LibraryError::FunctionError.code());
    }
}
