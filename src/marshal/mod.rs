//! Argument marshaling - host slots ↔ compiled values
//!
//! Architecture:
//! - `read.rs` - slot → scalar or owned `NdArray`, plus argument tuples
//! - `write.rs` - scalar, array or symbolic result → slot
//!
//! The encoding of an array (legacy tensor or numeric array) is a function
//! of its element type alone, chosen by `ArrayEncoding::select`.

mod read;
mod write;


pub use read::{read, read_array, FromArgument, FromArguments};
pub use write::{write, write_array, ToArgument};

use crate::error::MarshalResult;
use crate::host::Host;
use crate::types::{MInt, TensorKind};

/// Read the arguments, run `kernel`, write its result once
pub fn call<H, A, R, F>(host: &H, args: &[H::Slot], result: &mut H::Slot, kernel: F) -> MarshalResult<()>
where
    H: Host,
    A: FromArguments,
    R: ToArgument,
    F: FnOnce(A) -> R,
{
    let inputs = A::from_arguments(host, args)?;
    kernel(inputs).to_argument(host, result)
}

/// Like `call`, for kernels that can fail
///
/// A kernel error leaves the result slot untouched.
pub fn try_call<H, A, R, F>(host: &H, args: &[H::Slot], result: &mut H::Slot, kernel: F) -> MarshalResult<()>
where
    H: Host,
    A: FromArguments,
    R: ToArgument,
    F: FnOnce(A) -> MarshalResult<R>,
{
    let inputs = A::from_arguments(host, args)?;
    kernel(inputs)?.to_argument(host, result)
}

/// Data pointer of a tensor, through the accessor for its kind
fn tensor_data<H: Host>(host: &H, tensor: H::Tensor, kind: TensorKind) -> *mut u8 {
    match kind {
        TensorKind::Integer => host.tensor_integer_data(tensor).cast(),
        TensorKind::Real => host.tensor_real_data(tensor).cast(),
        TensorKind::Complex => host.tensor_complex_data(tensor).cast(),
    }
}

/// Display name of a raw tensor kind, which may be out of range
fn tensor_kind_name(raw: MInt) -> String {
    TensorKind::from_raw(raw).map_or_else(|| format!("tensor kind {}", raw), |k| k.name().to_string())
}
