//! Host interface - what the marshaling layer needs from the host
//!
//! Architecture:
//! - `Host` - slot accessors, legacy tensor and numeric array interfaces
//! - `memory.rs` - in-process host with owned storage
//! - `library.rs` - adapter over the host's C function table
//!
//! Data pointers handed out by a host stay valid until the handle is
//! released by the host. The marshaling layer never keeps them past one
//! bulk copy.

mod library;
mod memory;

pub use library::{
    arguments, LibraryHost, LibraryTables, LinkFunctions, MArgument, MBool, MNumericArray, MTensor,
    NumericArrayFunctions,
    TensorFunctions,
};
pub use memory::{ArrayHandle, LinkToken, MemoryHost, MemoryLink, MemorySlot, TensorHandle};

use smallvec::SmallVec;

use crate::error::{HostError, MarshalResult};
use crate::expr::ExprLink;
use crate::types::{Complex, MInt, NumericArrayType, TensorKind};

/// Host extent list; ranks are small so this rarely spills to the heap
pub type Dims = SmallVec<[MInt; 4]>;

/// The host side of a native call
///
/// Getters may fail with `TypeMismatch` when the host can tell that a slot
/// holds a different kind of value. Hosts with untagged slots always
/// succeed and rely on the static signature of the call site.
pub trait Host {
    type Tensor: Copy + core::fmt::Debug;
    type NumericArray: Copy + core::fmt::Debug;
    type Slot;
    type Link: ExprLink;

    // Scalar accessors

    fn get_boolean(&self, slot: &Self::Slot) -> MarshalResult<bool>;
    fn get_integer(&self, slot: &Self::Slot) -> MarshalResult<MInt>;
    fn get_real(&self, slot: &Self::Slot) -> MarshalResult<f64>;
    fn get_complex(&self, slot: &Self::Slot) -> MarshalResult<Complex<f64>>;
    fn get_tensor(&self, slot: &Self::Slot) -> MarshalResult<Self::Tensor>;
    fn get_numeric_array(&self, slot: &Self::Slot) -> MarshalResult<Self::NumericArray>;

    // Setters fail only when the slot cannot be written at all

    fn set_boolean(&self, slot: &mut Self::Slot, value: bool) -> MarshalResult<()>;
    fn set_integer(&self, slot: &mut Self::Slot, value: MInt) -> MarshalResult<()>;
    fn set_real(&self, slot: &mut Self::Slot, value: f64) -> MarshalResult<()>;
    fn set_complex(&self, slot: &mut Self::Slot, value: Complex<f64>) -> MarshalResult<()>;
    fn set_tensor(&self, slot: &mut Self::Slot, tensor: Self::Tensor) -> MarshalResult<()>;
    fn set_numeric_array(&self, slot: &mut Self::Slot, array: Self::NumericArray) -> MarshalResult<()>;

    // Legacy tensor interface

    /// Raw element kind; may be a value outside `TensorKind`
    fn tensor_kind(&self, tensor: Self::Tensor) -> MInt;
    fn tensor_rank(&self, tensor: Self::Tensor) -> usize;
    fn tensor_dims(&self, tensor: Self::Tensor) -> Dims;
    fn tensor_integer_data(&self, tensor: Self::Tensor) -> *mut MInt;
    fn tensor_real_data(&self, tensor: Self::Tensor) -> *mut f64;
    fn tensor_complex_data(&self, tensor: Self::Tensor) -> *mut Complex<f64>;
    fn tensor_new(&self, kind: TensorKind, dims: &[MInt]) -> Result<Self::Tensor, HostError>;
    /// Release a tensor created by `tensor_new` that was never handed back
    fn tensor_free(&self, tensor: Self::Tensor);

    // Numeric array interface

    /// Raw type tag; may be a value outside `NumericArrayType`
    fn numeric_array_type(&self, array: Self::NumericArray) -> i32;
    fn numeric_array_rank(&self, array: Self::NumericArray) -> usize;
    fn numeric_array_dims(&self, array: Self::NumericArray) -> Dims;
    fn numeric_array_data(&self, array: Self::NumericArray) -> *mut u8;
    fn numeric_array_new(
        &self,
        ty: NumericArrayType,
        dims: &[MInt],
    ) -> Result<Self::NumericArray, HostError>;
    fn numeric_array_free(&self, array: Self::NumericArray);

    /// Expression link used for results that are not fixed-width numeric
    fn link(&self) -> &Self::Link;
}
