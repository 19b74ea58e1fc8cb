//! Argument writer - compiled value → host slot

use num_traits::AsPrimitive;

use super::tensor_data;
use crate::array::NdArray;
use crate::encoding::ArrayEncoding;
use crate::error::{MarshalError, MarshalResult};
use crate::expr::{self, Expression};
use crate::host::{Dims, Host};
use crate::logging;
use crate::transfer;
use crate::types::{Boolean, Complex, Element, MInt};

/// Values that can be handed back through the result slot
pub trait ToArgument {
    fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()>;
}

/// Encode a value into a result slot
#[inline]
pub fn write<T: ToArgument + ?Sized, H: Host>(host: &H, slot: &mut H::Slot, value: &T) -> MarshalResult<()> {
    value.to_argument(host, slot)
}

/// The empty result writes nothing
impl ToArgument for () {
    fn to_argument<H: Host>(&self, _host: &H, _slot: &mut H::Slot) -> MarshalResult<()> {
        Ok(())
    }
}

impl ToArgument for bool {
    fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()> {
        host.set_boolean(slot, *self)
    }
}

impl ToArgument for Boolean {
    fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()> {
        host.set_boolean(slot, self.get())
    }
}

// Widened to the host's 64-bit integer; `u64` is reinterpreted
macro_rules! impl_integer_result {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToArgument for $ty {
                fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()> {
                    host.set_integer(slot, AsPrimitive::<MInt>::as_(*self))
                }
            }
        )*
    };
}

impl_integer_result!(i8, u8, i16, u16, i32, u32, i64, u64);

impl ToArgument for f32 {
    fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()> {
        host.set_real(slot, f64::from(*self))
    }
}

impl ToArgument for f64 {
    fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()> {
        host.set_real(slot, *self)
    }
}

impl ToArgument for Complex<f32> {
    fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()> {
        host.set_complex(slot, Complex::new(f64::from(self.re), f64::from(self.im)))
    }
}

impl ToArgument for Complex<f64> {
    fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()> {
        host.set_complex(slot, *self)
    }
}

impl<T: Element, const R: usize> ToArgument for NdArray<T, R> {
    fn to_argument<H: Host>(&self, host: &H, slot: &mut H::Slot) -> MarshalResult<()> {
        write_array(host, slot, self)
    }
}

// Symbolic results go over the expression link; the slot is left alone

impl<const R: usize> ToArgument for NdArray<String, R> {
    fn to_argument<H: Host>(&self, host: &H, _slot: &mut H::Slot) -> MarshalResult<()> {
        send_symbolic(host, self, R)
    }
}

impl ToArgument for String {
    fn to_argument<H: Host>(&self, host: &H, _slot: &mut H::Slot) -> MarshalResult<()> {
        send_symbolic(host, self.as_str(), 0)
    }
}

impl ToArgument for str {
    fn to_argument<H: Host>(&self, host: &H, _slot: &mut H::Slot) -> MarshalResult<()> {
        send_symbolic(host, self, 0)
    }
}

fn send_symbolic<H: Host, E: Expression + ?Sized>(host: &H, payload: &E, rank: usize) -> MarshalResult<()> {
    match expr::send_assignment(host.link(), payload) {
        Ok(()) => {
            logging::log_expression(rank);
            Ok(())
        }
        Err(err) => {
            let err = MarshalError::Link(err);
            logging::log_marshal_error("write", &err);
            Err(err)
        }
    }
}

/// Encode an array into a freshly allocated host array
///
/// On any failure after allocation the new host array is released and the
/// slot is left untouched.
pub fn write_array<T: Element, const R: usize, H: Host>(
    host: &H,
    slot: &mut H::Slot,
    array: &NdArray<T, R>,
) -> MarshalResult<()> {
    let encoding = ArrayEncoding::of::<T>();
    let result = match encoding {
        ArrayEncoding::LegacyTensor => write_tensor(host, slot, array),
        ArrayEncoding::NumericArray => write_numeric_array(host, slot, array),
    };

    match &result {
        Ok(()) => logging::log_write(T::ELEMENT, R, encoding),
        Err(err) => logging::log_marshal_error("write", err),
    }
    result
}

fn write_tensor<T: Element, const R: usize, H: Host>(
    host: &H,
    slot: &mut H::Slot,
    array: &NdArray<T, R>,
) -> MarshalResult<()> {
    let kind = ArrayEncoding::tensor_kind(T::ELEMENT)
        .ok_or_else(|| MarshalError::type_mismatch(T::ELEMENT, "legacy tensor"))?;
    let dims = host_dims(array.dims())?;
    let tensor = host.tensor_new(kind, &dims).map_err(MarshalError::Allocation)?;

    let dst = tensor_data(host, tensor, kind).cast::<T>();
    // SAFETY: the tensor was just allocated with this kind and shape.
    let result = unsafe { transfer::copy_to_host(array.as_slice(), dst) }
        .and_then(|_| host.set_tensor(slot, tensor));
    if result.is_err() {
        host.tensor_free(tensor);
    }
    result
}

fn write_numeric_array<T: Element, const R: usize, H: Host>(
    host: &H,
    slot: &mut H::Slot,
    array: &NdArray<T, R>,
) -> MarshalResult<()> {
    let ty = T::ELEMENT.numeric_array_type();
    let dims = host_dims(array.dims())?;
    let handle = host.numeric_array_new(ty, &dims).map_err(MarshalError::Allocation)?;

    let dst = host.numeric_array_data(handle).cast::<T>();
    // SAFETY: the array was just allocated with the element's tag and this shape.
    let result = unsafe { transfer::copy_to_host(array.as_slice(), dst) }
        .and_then(|_| host.set_numeric_array(slot, handle));
    if result.is_err() {
        host.numeric_array_free(handle);
    }
    result
}

fn host_dims(dims: &[usize]) -> MarshalResult<Dims> {
    dims.iter()
        .map(|&d| MInt::try_from(d).map_err(|_| MarshalError::ShapeOverflow))
        .collect()
}
