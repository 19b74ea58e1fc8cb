//! Argument reader - host slot → compiled value

use num_traits::AsPrimitive;

use super::{tensor_data, tensor_kind_name};
use crate::array::{element_count, NdArray};
use crate::encoding::ArrayEncoding;
use crate::error::{MarshalError, MarshalResult};
use crate::host::Host;
use crate::logging;
use crate::transfer;
use crate::types::{Boolean, Complex, Element, MInt, NumericArrayType};

/// Values that can be decoded from one argument slot
pub trait FromArgument: Sized {
    fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self>;
}

/// Decode one argument slot
#[inline]
pub fn read<T: FromArgument, H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<T> {
    T::from_argument(host, slot)
}

impl FromArgument for bool {
    fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self> {
        host.get_boolean(slot)
    }
}

impl FromArgument for Boolean {
    fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self> {
        host.get_boolean(slot).map(Boolean::from)
    }
}

// Every integer width goes through the host's 64-bit accessor
macro_rules! impl_integer_argument {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromArgument for $ty {
                fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self> {
                    Ok(host.get_integer(slot)?.as_())
                }
            }
        )*
    };
}

impl_integer_argument!(i8, u8, i16, u16, i32, u32, i64, u64);

impl FromArgument for f32 {
    fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self> {
        Ok(host.get_real(slot)?.as_())
    }
}

impl FromArgument for f64 {
    fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self> {
        host.get_real(slot)
    }
}

impl FromArgument for Complex<f32> {
    fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self> {
        let z = host.get_complex(slot)?;
        Ok(Complex::new(z.re.as_(), z.im.as_()))
    }
}

impl FromArgument for Complex<f64> {
    fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self> {
        host.get_complex(slot)
    }
}

impl<T: Element, const R: usize> FromArgument for NdArray<T, R> {
    fn from_argument<H: Host>(host: &H, slot: &H::Slot) -> MarshalResult<Self> {
        read_array(host, slot)
    }
}

/// Decode an array argument through the encoding of its element type
pub fn read_array<T: Element, const R: usize, H: Host>(
    host: &H,
    slot: &H::Slot,
) -> MarshalResult<NdArray<T, R>> {
    let encoding = ArrayEncoding::of::<T>();
    let result = match encoding {
        ArrayEncoding::LegacyTensor => read_tensor(host, slot),
        ArrayEncoding::NumericArray => read_numeric_array(host, slot),
    };

    match &result {
        Ok(_) => logging::log_read(T::ELEMENT, R, encoding),
        Err(err) => logging::log_marshal_error("read", err),
    }
    result
}

fn read_tensor<T: Element, const R: usize, H: Host>(
    host: &H,
    slot: &H::Slot,
) -> MarshalResult<NdArray<T, R>> {
    let tensor = host.get_tensor(slot)?;

    let rank = host.tensor_rank(tensor);
    if rank != R {
        return Err(MarshalError::RankMismatch { expected: R, found: rank });
    }

    let kind = ArrayEncoding::tensor_kind(T::ELEMENT)
        .ok_or_else(|| MarshalError::type_mismatch(T::ELEMENT, "legacy tensor"))?;
    let found = host.tensor_kind(tensor);
    if found != kind.raw() {
        return Err(MarshalError::type_mismatch(kind.name(), tensor_kind_name(found)));
    }

    let dims = shape_from_host::<R>(&host.tensor_dims(tensor))?;
    let src = tensor_data(host, tensor, kind).cast::<T>();
    // SAFETY: a live tensor of `kind` exposes `dims` elements of that kind,
    // and `T` has the layout of that kind.
    unsafe { fill_from_host(dims, src) }
}

fn read_numeric_array<T: Element, const R: usize, H: Host>(
    host: &H,
    slot: &H::Slot,
) -> MarshalResult<NdArray<T, R>> {
    let array = host.get_numeric_array(slot)?;

    let expected = T::ELEMENT.numeric_array_type();
    let found = NumericArrayType::from_raw(host.numeric_array_type(array));
    if found == NumericArrayType::Undef || found != expected {
        return Err(MarshalError::type_mismatch(expected.name(), found.name()));
    }

    let rank = host.numeric_array_rank(array);
    if rank != R {
        return Err(MarshalError::RankMismatch { expected: R, found: rank });
    }

    let dims = shape_from_host::<R>(&host.numeric_array_dims(array))?;
    let src = host.numeric_array_data(array).cast::<T>();
    // SAFETY: the tag matched, so the buffer holds `dims` elements laid out as `T`.
    unsafe { fill_from_host(dims, src) }
}

/// Convert host extents into a compiled shape
fn shape_from_host<const R: usize>(extents: &[MInt]) -> MarshalResult<[usize; R]> {
    if extents.len() != R {
        return Err(MarshalError::RankMismatch {
            expected: R,
            found: extents.len(),
        });
    }
    let mut dims = [0usize; R];
    for (axis, (dim, &extent)) in dims.iter_mut().zip(extents).enumerate() {
        *dim = usize::try_from(extent).map_err(|_| MarshalError::InvalidExtent { axis, extent })?;
    }
    Ok(dims)
}

/// Allocate a compiled array of `dims` and fill it with one bulk copy
///
/// All validation happens before the allocation.
///
/// # Safety
/// A non-null `src` must be valid for reads of the whole array.
unsafe fn fill_from_host<T: Element, const R: usize>(
    dims: [usize; R],
    src: *const T,
) -> MarshalResult<NdArray<T, R>> {
    let len = element_count(&dims).ok_or(MarshalError::ShapeOverflow)?;
    let bytes = transfer::transfer_bytes::<T>(len)?;
    if bytes > 0 && src.is_null() {
        return Err(MarshalError::NullBuffer { bytes });
    }

    let mut array = NdArray::filled_default(dims)?;
    transfer::copy_from_host(src, array.as_mut_slice())?;
    Ok(array)
}

/// Argument lists decodable from a slot array
pub trait FromArguments: Sized {
    const ARITY: usize;

    fn from_arguments<H: Host>(host: &H, slots: &[H::Slot]) -> MarshalResult<Self>;
}

macro_rules! impl_from_arguments {
    ($arity:expr; $($name:ident $idx:tt),*) => {
        impl<$($name: FromArgument),*> FromArguments for ($($name,)*) {
            const ARITY: usize = $arity;

            #[allow(unused_variables)]
            fn from_arguments<H: Host>(host: &H, slots: &[H::Slot]) -> MarshalResult<Self> {
                if slots.len() != Self::ARITY {
                    return Err(MarshalError::ArgumentCount {
                        expected: Self::ARITY,
                        found: slots.len(),
                    });
                }
                Ok(($($name::from_argument(host, &slots[$idx])?,)*))
            }
        }
    };
}

impl_from_arguments!(0;);
impl_from_arguments!(1; A 0);
impl_from_arguments!(2; A 0, B 1);
impl_from_arguments!(3; A 0, B 1, C 2);
impl_from_arguments!(4; A 0, B 1, C 2, D 3);
