//! Result type identifiers and array encoding selection
//!
//! Both are pure functions of the element type. The encoding choice never
//! looks at rank or shape, so the read and write paths always agree.

use core::fmt;

use crate::array::NdArray;
use crate::types::{Boolean, Complex, Element, ElementType, MInt, TensorKind, TypeCode};

/// Number of type code slots reserved per rank
pub const MAX_TYPE_COUNT: MInt = 256;

/// Largest rank whose identifier fits in `MInt` for every type code
pub const MAX_RANK: usize = (MInt::MAX / MAX_TYPE_COUNT) as usize;

/// Host array encoding used for one element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayEncoding {
    /// Oldest host ABI: 64-bit integer, 64-bit real and 64-bit complex only
    LegacyTensor,
    /// Richer host ABI covering every element type
    NumericArray,
}

impl ArrayEncoding {
    /// Select the encoding for an element type
    pub const fn select(element: ElementType) -> Self {
        match element {
            ElementType::I64 | ElementType::R64 | ElementType::C64 => Self::LegacyTensor,
            ElementType::Boolean
            | ElementType::I8
            | ElementType::U8
            | ElementType::I16
            | ElementType::U16
            | ElementType::I32
            | ElementType::U32
            | ElementType::U64
            | ElementType::R32
            | ElementType::C32 => Self::NumericArray,
        }
    }

    /// Encoding for a statically known element
    #[inline]
    pub const fn of<T: Element>() -> Self {
        Self::select(T::ELEMENT)
    }

    /// Tensor kind the legacy path allocates and validates against
    ///
    /// `None` whenever the element is not carried by the legacy tensor ABI.
    pub const fn tensor_kind(element: ElementType) -> Option<TensorKind> {
        match Self::select(element) {
            Self::LegacyTensor => element.tensor_kind(),
            Self::NumericArray => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::LegacyTensor => "LegacyTensor",
            Self::NumericArray => "NumericArray",
        }
    }
}

impl fmt::Display for ArrayEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result type identifier: `rank * 256 + type_code`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentifier(MInt);

impl TypeIdentifier {
    /// Identifier for a rank known to be at most `MAX_RANK`
    ///
    /// Use `try_new` for ranks that come from outside the program.
    #[inline]
    pub const fn new(code: TypeCode, rank: usize) -> Self {
        Self(rank as MInt * MAX_TYPE_COUNT + code.raw())
    }

    /// Identifier for an arbitrary rank, `None` past `MAX_RANK`
    pub fn try_new(code: TypeCode, rank: usize) -> Option<Self> {
        MInt::try_from(rank)
            .ok()?
            .checked_mul(MAX_TYPE_COUNT)?
            .checked_add(code.raw())
            .map(Self)
    }

    #[inline]
    pub const fn raw(self) -> MInt {
        self.0
    }

    /// Split a raw identifier back into type code and rank
    pub fn decode(raw: MInt) -> Option<(TypeCode, usize)> {
        if raw < 0 {
            return None;
        }
        let code = TypeCode::from_raw(raw % MAX_TYPE_COUNT)?;
        let rank = usize::try_from(raw / MAX_TYPE_COUNT).ok()?;
        Some((code, rank))
    }

    pub fn code(self) -> Option<TypeCode> {
        Self::decode(self.0).map(|(code, _)| code)
    }

    pub fn rank(self) -> usize {
        (self.0 / MAX_TYPE_COUNT) as usize
    }
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Types whose result shape can be declared before the call runs
pub trait ReturnType {
    const TYPE_CODE: TypeCode;
    const RANK: usize;

    #[inline]
    fn type_identifier() -> TypeIdentifier {
        TypeIdentifier::new(Self::TYPE_CODE, Self::RANK)
    }
}

/// Identifier for a result type
#[inline]
pub fn type_identifier<T: ReturnType>() -> TypeIdentifier {
    T::type_identifier()
}

macro_rules! impl_scalar_return {
    ($($ty:ty => $code:ident),* $(,)?) => {
        $(
            impl ReturnType for $ty {
                const TYPE_CODE: TypeCode = TypeCode::$code;
                const RANK: usize = 0;
            }
        )*
    };
}

impl_scalar_return! {
    () => Null,
    bool => Bool,
    Boolean => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => R32,
    f64 => R64,
    Complex<f32> => C32,
    Complex<f64> => C64,
    String => MathLink,
}

impl<T: Element, const R: usize> ReturnType for NdArray<T, R> {
    const TYPE_CODE: TypeCode = T::ELEMENT.type_code();
    const RANK: usize = R;
}

impl<const R: usize> ReturnType for NdArray<String, R> {
    const TYPE_CODE: TypeCode = TypeCode::MathLink;
    const RANK: usize = R;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn legacy_tensor_carries_exactly_three_elements() {
        let legacy: Vec<_> = ElementType::ALL
            .into_iter()
            .filter(|ty| ArrayEncoding::select(*ty) == ArrayEncoding::LegacyTensor)
            .collect();
        assert_eq!(legacy, vec![ElementType::I64, ElementType::R64, ElementType::C64]);
    }

    #[test]
    fn tensor_kind_present_iff_legacy() {
        for ty in ElementType::ALL {
            let legacy = ArrayEncoding::select(ty) == ArrayEncoding::LegacyTensor;
            assert_eq!(ArrayEncoding::tensor_kind(ty).is_some(), legacy, "{ty}");
        }
    }

    #[test]
    fn encoding_of_static_types() {
        assert_eq!(ArrayEncoding::of::<i64>(), ArrayEncoding::LegacyTensor);
        assert_eq!(ArrayEncoding::of::<u64>(), ArrayEncoding::NumericArray);
        assert_eq!(ArrayEncoding::of::<u16>(), ArrayEncoding::NumericArray);
        assert_eq!(ArrayEncoding::of::<Complex<f32>>(), ArrayEncoding::NumericArray);
        assert_eq!(ArrayEncoding::of::<Boolean>(), ArrayEncoding::NumericArray);
    }

    #[test]
    fn scalar_identifiers_are_bare_codes() {
        assert_eq!(type_identifier::<()>().raw(), 2);
        assert_eq!(type_identifier::<bool>().raw(), 3);
        assert_eq!(type_identifier::<f64>().raw(), 13);
        assert_eq!(type_identifier::<String>().raw(), 1);
    }

    #[test]
    fn array_identifiers_include_rank() {
        assert_eq!(type_identifier::<NdArray<f64, 2>>().raw(), 2 * 256 + 13);
        assert_eq!(type_identifier::<NdArray<u16, 1>>().raw(), 256 + 7);
        assert_eq!(type_identifier::<NdArray<String, 3>>().raw(), 3 * 256 + 1);
    }

    #[test]
    fn identifiers_distinct_and_decodable() {
        let mut seen = HashSet::new();
        for rank in 0..8 {
            for code in TypeCode::ALL {
                let id = TypeIdentifier::new(code, rank);
                assert!(seen.insert(id), "duplicate identifier {id}");
                assert_eq!(TypeIdentifier::decode(id.raw()), Some((code, rank)));
            }
        }
        assert_eq!(TypeIdentifier::decode(256), None);
        assert_eq!(TypeIdentifier::decode(-1), None);
    }

    #[test]
    fn oversized_ranks_have_no_identifier() {
        let top = TypeIdentifier::try_new(TypeCode::C64, MAX_RANK).unwrap();
        assert_eq!(TypeIdentifier::decode(top.raw()), Some((TypeCode::C64, MAX_RANK)));
        assert_eq!(TypeIdentifier::try_new(TypeCode::MathLink, MAX_RANK + 1), None);
        assert_eq!(TypeIdentifier::try_new(TypeCode::R64, 1 << 60), None);
        assert_eq!(TypeIdentifier::try_new(TypeCode::R64, usize::MAX), None);
        assert_eq!(TypeIdentifier::try_new(TypeCode::R64, 2), Some(TypeIdentifier::new(TypeCode::R64, 2)));
    }
}
