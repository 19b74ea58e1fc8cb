//! Type definitions shared by both sides of the boundary
//!
//! Defines the element types a compiled kernel can exchange with the host,
//! plus the host's own type vocabularies (tensor kinds, numeric array tags).

use core::fmt;

/// Host machine integer (extents, integer scalars)
pub type MInt = i64;

/// Host machine real
pub type MReal = f64;

/// Complex number with the host's two-real layout
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    #[inline]
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

impl<T: fmt::Display> fmt::Display for Complex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}i", self.re, self.im)
    }
}

/// One-byte boolean element
///
/// Any byte is a valid `Boolean`, so raw copies out of host buffers can
/// never produce an invalid `bool`. Non-zero reads as true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Boolean(u8);

impl Boolean {
    pub const TRUE: Self = Self(1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Boolean {
    #[inline]
    fn from(value: bool) -> Self {
        Self(value as u8)
    }
}

impl From<Boolean> for bool {
    #[inline]
    fn from(value: Boolean) -> Self {
        value.get()
    }
}

/// Element kinds of the host's legacy tensor ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum TensorKind {
    Integer = 2,
    Real = 3,
    Complex = 4,
}

impl TensorKind {
    /// Decode a kind reported by the host
    pub const fn from_raw(raw: MInt) -> Option<Self> {
        match raw {
            2 => Some(Self::Integer),
            3 => Some(Self::Real),
            4 => Some(Self::Complex),
            _ => None,
        }
    }

    #[inline]
    pub const fn raw(self) -> MInt {
        self as MInt
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Real => "Real",
            Self::Complex => "Complex",
        }
    }
}

/// Type tags of the host's numeric array ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum NumericArrayType {
    Undef = 0,
    Bit8 = 1,
    UBit8 = 2,
    Bit16 = 3,
    UBit16 = 4,
    Bit32 = 5,
    UBit32 = 6,
    Bit64 = 7,
    UBit64 = 8,
    Real32 = 9,
    Real64 = 10,
    ComplexReal32 = 11,
    ComplexReal64 = 12,
}

impl NumericArrayType {
    /// Decode a tag reported by the host
    ///
    /// Unknown tags decode to `Undef`.
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Bit8,
            2 => Self::UBit8,
            3 => Self::Bit16,
            4 => Self::UBit16,
            5 => Self::Bit32,
            6 => Self::UBit32,
            7 => Self::Bit64,
            8 => Self::UBit64,
            9 => Self::Real32,
            10 => Self::Real64,
            11 => Self::ComplexReal32,
            12 => Self::ComplexReal64,
            _ => Self::Undef,
        }
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self as i32
    }

    /// Width of one element in bytes (0 for `Undef`)
    pub const fn size(self) -> usize {
        match self {
            Self::Undef => 0,
            Self::Bit8 | Self::UBit8 => 1,
            Self::Bit16 | Self::UBit16 => 2,
            Self::Bit32 | Self::UBit32 | Self::Real32 => 4,
            Self::Bit64 | Self::UBit64 | Self::Real64 | Self::ComplexReal32 => 8,
            Self::ComplexReal64 => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Undef => "Undef",
            Self::Bit8 => "Integer8",
            Self::UBit8 => "UnsignedInteger8",
            Self::Bit16 => "Integer16",
            Self::UBit16 => "UnsignedInteger16",
            Self::Bit32 => "Integer32",
            Self::UBit32 => "UnsignedInteger32",
            Self::Bit64 => "Integer64",
            Self::UBit64 => "UnsignedInteger64",
            Self::Real32 => "Real32",
            Self::Real64 => "Real64",
            Self::ComplexReal32 => "ComplexReal32",
            Self::ComplexReal64 => "ComplexReal64",
        }
    }
}

/// Result type codes understood by the host's result negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i64)]
pub enum TypeCode {
    /// Result travels over the expression link, not the binary slot
    MathLink = 1,
    Null,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    R32,
    R64,
    C32,
    C64,
}

impl TypeCode {
    pub const ALL: [Self; 15] = [
        Self::MathLink,
        Self::Null,
        Self::Bool,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::R32,
        Self::R64,
        Self::C32,
        Self::C64,
    ];

    pub fn from_raw(raw: MInt) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.raw() == raw)
    }

    #[inline]
    pub const fn raw(self) -> MInt {
        self as MInt
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::MathLink => "MathLink",
            Self::Null => "Null",
            Self::Bool => "Bool",
            Self::I8 => "I8",
            Self::U8 => "U8",
            Self::I16 => "I16",
            Self::U16 => "U16",
            Self::I32 => "I32",
            Self::U32 => "U32",
            Self::I64 => "I64",
            Self::U64 => "U64",
            Self::R32 => "R32",
            Self::R64 => "R64",
            Self::C32 => "C32",
            Self::C64 => "C64",
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element types that can cross the boundary in binary form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Boolean,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    R32,
    R64,
    C32,
    C64,
}

impl ElementType {
    pub const ALL: [Self; 13] = [
        Self::Boolean,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::R32,
        Self::R64,
        Self::C32,
        Self::C64,
    ];

    /// Result type code of this element
    pub const fn type_code(self) -> TypeCode {
        match self {
            Self::Boolean => TypeCode::Bool,
            Self::I8 => TypeCode::I8,
            Self::U8 => TypeCode::U8,
            Self::I16 => TypeCode::I16,
            Self::U16 => TypeCode::U16,
            Self::I32 => TypeCode::I32,
            Self::U32 => TypeCode::U32,
            Self::I64 => TypeCode::I64,
            Self::U64 => TypeCode::U64,
            Self::R32 => TypeCode::R32,
            Self::R64 => TypeCode::R64,
            Self::C32 => TypeCode::C32,
            Self::C64 => TypeCode::C64,
        }
    }

    /// Numeric array tag carrying this element
    pub const fn numeric_array_type(self) -> NumericArrayType {
        match self {
            Self::Boolean | Self::I8 => NumericArrayType::Bit8,
            Self::U8 => NumericArrayType::UBit8,
            Self::I16 => NumericArrayType::Bit16,
            Self::U16 => NumericArrayType::UBit16,
            Self::I32 => NumericArrayType::Bit32,
            Self::U32 => NumericArrayType::UBit32,
            Self::I64 => NumericArrayType::Bit64,
            Self::U64 => NumericArrayType::UBit64,
            Self::R32 => NumericArrayType::Real32,
            Self::R64 => NumericArrayType::Real64,
            Self::C32 => NumericArrayType::ComplexReal32,
            Self::C64 => NumericArrayType::ComplexReal64,
        }
    }

    /// Legacy tensor kind, for the three elements that ABI supports
    pub const fn tensor_kind(self) -> Option<TensorKind> {
        match self {
            Self::I64 => Some(TensorKind::Integer),
            Self::R64 => Some(TensorKind::Real),
            Self::C64 => Some(TensorKind::Complex),
            _ => None,
        }
    }

    /// Width of one element in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Boolean | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::R32 => 4,
            Self::I64 | Self::U64 | Self::R64 | Self::C32 => 8,
            Self::C64 => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::R32 => "f32",
            Self::R64 => "f64",
            Self::C32 => "c32",
            Self::C64 => "c64",
        }
    }

    /// Parse a Rust-style element name (`i16`, `f64`, `c32`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.name() == name)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust types usable as compiled array elements
///
/// Sealed: every implementor has a layout the bulk copy can move verbatim.
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static + sealed::Sealed {
    const ELEMENT: ElementType;
}

macro_rules! impl_element {
    ($($ty:ty => $element:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const ELEMENT: ElementType = ElementType::$element;
            }

            const _: () = assert!(core::mem::size_of::<$ty>() == ElementType::$element.size());
        )*
    };
}

impl_element! {
    Boolean => Boolean,
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes_match_numeric_array_tags() {
        for ty in ElementType::ALL {
            assert_eq!(ty.size(), ty.numeric_array_type().size(), "{ty}");
        }
    }

    #[test]
    fn complex_layout_is_two_reals() {
        assert_eq!(core::mem::size_of::<Complex<f32>>(), 8);
        assert_eq!(core::mem::size_of::<Complex<f64>>(), 16);
        assert_eq!(core::mem::align_of::<Complex<f64>>(), 8);
    }

    #[test]
    fn boolean_reads_any_nonzero_byte_as_true() {
        assert!(Boolean(7).get());
        assert!(!Boolean::FALSE.get());
        assert_eq!(Boolean::from(true), Boolean::TRUE);
    }

    #[test]
    fn raw_tags_decode() {
        assert_eq!(NumericArrayType::from_raw(4), NumericArrayType::UBit16);
        assert_eq!(NumericArrayType::from_raw(99), NumericArrayType::Undef);
        assert_eq!(TensorKind::from_raw(3), Some(TensorKind::Real));
        assert_eq!(TensorKind::from_raw(1), None);
        assert_eq!(TypeCode::from_raw(13), Some(TypeCode::R64));
        assert_eq!(TypeCode::from_raw(0), None);
    }

    #[test]
    fn element_names_round_trip() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(ElementType::from_name("f16"), None);
    }
}
