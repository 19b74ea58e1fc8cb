//! Marshaling errors and their host error codes
//!
//! Every failure is detected before a host-visible buffer is touched:
//! read-path checks run before the compiled array is allocated, write-path
//! checks run before the bulk copy.

use core::fmt;

/// Error codes of the host's library calling convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LibraryError {
    NoError = 0,
    TypeError = 1,
    RankError = 2,
    DimensionError = 3,
    NumericalError = 4,
    MemoryError = 5,
    FunctionError = 6,
}

impl LibraryError {
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Error code returned by a failing host call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostError {
    pub code: i32,
}

impl HostError {
    #[inline]
    pub const fn new(code: i32) -> Self {
        Self { code }
    }

    /// Interpret a raw host status, zero meaning success
    #[inline]
    pub const fn check(code: i32) -> Result<(), Self> {
        if code == 0 {
            Ok(())
        } else {
            Err(Self { code })
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host error code {}", self.code)
    }
}

impl std::error::Error for HostError {}

/// Failure reported by the expression link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    pub message: String,
}

impl LinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expression link error: {}", self.message)
    }
}

impl std::error::Error for LinkError {}

/// Marshaling errors
#[derive(Debug, Clone, PartialEq)]
pub enum MarshalError {
    /// Host array rank differs from the statically expected rank
    RankMismatch { expected: usize, found: usize },
    /// Host kind or type tag differs from the statically expected one
    TypeMismatch { expected: String, found: String },
    /// Host refused to allocate an output array
    Allocation(HostError),
    /// Host reported a negative extent
    InvalidExtent { axis: usize, extent: i64 },
    /// Extent product does not fit in `usize`
    ShapeOverflow,
    /// Buffer length disagrees with the extent product
    SizeMismatch { expected: usize, found: usize },
    /// Host handed out a null data pointer for a non-empty array
    NullBuffer { bytes: usize },
    /// Entry point received the wrong number of argument slots
    ArgumentCount { expected: usize, found: usize },
    Link(LinkError),
    /// Kernel panicked; payload message if it was a string
    Panic(String),
}

impl MarshalError {
    pub fn type_mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Host error code surfaced to the caller
    pub fn code(&self) -> i32 {
        match self {
            Self::RankMismatch { .. } => LibraryError::RankError.code(),
            Self::TypeMismatch { .. } => LibraryError::TypeError.code(),
            Self::Allocation(err) => err.code,
            Self::InvalidExtent { .. } | Self::ShapeOverflow | Self::SizeMismatch { .. } => {
                LibraryError::DimensionError.code()
            }
            Self::NullBuffer { .. } => LibraryError::MemoryError.code(),
            Self::ArgumentCount { .. } | Self::Link(_) | Self::Panic(_) => {
                LibraryError::FunctionError.code()
            }
        }
    }

    /// Short stable label for structured logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RankMismatch { .. } => "rank_mismatch",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::Allocation(_) => "allocation_failure",
            Self::InvalidExtent { .. } => "invalid_extent",
            Self::ShapeOverflow => "shape_overflow",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::NullBuffer { .. } => "null_buffer",
            Self::ArgumentCount { .. } => "argument_count",
            Self::Link(_) => "link",
            Self::Panic(_) => "panic",
        }
    }
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RankMismatch { expected, found } => {
                write!(f, "Rank mismatch: expected rank {}, host array has rank {}", expected, found)
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            Self::Allocation(err) => write!(f, "Host allocation failed: {}", err),
            Self::InvalidExtent { axis, extent } => {
                write!(f, "Invalid extent {} on axis {}", extent, axis)
            }
            Self::ShapeOverflow => write!(f, "Array shape overflows the address space"),
            Self::SizeMismatch { expected, found } => {
                write!(f, "Expected {} elements, buffer holds {}", expected, found)
            }
            Self::NullBuffer { bytes } => {
                write!(f, "Host returned a null buffer for {} bytes", bytes)
            }
            Self::ArgumentCount { expected, found } => {
                write!(f, "Expected {} arguments, got {}", expected, found)
            }
            Self::Link(err) => write!(f, "{}", err),
            Self::Panic(msg) => write!(f, "Kernel panicked: {}", msg),
        }
    }
}

impl std::error::Error for MarshalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Allocation(err) => Some(err),
            Self::Link(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for MarshalError {
    fn from(err: HostError) -> Self {
        Self::Allocation(err)
    }
}

impl From<LinkError> for MarshalError {
    fn from(err: LinkError) -> Self {
        Self::Link(err)
    }
}

pub type MarshalResult<T> = Result<T, MarshalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_host_convention() {
        assert_eq!(MarshalError::RankMismatch { expected: 3, found: 2 }.code(), 2);
        assert_eq!(MarshalError::type_mismatch("Real32", "UnsignedInteger8").code(), 1);
        assert_eq!(MarshalError::Allocation(HostError::new(5)).code(), 5);
        assert_eq!(MarshalError::ShapeOverflow.code(), 3);
        assert_eq!(MarshalError::Panic("boom".into()).code(), 6);
    }

    #[test]
    fn host_status_check() {
        assert_eq!(HostError::check(0), Ok(()));
        assert_eq!(HostError::check(5), Err(HostError::new(5)));
    }

    #[test]
    fn display_mentions_both_sides() {
        let msg = MarshalError::RankMismatch { expected: 3, found: 2 }.to_string();
        assert!(msg.contains('3') && msg.contains('2'));
    }
}
