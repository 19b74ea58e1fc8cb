//! wlbridge - argument marshaling between compiled kernels and a numeric host
//!
//! A compiled kernel sees strongly typed scalars and owned `NdArray`s; the
//! host sees opaque argument slots, legacy tensors and numeric arrays. This
//! crate converts between the two:
//!
//! - `encoding` - result type identifiers and the per-element choice of
//!   host array encoding
//! - `marshal` - reading arguments and writing results
//! - `transfer` - the single bulk copy used for array contents
//! - `host` - the host seam, with an in-process and a C-table implementation
//! - `entry` - host status codes, panic containment, `export_kernel!`

// Core modules
pub mod array;
pub mod encoding;
pub mod error;
pub mod types;

// Boundary
pub mod entry;
pub mod expr;
pub mod host;
pub mod marshal;
pub mod transfer;

// Ambient
pub mod cli;
pub mod config;
pub mod logging;

// Re-export commonly used items
pub use array::NdArray;
pub use encoding::{type_identifier, ArrayEncoding, ReturnType, TypeIdentifier, MAX_RANK, MAX_TYPE_COUNT};
pub use error::{HostError, LibraryError, LinkError, MarshalError, MarshalResult};
pub use host::{Host, LibraryHost, MemoryHost, MemorySlot};
pub use marshal::{call, read, try_call, write, FromArgument, FromArguments, ToArgument};
pub use types::{Boolean, Complex, Element, ElementType, MInt, MReal, NumericArrayType, TensorKind, TypeCode};
pub use config::BridgeConfig;
pub use logging::{LogConfig, LogFormat, LogOutput};
