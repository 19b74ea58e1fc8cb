//! Adapter over the host's C function table
//!
//! Arguments arrive as an array of `MArgument` unions, each pointing at
//! host-owned storage for one value. Tensors, numeric arrays and the
//! expression link are reached through tables of `extern "C"` function
//! pointers filled in by the host.

use core::ffi::{c_int, c_void};
use std::ffi::CString;

use super::{Dims, Host};
use crate::error::{HostError, LinkError, MarshalError, MarshalResult};
use crate::expr::ExprLink;
use crate::types::{Complex, MInt, MReal, NumericArrayType, TensorKind};

/// Opaque host tensor
pub type MTensor = *mut c_void;
/// Opaque host numeric array
pub type MNumericArray = *mut c_void;
/// Host boolean: zero is false
pub type MBool = c_int;

/// One argument or result slot
///
/// Which field is live is fixed by the signature of the call site.
#[repr(C)]
#[derive(Clone, Copy)]
pub union MArgument {
    pub boolean: *mut MBool,
    pub integer: *mut MInt,
    pub real: *mut MReal,
    pub cmplex: *mut Complex<MReal>,
    pub tensor: *mut MTensor,
    pub numeric_array: *mut MNumericArray,
}

impl core::fmt::Debug for MArgument {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // SAFETY: every field is a thin pointer of the same size
        let ptr = unsafe { self.integer };
        f.debug_tuple("MArgument").field(&ptr).finish()
    }
}

impl MArgument {
    pub const fn null() -> Self {
        Self {
            integer: core::ptr::null_mut(),
        }
    }
}

/// Legacy tensor entry points
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TensorFunctions {
    pub new: unsafe extern "C" fn(kind: MInt, rank: MInt, dims: *const MInt, out: *mut MTensor) -> c_int,
    pub free: unsafe extern "C" fn(tensor: MTensor),
    pub get_type: unsafe extern "C" fn(tensor: MTensor) -> MInt,
    pub get_rank: unsafe extern "C" fn(tensor: MTensor) -> MInt,
    pub get_dimensions: unsafe extern "C" fn(tensor: MTensor) -> *const MInt,
    pub get_integer_data: unsafe extern "C" fn(tensor: MTensor) -> *mut MInt,
    pub get_real_data: unsafe extern "C" fn(tensor: MTensor) -> *mut MReal,
    pub get_complex_data: unsafe extern "C" fn(tensor: MTensor) -> *mut Complex<MReal>,
}

/// Numeric array entry points
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NumericArrayFunctions {
    pub new: unsafe extern "C" fn(
        ty: c_int,
        rank: MInt,
        dims: *const MInt,
        out: *mut MNumericArray,
    ) -> c_int,
    pub free: unsafe extern "C" fn(array: MNumericArray),
    pub get_type: unsafe extern "C" fn(array: MNumericArray) -> c_int,
    pub get_rank: unsafe extern "C" fn(array: MNumericArray) -> MInt,
    pub get_dimensions: unsafe extern "C" fn(array: MNumericArray) -> *const MInt,
    pub get_data: unsafe extern "C" fn(array: MNumericArray) -> *mut c_void,
}

/// Expression link entry points; each returns zero on failure
#[repr(C)]
#[derive(Clone, Copy)]
pub struct LinkFunctions {
    pub link: *mut c_void,
    pub put_function: unsafe extern "C" fn(link: *mut c_void, head: *const core::ffi::c_char, argc: c_int) -> c_int,
    pub put_symbol: unsafe extern "C" fn(link: *mut c_void, name: *const core::ffi::c_char) -> c_int,
    pub put_utf8_string: unsafe extern "C" fn(link: *mut c_void, bytes: *const u8, len: c_int) -> c_int,
    pub end_packet: unsafe extern "C" fn(link: *mut c_void) -> c_int,
}

impl core::fmt::Debug for LinkFunctions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LinkFunctions").field("link", &self.link).finish_non_exhaustive()
    }
}

fn link_status(status: c_int, what: &str) -> Result<(), LinkError> {
    if status == 0 {
        Err(LinkError::new(format!("{} rejected by link", what)))
    } else {
        Ok(())
    }
}

fn c_name(name: &str) -> Result<CString, LinkError> {
    CString::new(name).map_err(|_| LinkError::new(format!("name {:?} contains NUL", name)))
}

impl ExprLink for LinkFunctions {
    fn put_function(&self, head: &str, argc: usize) -> Result<(), LinkError> {
        let head = c_name(head)?;
        let argc = c_int::try_from(argc).map_err(|_| LinkError::new("argument count too large"))?;
        // SAFETY: `link` and the entry point come from the host together
        link_status(unsafe { (self.put_function)(self.link, head.as_ptr(), argc) }, "function")
    }

    fn put_symbol(&self, name: &str) -> Result<(), LinkError> {
        let name = c_name(name)?;
        link_status(unsafe { (self.put_symbol)(self.link, name.as_ptr()) }, "symbol")
    }

    fn put_string(&self, value: &str) -> Result<(), LinkError> {
        let len = c_int::try_from(value.len()).map_err(|_| LinkError::new("string too long"))?;
        link_status(unsafe { (self.put_utf8_string)(self.link, value.as_ptr(), len) }, "string")
    }

    fn end_packet(&self) -> Result<(), LinkError> {
        link_status(unsafe { (self.end_packet)(self.link) }, "end of packet")
    }
}

/// Everything a `LibraryHost` needs, as one block the host side fills in
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LibraryTables {
    pub tensors: TensorFunctions,
    pub arrays: NumericArrayFunctions,
    pub link: LinkFunctions,
}

/// Borrow the argument array passed to an entry point
///
/// # Safety
/// `args` must point at `argc` initialized slots that outlive `'a`.
/// A null `args` is only allowed together with `argc == 0`.
pub unsafe fn arguments<'a>(args: *const MArgument, argc: MInt) -> &'a [MArgument] {
    match usize::try_from(argc) {
        Ok(len) if len > 0 && !args.is_null() => core::slice::from_raw_parts(args, len),
        _ => &[],
    }
}

/// Host reached through the C function tables
#[derive(Clone, Copy)]
pub struct LibraryHost<'a> {
    tensors: &'a TensorFunctions,
    arrays: &'a NumericArrayFunctions,
    link: &'a LinkFunctions,
}

impl core::fmt::Debug for LibraryHost<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LibraryHost").field("link", self.link).finish_non_exhaustive()
    }
}

impl<'a> LibraryHost<'a> {
    /// # Safety
    /// Same contract as `new`.
    pub unsafe fn from_tables(tables: &'a LibraryTables) -> Self {
        Self::new(&tables.tensors, &tables.arrays, &tables.link)
    }

    /// # Safety
    /// The tables must be the host's own for the current call. Every slot
    /// later handed to this host must point at storage of the kind the
    /// accessor expects, and every tensor or numeric array must be live.
    pub unsafe fn new(
        tensors: &'a TensorFunctions,
        arrays: &'a NumericArrayFunctions,
        link: &'a LinkFunctions,
    ) -> Self {
        Self { tensors, arrays, link }
    }
}

/// Read through a slot pointer, refusing null
///
/// # Safety
/// A non-null `ptr` must be valid for reads.
unsafe fn read_slot<T: Copy>(ptr: *const T) -> MarshalResult<T> {
    if ptr.is_null() {
        return Err(MarshalError::NullBuffer { bytes: core::mem::size_of::<T>() });
    }
    Ok(ptr.read_unaligned())
}

/// # Safety
/// A non-null `ptr` must be valid for writes.
unsafe fn write_slot<T>(ptr: *mut T, value: T) -> MarshalResult<()> {
    if ptr.is_null() {
        return Err(MarshalError::NullBuffer { bytes: core::mem::size_of::<T>() });
    }
    ptr.write_unaligned(value);
    Ok(())
}

/// Copy a host extent list
///
/// # Safety
/// A non-null `dims` must cover `rank` entries.
unsafe fn copy_dims(dims: *const MInt, rank: MInt) -> Dims {
    match usize::try_from(rank) {
        Ok(len) if len > 0 && !dims.is_null() => {
            core::slice::from_raw_parts(dims, len).iter().copied().collect()
        }
        _ => Dims::new(),
    }
}

/// Host rank as seen by the reader; a negative rank never matches a
/// compiled rank
fn host_rank(rank: MInt) -> usize {
    usize::try_from(rank).unwrap_or(usize::MAX)
}

fn rank_of(dims: &[MInt]) -> Result<MInt, HostError> {
    MInt::try_from(dims.len()).map_err(|_| HostError::new(crate::error::LibraryError::DimensionError.code()))
}

// SAFETY (all blocks below): `LibraryHost::new` makes the caller vouch for
// the slots, handles and tables this host is used with.
impl<'a> Host for LibraryHost<'a> {
    type Tensor = MTensor;
    type NumericArray = MNumericArray;
    type Slot = MArgument;
    type Link = LinkFunctions;

    fn get_boolean(&self, slot: &MArgument) -> MarshalResult<bool> {
        unsafe { read_slot(slot.boolean) }.map(|b| b != 0)
    }

    fn get_integer(&self, slot: &MArgument) -> MarshalResult<MInt> {
        unsafe { read_slot(slot.integer) }
    }

    fn get_real(&self, slot: &MArgument) -> MarshalResult<f64> {
        unsafe { read_slot(slot.real) }
    }

    fn get_complex(&self, slot: &MArgument) -> MarshalResult<Complex<f64>> {
        unsafe { read_slot(slot.cmplex) }
    }

    fn get_tensor(&self, slot: &MArgument) -> MarshalResult<MTensor> {
        let tensor = unsafe { read_slot(slot.tensor) }?;
        if tensor.is_null() {
            return Err(MarshalError::type_mismatch("tensor", "null handle"));
        }
        Ok(tensor)
    }

    fn get_numeric_array(&self, slot: &MArgument) -> MarshalResult<MNumericArray> {
        let array = unsafe { read_slot(slot.numeric_array) }?;
        if array.is_null() {
            return Err(MarshalError::type_mismatch("numeric array", "null handle"));
        }
        Ok(array)
    }

    fn set_boolean(&self, slot: &mut MArgument, value: bool) -> MarshalResult<()> {
        unsafe { write_slot(slot.boolean, MBool::from(value)) }
    }

    fn set_integer(&self, slot: &mut MArgument, value: MInt) -> MarshalResult<()> {
        unsafe { write_slot(slot.integer, value) }
    }

    fn set_real(&self, slot: &mut MArgument, value: f64) -> MarshalResult<()> {
        unsafe { write_slot(slot.real, value) }
    }

    fn set_complex(&self, slot: &mut MArgument, value: Complex<f64>) -> MarshalResult<()> {
        unsafe { write_slot(slot.cmplex, value) }
    }

    fn set_tensor(&self, slot: &mut MArgument, tensor: MTensor) -> MarshalResult<()> {
        unsafe { write_slot(slot.tensor, tensor) }
    }

    fn set_numeric_array(&self, slot: &mut MArgument, array: MNumericArray) -> MarshalResult<()> {
        unsafe { write_slot(slot.numeric_array, array) }
    }

    fn tensor_kind(&self, tensor: MTensor) -> MInt {
        unsafe { (self.tensors.get_type)(tensor) }
    }

    fn tensor_rank(&self, tensor: MTensor) -> usize {
        host_rank(unsafe { (self.tensors.get_rank)(tensor) })
    }

    fn tensor_dims(&self, tensor: MTensor) -> Dims {
        unsafe {
            let rank = (self.tensors.get_rank)(tensor);
            copy_dims((self.tensors.get_dimensions)(tensor), rank)
        }
    }

    fn tensor_integer_data(&self, tensor: MTensor) -> *mut MInt {
        unsafe { (self.tensors.get_integer_data)(tensor) }
    }

    fn tensor_real_data(&self, tensor: MTensor) -> *mut f64 {
        unsafe { (self.tensors.get_real_data)(tensor) }
    }

    fn tensor_complex_data(&self, tensor: MTensor) -> *mut Complex<f64> {
        unsafe { (self.tensors.get_complex_data)(tensor) }
    }

    fn tensor_new(&self, kind: TensorKind, dims: &[MInt]) -> Result<MTensor, HostError> {
        let mut out: MTensor = core::ptr::null_mut();
        let status = unsafe { (self.tensors.new)(kind.raw(), rank_of(dims)?, dims.as_ptr(), &mut out) };
        HostError::check(status)?;
        Ok(out)
    }

    fn tensor_free(&self, tensor: MTensor) {
        unsafe { (self.tensors.free)(tensor) }
    }

    fn numeric_array_type(&self, array: MNumericArray) -> i32 {
        unsafe { (self.arrays.get_type)(array) }
    }

    fn numeric_array_rank(&self, array: MNumericArray) -> usize {
        host_rank(unsafe { (self.arrays.get_rank)(array) })
    }

    fn numeric_array_dims(&self, array: MNumericArray) -> Dims {
        unsafe {
            let rank = (self.arrays.get_rank)(array);
            copy_dims((self.arrays.get_dimensions)(array), rank)
        }
    }

    fn numeric_array_data(&self, array: MNumericArray) -> *mut u8 {
        unsafe { (self.arrays.get_data)(array) }.cast()
    }

    fn numeric_array_new(&self, ty: NumericArrayType, dims: &[MInt]) -> Result<MNumericArray, HostError> {
        let mut out: MNumericArray = core::ptr::null_mut();
        let status = unsafe { (self.arrays.new)(ty.raw(), rank_of(dims)?, dims.as_ptr(), &mut out) };
        HostError::check(status)?;
        Ok(out)
    }

    fn numeric_array_free(&self, array: MNumericArray) {
        unsafe { (self.arrays.free)(array) }
    }

    fn link(&self) -> &LinkFunctions {
        self.link
    }
}
