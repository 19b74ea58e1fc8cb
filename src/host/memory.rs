//! In-process host
//!
//! Owns its tensors and numeric arrays in 8-byte aligned storage, counts
//! allocations, and records every token written to its expression link.
//! Storage lives until the host is dropped, so data pointers stay valid
//! for the whole call even when another thread releases the array. A
//! released array is retired: its handle no longer resolves from a slot.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{Dims, Host};
use crate::error::{HostError, LibraryError, LinkError, MarshalError, MarshalResult};
use crate::expr::ExprLink;
use crate::transfer;
use crate::types::{Complex, Element, MInt, NumericArrayType, TensorKind};

/// Handle to a tensor owned by a `MemoryHost`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorHandle(usize);

/// Handle to a numeric array owned by a `MemoryHost`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayHandle(usize);

/// Tagged argument slot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MemorySlot {
    #[default]
    Empty,
    Boolean(bool),
    Integer(MInt),
    Real(f64),
    Complex(Complex<f64>),
    Tensor(TensorHandle),
    NumericArray(ArrayHandle),
}

impl MemorySlot {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty slot",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Complex(_) => "complex",
            Self::Tensor(_) => "tensor",
            Self::NumericArray(_) => "numeric array",
        }
    }
}

struct Record {
    tag: i64,
    dims: Dims,
    words: Box<[u64]>,
    freed: bool,
}

impl Record {
    /// Storage always covers `dims` at `width`, whatever `init` holds
    fn new(tag: i64, dims: &[MInt], width: usize, init: &[u8]) -> Self {
        let bytes = byte_len(dims, width).unwrap_or(0).max(init.len());
        let mut words = vec![0u64; (bytes + 7) / 8].into_boxed_slice();
        transfer::copy_bytes(init, &mut words);
        Self {
            tag,
            dims: dims.iter().copied().collect(),
            words,
            freed: false,
        }
    }

    /// Initialized element bytes, empty once released
    fn bytes(&self, width: usize) -> Vec<u8> {
        if self.freed {
            return Vec::new();
        }
        let all = transfer::bytes_of(&self.words[..]);
        let len = byte_len(&self.dims, width).unwrap_or(0).min(all.len());
        all[..len].to_vec()
    }

    fn data(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    /// Retire the record; storage stays put for pointers already handed out
    fn release(&mut self) {
        self.freed = true;
    }
}

/// Expression link token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkToken {
    Function { head: String, argc: usize },
    Symbol(String),
    String(String),
    EndPacket,
}

/// Expression link that records tokens in order
#[derive(Debug, Default)]
pub struct MemoryLink {
    tokens: Mutex<Vec<LinkToken>>,
    closed: AtomicBool,
}

impl MemoryLink {
    pub fn tokens(&self) -> Vec<LinkToken> {
        self.tokens.lock().clone()
    }

    /// Make every later put fail, as a dead link would
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    fn push(&self, token: LinkToken) -> Result<(), LinkError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(LinkError::new("link closed"));
        }
        self.tokens.lock().push(token);
        Ok(())
    }
}

impl ExprLink for MemoryLink {
    fn put_function(&self, head: &str, argc: usize) -> Result<(), LinkError> {
        self.push(LinkToken::Function {
            head: head.to_string(),
            argc,
        })
    }

    fn put_symbol(&self, name: &str) -> Result<(), LinkError> {
        self.push(LinkToken::Symbol(name.to_string()))
    }

    fn put_string(&self, value: &str) -> Result<(), LinkError> {
        self.push(LinkToken::String(value.to_string()))
    }

    fn end_packet(&self) -> Result<(), LinkError> {
        self.push(LinkToken::EndPacket)
    }
}

/// Thread-safe in-process host
#[derive(Default)]
pub struct MemoryHost {
    tensors: Mutex<Vec<Record>>,
    arrays: Mutex<Vec<Record>>,
    allocations: AtomicUsize,
    releases: AtomicUsize,
    fail_code: AtomicI32,
    refuse_results: AtomicBool,
    link: MemoryLink,
}

impl core::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryHost")
            .field("tensors", &self.tensors.lock().len())
            .field("numeric_arrays", &self.arrays.lock().len())
            .field("allocations", &self.allocation_count())
            .field("releases", &self.release_count())
            .finish()
    }
}

fn byte_len(dims: &[MInt], width: usize) -> Result<usize, HostError> {
    dims.iter().try_fold(width, |acc, &d| {
        let d = usize::try_from(d).map_err(|_| HostError::new(LibraryError::DimensionError.code()))?;
        acc.checked_mul(d)
            .ok_or(HostError::new(LibraryError::MemoryError.code()))
    })
}

const fn tensor_width(kind: TensorKind) -> usize {
    match kind {
        TensorKind::Integer | TensorKind::Real => 8,
        TensorKind::Complex => 16,
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of arrays created through `tensor_new` / `numeric_array_new`
    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Number of arrays released through `tensor_free` / `numeric_array_free`
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::Relaxed)
    }

    /// Whether a tensor has been released
    pub fn tensor_freed(&self, tensor: TensorHandle) -> bool {
        self.tensors.lock()[tensor.0].freed
    }

    /// Make later allocations fail with `code` (`None` restores success)
    pub fn fail_allocations_with(&self, code: Option<i32>) {
        self.fail_code.store(code.unwrap_or(0), Ordering::Relaxed);
    }

    fn check_allocation(&self) -> Result<(), HostError> {
        HostError::check(self.fail_code.load(Ordering::Relaxed))
    }

    /// Make tensor and numeric array result slots unwritable, as a null
    /// result pointer from the host would
    pub fn refuse_array_results(&self, refuse: bool) {
        self.refuse_results.store(refuse, Ordering::Relaxed);
    }

    fn check_result_slot(&self, handle: &'static str) -> MarshalResult<()> {
        if self.refuse_results.load(Ordering::Relaxed) {
            tracing::debug!(target: "wlbridge::host", handle, "result slot refused");
            return Err(MarshalError::NullBuffer {
                bytes: core::mem::size_of::<usize>(),
            });
        }
        Ok(())
    }

    /// Most recently created tensor
    pub fn last_tensor(&self) -> Option<TensorHandle> {
        self.tensors.lock().len().checked_sub(1).map(TensorHandle)
    }

    /// Most recently created numeric array
    pub fn last_numeric_array(&self) -> Option<ArrayHandle> {
        self.arrays.lock().len().checked_sub(1).map(ArrayHandle)
    }

    /// Whether a numeric array has been released
    pub fn numeric_array_freed(&self, array: ArrayHandle) -> bool {
        self.arrays.lock()[array.0].freed
    }

    /// Register a tensor with arbitrary kind and contents
    pub fn insert_tensor(&self, raw_kind: MInt, dims: &[MInt], bytes: &[u8]) -> TensorHandle {
        let width = TensorKind::from_raw(raw_kind).map_or(0, tensor_width);
        let record = Record::new(raw_kind, dims, width, bytes);
        let mut tensors = self.tensors.lock();
        tensors.push(record);
        TensorHandle(tensors.len() - 1)
    }

    /// Register a numeric array with arbitrary tag and contents
    pub fn insert_numeric_array(&self, raw_type: i32, dims: &[MInt], bytes: &[u8]) -> ArrayHandle {
        let width = NumericArrayType::from_raw(raw_type).size();
        let record = Record::new(i64::from(raw_type), dims, width, bytes);
        let mut arrays = self.arrays.lock();
        arrays.push(record);
        ArrayHandle(arrays.len() - 1)
    }

    /// Tensor holding `data` with the element's own tensor kind
    ///
    /// Elements outside the legacy ABI get kind 0, which no reader accepts.
    pub fn tensor_from_slice<T: Element>(&self, dims: &[MInt], data: &[T]) -> TensorHandle {
        let kind = T::ELEMENT.tensor_kind().map_or(0, TensorKind::raw);
        self.insert_tensor(kind, dims, transfer::bytes_of(data))
    }

    /// Numeric array holding `data` tagged with the element's own type
    pub fn numeric_array_from_slice<T: Element>(&self, dims: &[MInt], data: &[T]) -> ArrayHandle {
        let ty = T::ELEMENT.numeric_array_type().raw();
        self.insert_numeric_array(ty, dims, transfer::bytes_of(data))
    }

    /// Raw bytes of a tensor's storage (exact element bytes, no padding)
    pub fn tensor_bytes(&self, tensor: TensorHandle) -> Vec<u8> {
        let tensors = self.tensors.lock();
        let record = &tensors[tensor.0];
        record.bytes(TensorKind::from_raw(record.tag).map_or(0, tensor_width))
    }

    /// Raw bytes of a numeric array's storage
    pub fn numeric_array_bytes(&self, array: ArrayHandle) -> Vec<u8> {
        let arrays = self.arrays.lock();
        let record = &arrays[array.0];
        record.bytes(i32::try_from(record.tag).map_or(0, |t| NumericArrayType::from_raw(t).size()))
    }

    pub fn link_tokens(&self) -> Vec<LinkToken> {
        self.link.tokens()
    }
}

impl Host for MemoryHost {
    type Tensor = TensorHandle;
    type NumericArray = ArrayHandle;
    type Slot = MemorySlot;
    type Link = MemoryLink;

    fn get_boolean(&self, slot: &MemorySlot) -> MarshalResult<bool> {
        match slot {
            MemorySlot::Boolean(v) => Ok(*v),
            other => Err(MarshalError::type_mismatch("boolean", other.kind_name())),
        }
    }

    fn get_integer(&self, slot: &MemorySlot) -> MarshalResult<MInt> {
        match slot {
            MemorySlot::Integer(v) => Ok(*v),
            other => Err(MarshalError::type_mismatch("integer", other.kind_name())),
        }
    }

    fn get_real(&self, slot: &MemorySlot) -> MarshalResult<f64> {
        match slot {
            MemorySlot::Real(v) => Ok(*v),
            other => Err(MarshalError::type_mismatch("real", other.kind_name())),
        }
    }

    fn get_complex(&self, slot: &MemorySlot) -> MarshalResult<Complex<f64>> {
        match slot {
            MemorySlot::Complex(v) => Ok(*v),
            other => Err(MarshalError::type_mismatch("complex", other.kind_name())),
        }
    }

    fn get_tensor(&self, slot: &MemorySlot) -> MarshalResult<TensorHandle> {
        match slot {
            MemorySlot::Tensor(t) if self.tensor_freed(*t) => {
                Err(MarshalError::type_mismatch("tensor", "released tensor"))
            }
            MemorySlot::Tensor(t) => Ok(*t),
            other => Err(MarshalError::type_mismatch("tensor", other.kind_name())),
        }
    }

    fn get_numeric_array(&self, slot: &MemorySlot) -> MarshalResult<ArrayHandle> {
        match slot {
            MemorySlot::NumericArray(a) if self.numeric_array_freed(*a) => {
                Err(MarshalError::type_mismatch("numeric array", "released numeric array"))
            }
            MemorySlot::NumericArray(a) => Ok(*a),
            other => Err(MarshalError::type_mismatch("numeric array", other.kind_name())),
        }
    }

    fn set_boolean(&self, slot: &mut MemorySlot, value: bool) -> MarshalResult<()> {
        *slot = MemorySlot::Boolean(value);
        Ok(())
    }

    fn set_integer(&self, slot: &mut MemorySlot, value: MInt) -> MarshalResult<()> {
        *slot = MemorySlot::Integer(value);
        Ok(())
    }

    fn set_real(&self, slot: &mut MemorySlot, value: f64) -> MarshalResult<()> {
        *slot = MemorySlot::Real(value);
        Ok(())
    }

    fn set_complex(&self, slot: &mut MemorySlot, value: Complex<f64>) -> MarshalResult<()> {
        *slot = MemorySlot::Complex(value);
        Ok(())
    }

    fn set_tensor(&self, slot: &mut MemorySlot, tensor: TensorHandle) -> MarshalResult<()> {
        self.check_result_slot("tensor")?;
        *slot = MemorySlot::Tensor(tensor);
        Ok(())
    }

    fn set_numeric_array(&self, slot: &mut MemorySlot, array: ArrayHandle) -> MarshalResult<()> {
        self.check_result_slot("numeric array")?;
        *slot = MemorySlot::NumericArray(array);
        Ok(())
    }

    fn tensor_kind(&self, tensor: TensorHandle) -> MInt {
        self.tensors.lock()[tensor.0].tag
    }

    fn tensor_rank(&self, tensor: TensorHandle) -> usize {
        self.tensors.lock()[tensor.0].dims.len()
    }

    fn tensor_dims(&self, tensor: TensorHandle) -> Dims {
        self.tensors.lock()[tensor.0].dims.clone()
    }

    fn tensor_integer_data(&self, tensor: TensorHandle) -> *mut MInt {
        self.tensors.lock()[tensor.0].data().cast()
    }

    fn tensor_real_data(&self, tensor: TensorHandle) -> *mut f64 {
        self.tensors.lock()[tensor.0].data().cast()
    }

    fn tensor_complex_data(&self, tensor: TensorHandle) -> *mut Complex<f64> {
        self.tensors.lock()[tensor.0].data().cast()
    }

    fn tensor_new(&self, kind: TensorKind, dims: &[MInt]) -> Result<TensorHandle, HostError> {
        self.check_allocation()?;
        byte_len(dims, tensor_width(kind))?;
        let mut tensors = self.tensors.lock();
        tensors.push(Record::new(kind.raw(), dims, tensor_width(kind), &[]));
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(TensorHandle(tensors.len() - 1))
    }

    fn tensor_free(&self, tensor: TensorHandle) {
        if let Some(record) = self.tensors.lock().get_mut(tensor.0) {
            if !record.freed {
                record.release();
                self.releases.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn numeric_array_type(&self, array: ArrayHandle) -> i32 {
        i32::try_from(self.arrays.lock()[array.0].tag).unwrap_or(NumericArrayType::Undef.raw())
    }

    fn numeric_array_rank(&self, array: ArrayHandle) -> usize {
        self.arrays.lock()[array.0].dims.len()
    }

    fn numeric_array_dims(&self, array: ArrayHandle) -> Dims {
        self.arrays.lock()[array.0].dims.clone()
    }

    fn numeric_array_data(&self, array: ArrayHandle) -> *mut u8 {
        self.arrays.lock()[array.0].data()
    }

    fn numeric_array_new(
        &self,
        ty: NumericArrayType,
        dims: &[MInt],
    ) -> Result<ArrayHandle, HostError> {
        self.check_allocation()?;
        if ty == NumericArrayType::Undef {
            return Err(HostError::new(LibraryError::TypeError.code()));
        }
        byte_len(dims, ty.size())?;
        let mut arrays = self.arrays.lock();
        arrays.push(Record::new(i64::from(ty.raw()), dims, ty.size(), &[]));
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(ArrayHandle(arrays.len() - 1))
    }

    fn numeric_array_free(&self, array: ArrayHandle) {
        if let Some(record) = self.arrays.lock().get_mut(array.0) {
            if !record.freed {
                record.release();
                self.releases.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn link(&self) -> &MemoryLink {
        &self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_counts_and_failure_injection() {
        let host = MemoryHost::new();
        host.tensor_new(TensorKind::Real, &[2, 2]).unwrap();
        assert_eq!(host.allocation_count(), 1);

        host.fail_allocations_with(Some(5));
        assert_eq!(host.numeric_array_new(NumericArrayType::Bit8, &[3]), Err(HostError::new(5)));
        assert_eq!(host.allocation_count(), 1);

        host.fail_allocations_with(None);
        assert!(host.numeric_array_new(NumericArrayType::Bit8, &[3]).is_ok());
    }

    #[test]
    fn inserted_arrays_report_their_metadata() {
        let host = MemoryHost::new();
        let a = host.numeric_array_from_slice(&[2, 2], &[1u16, 2, 3, 4]);
        assert_eq!(host.numeric_array_type(a), NumericArrayType::UBit16.raw());
        assert_eq!(host.numeric_array_rank(a), 2);
        assert_eq!(host.numeric_array_dims(a).as_slice(), &[2, 2]);
        assert_eq!(host.numeric_array_bytes(a), transfer::bytes_of(&[1u16, 2, 3, 4]));
    }

    #[test]
    fn negative_extent_refused() {
        let host = MemoryHost::new();
        let err = host.tensor_new(TensorKind::Integer, &[2, -1]).unwrap_err();
        assert_eq!(err.code, LibraryError::DimensionError.code());
    }

    #[test]
    fn slot_getters_check_kind() {
        let host = MemoryHost::new();
        let slot = MemorySlot::Real(1.5);
        assert_eq!(host.get_real(&slot), Ok(1.5));
        assert!(matches!(host.get_integer(&slot), Err(MarshalError::TypeMismatch { .. })));
    }

    #[test]
    fn free_is_counted_once() {
        let host = MemoryHost::new();
        let t = host.tensor_new(TensorKind::Complex, &[4]).unwrap();
        host.tensor_free(t);
        host.tensor_free(t);
        assert!(host.tensor_freed(t));
        assert_eq!(host.release_count(), 1);
        assert!(host.tensor_bytes(t).is_empty());
    }

    #[test]
    fn released_handles_no_longer_resolve() {
        let host = MemoryHost::new();
        let t = host.tensor_new(TensorKind::Real, &[4096]).unwrap();
        let a = host.numeric_array_new(NumericArrayType::Real32, &[16]).unwrap();
        host.tensor_free(t);
        host.numeric_array_free(a);

        let err = host.get_tensor(&MemorySlot::Tensor(t)).unwrap_err();
        assert_eq!(err, MarshalError::type_mismatch("tensor", "released tensor"));
        assert!(host.get_numeric_array(&MemorySlot::NumericArray(a)).is_err());
        assert!(host.numeric_array_freed(a));
    }

    #[test]
    fn refused_result_slot_stays_empty() {
        let host = MemoryHost::new();
        host.refuse_array_results(true);
        let t = host.tensor_new(TensorKind::Integer, &[1]).unwrap();

        let mut slot = MemorySlot::Empty;
        assert!(matches!(host.set_tensor(&mut slot, t), Err(MarshalError::NullBuffer { .. })));
        assert_eq!(slot, MemorySlot::Empty);
        // Scalar results are unaffected
        assert!(host.set_integer(&mut slot, 1).is_ok());
    }

    #[test]
    fn closed_link_rejects_tokens() {
        let link = MemoryLink::default();
        link.put_symbol("x").unwrap();
        link.close();
        assert!(link.put_symbol("y").is_err());
        assert_eq!(link.tokens(), vec![LinkToken::Symbol("x".into())]);
    }
}
