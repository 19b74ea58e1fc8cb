//! Exported entry points driven through C function tables
//!
//! The tables below stand in for the host: arrays are boxed Rust structs
//! behind opaque pointers, and the link records what it receives.

use core::ffi::{c_char, c_int, c_void, CStr};
use std::cell::Cell;
use std::sync::Mutex;

use wlbridge::host::{
    LibraryTables, LinkFunctions, MArgument, MNumericArray, MTensor, NumericArrayFunctions,
    TensorFunctions,
};
use wlbridge::{export_kernel, Complex, LibraryError, MInt, NdArray, NumericArrayType, TensorKind};

struct FakeArray {
    tag: MInt,
    dims: Vec<MInt>,
    words: Vec<u64>,
}

fn allocate(tag: MInt, width: usize, rank: MInt, dims: *const MInt) -> *mut c_void {
    let dims = if rank > 0 {
        unsafe { std::slice::from_raw_parts(dims, rank as usize) }.to_vec()
    } else {
        Vec::new()
    };
    let count: usize = dims.iter().map(|&d| d as usize).product();
    let words = vec![0u64; (count * width + 7) / 8];
    Box::into_raw(Box::new(FakeArray { tag, dims, words })).cast()
}

unsafe fn fake<'a>(handle: *mut c_void) -> &'a mut FakeArray {
    &mut *handle.cast::<FakeArray>()
}

unsafe extern "C" fn tensor_new(kind: MInt, rank: MInt, dims: *const MInt, out: *mut MTensor) -> c_int {
    let width = match TensorKind::from_raw(kind) {
        Some(TensorKind::Complex) => 16,
        Some(_) => 8,
        None => return LibraryError::TypeError.code(),
    };
    *out = allocate(kind, width, rank, dims);
    0
}

unsafe extern "C" fn array_new(ty: c_int, rank: MInt, dims: *const MInt, out: *mut MNumericArray) -> c_int {
    let ty = NumericArrayType::from_raw(ty);
    if ty == NumericArrayType::Undef {
        return LibraryError::TypeError.code();
    }
    *out = allocate(MInt::from(ty.raw()), ty.size(), rank, dims);
    0
}

thread_local! {
    // Kernels run on the calling test's thread
    static FREED: Cell<usize> = Cell::new(0);
}

unsafe extern "C" fn free(handle: *mut c_void) {
    FREED.with(|n| n.set(n.get() + 1));
    drop(Box::from_raw(handle.cast::<FakeArray>()));
}

unsafe extern "C" fn get_type(handle: *mut c_void) -> MInt {
    fake(handle).tag
}

unsafe extern "C" fn get_tag(handle: *mut c_void) -> c_int {
    fake(handle).tag as c_int
}

unsafe extern "C" fn get_rank(handle: *mut c_void) -> MInt {
    fake(handle).dims.len() as MInt
}

unsafe extern "C" fn get_dimensions(handle: *mut c_void) -> *const MInt {
    fake(handle).dims.as_ptr()
}

unsafe extern "C" fn get_data(handle: *mut c_void) -> *mut c_void {
    fake(handle).words.as_mut_ptr().cast()
}

unsafe extern "C" fn get_integer_data(handle: MTensor) -> *mut MInt {
    get_data(handle).cast()
}

unsafe extern "C" fn get_real_data(handle: MTensor) -> *mut f64 {
    get_data(handle).cast()
}

unsafe extern "C" fn get_complex_data(handle: MTensor) -> *mut Complex<f64> {
    get_data(handle).cast()
}

type Recorder = Mutex<Vec<String>>;

unsafe fn record(link: *mut c_void, token: String) -> c_int {
    (*link.cast::<Recorder>()).lock().map(|mut tokens| tokens.push(token)).is_ok() as c_int
}

unsafe extern "C" fn put_function(link: *mut c_void, head: *const c_char, argc: c_int) -> c_int {
    let head = CStr::from_ptr(head).to_string_lossy();
    record(link, format!("{}[{}]", head, argc))
}

unsafe extern "C" fn put_symbol(link: *mut c_void, name: *const c_char) -> c_int {
    record(link, CStr::from_ptr(name).to_string_lossy().into_owned())
}

unsafe extern "C" fn put_utf8_string(link: *mut c_void, bytes: *const u8, len: c_int) -> c_int {
    let text = std::slice::from_raw_parts(bytes, len as usize);
    record(link, format!("{:?}", String::from_utf8_lossy(text)))
}

unsafe extern "C" fn end_packet(link: *mut c_void) -> c_int {
    record(link, "EndPacket".to_string())
}

fn tables(recorder: &Recorder) -> LibraryTables {
    LibraryTables {
        tensors: TensorFunctions {
            new: tensor_new,
            free,
            get_type,
            get_rank,
            get_dimensions,
            get_integer_data,
            get_real_data,
            get_complex_data,
        },
        arrays: NumericArrayFunctions {
            new: array_new,
            free,
            get_type: get_tag,
            get_rank,
            get_dimensions,
            get_data,
        },
        link: LinkFunctions {
            link: recorder as *const Recorder as *mut c_void,
            put_function,
            put_symbol,
            put_utf8_string,
            end_packet,
        },
    }
}

fn scale(v: NdArray<f64, 1>, k: f64) -> NdArray<f64, 1> {
    let scaled: Vec<f64> = v.iter().map(|x| x * k).collect();
    NdArray::from_slice(&scaled)
}

export_kernel!(wl_add, |(a, b): (i64, i64)| a + b);
export_kernel!(wl_scale, |(v, k): (NdArray<f64, 1>, f64)| scale(v, k));
export_kernel!(wl_widths, |(n,): (i64,)| NdArray::from_slice(&vec![n as u16; 3]));
export_kernel!(wl_greet, |(): ()| String::from("hello"));
export_kernel!(wl_sum_matrix, |(m,): (NdArray<i64, 2>,)| m.iter().sum::<i64>());
export_kernel!(wl_panics, |(): ()| -> i64 { panic!("kernel failure") });

#[test]
fn test_scalar_entry_point() {
    let recorder = Recorder::default();
    let tables = tables(&recorder);

    let (mut a, mut b, mut out) = (2i64, 40i64, 0i64);
    let args = [MArgument { integer: &mut a }, MArgument { integer: &mut b }];
    let code = unsafe { wl_add(&tables, 2, args.as_ptr(), MArgument { integer: &mut out }) };

    assert_eq!(code, 0);
    assert_eq!(out, 42);
}

#[test]
fn test_tensor_in_tensor_out() {
    let recorder = Recorder::default();
    let tables = tables(&recorder);

    let mut input: MTensor = std::ptr::null_mut();
    unsafe {
        assert_eq!(tensor_new(TensorKind::Real.raw(), 1, [3].as_ptr(), &mut input), 0);
        let data = get_real_data(input);
        for (i, v) in [1.0, 2.0, 3.0].iter().enumerate() {
            *data.add(i) = *v;
        }
    }

    let mut k = 2.5f64;
    let mut output: MTensor = std::ptr::null_mut();
    let args = [MArgument { tensor: &mut input }, MArgument { real: &mut k }];
    let code = unsafe { wl_scale(&tables, 2, args.as_ptr(), MArgument { tensor: &mut output }) };
    assert_eq!(code, 0);

    unsafe {
        assert_eq!(get_type(output), TensorKind::Real.raw());
        assert_eq!(get_rank(output), 1);
        let values = std::slice::from_raw_parts(get_real_data(output), 3);
        assert_eq!(values, &[2.5, 5.0, 7.5]);
        free(input);
        free(output);
    }
}

#[test]
fn test_numeric_array_result() {
    let recorder = Recorder::default();
    let tables = tables(&recorder);

    let mut n = 7i64;
    let mut output: MNumericArray = std::ptr::null_mut();
    let args = [MArgument { integer: &mut n }];
    let code = unsafe { wl_widths(&tables, 1, args.as_ptr(), MArgument { numeric_array: &mut output }) };
    assert_eq!(code, 0);

    unsafe {
        assert_eq!(get_tag(output), NumericArrayType::UBit16.raw());
        assert_eq!(*get_dimensions(output), 3);
        let values = std::slice::from_raw_parts(get_data(output).cast::<u16>(), 3);
        assert_eq!(values, &[7, 7, 7]);
        free(output);
    }
}

#[test]
fn test_rank_mismatch_reports_rank_error() {
    let recorder = Recorder::default();
    let tables = tables(&recorder);

    let mut input: MTensor = std::ptr::null_mut();
    unsafe { tensor_new(TensorKind::Integer.raw(), 1, [4].as_ptr(), &mut input) };

    let mut out = 0i64;
    let args = [MArgument { tensor: &mut input }];
    let code = unsafe { wl_sum_matrix(&tables, 1, args.as_ptr(), MArgument { integer: &mut out }) };

    assert_eq!(code, LibraryError::RankError.code());
    assert_eq!(out, 0);
    unsafe { free(input) };
}

#[test]
fn test_text_result_over_link() {
    let recorder = Recorder::default();
    let tables = tables(&recorder);

    let code = unsafe { wl_greet(&tables, 0, std::ptr::null(), MArgument::null()) };
    assert_eq!(code, 0);

    let tokens = recorder.lock().unwrap().clone();
    assert_eq!(
        tokens,
        vec![
            "EvaluatePacket[1]",
            "CompoundExpression[2]",
            "Set[2]",
            "linkreturn",
            "\"hello\"",
            "Null",
            "EndPacket",
        ]
    );
}

#[test]
fn test_argument_count_and_panics() {
    let recorder = Recorder::default();
    let tables = tables(&recorder);

    let mut a = 1i64;
    let mut out = 0i64;
    let args = [MArgument { integer: &mut a }];
    let code = unsafe { wl_add(&tables, 1, args.as_ptr(), MArgument { integer: &mut out }) };
    assert_eq!(code, LibraryError::FunctionError.code());

    let code = unsafe { wl_panics(&tables, 0, std::ptr::null(), MArgument { integer: &mut out }) };
    assert_eq!(code, LibraryError::FunctionError.code());
}

#[test]
fn test_null_result_slot_is_memory_error() {
    let recorder = Recorder::default();
    let tables = tables(&recorder);

    let mut input: MTensor = std::ptr::null_mut();
    unsafe { tensor_new(TensorKind::Real.raw(), 1, [2].as_ptr(), &mut input) };
    let mut k = 1.0f64;
    let args = [MArgument { tensor: &mut input }, MArgument { real: &mut k }];

    FREED.with(|n| n.set(0));
    let code = unsafe { wl_scale(&tables, 2, args.as_ptr(), MArgument::null()) };
    assert_eq!(code, LibraryError::MemoryError.code());
    // The freshly allocated result was released before returning
    assert_eq!(FREED.with(Cell::get), 1);
    unsafe { free(input) };
}
