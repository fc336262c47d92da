use crate::{common::*, lang::Image, lang::TypeTag, runtime::*};
use core::{cell::RefCell, convert::TryFrom};
use std::os::raw::c_int;
use std::slice::from_raw_parts as slice_from_raw_parts;

///////////////////////////////////////////////
#[derive(Default)]
struct StoredBytes {
    // invariant: len is zero IFF its unoccupied
    // contents are 1+ bytes because we also store the NULL TERMINATOR
    buf: Vec<u8>,
}
impl StoredBytes {
    const NULL_TERMINATOR: u8 = 0;
    fn clear(&mut self) {
        // no null terminator either!
        self.buf.clear();
    }
    fn display_store<E: std::fmt::Display>(&mut self, error: &E) {
        let _ = write!(&mut self.buf, "{}", error);
        self.buf.push(Self::NULL_TERMINATOR);
    }
    fn bytes_store(&mut self, bytes: &[u8]) {
        let _ = self.buf.write_all(bytes);
        self.buf.push(Self::NULL_TERMINATOR);
    }
    fn bytes_peek(&self) -> (*const u8, usize) {
        match self.buf.len() {
            0 => (core::ptr::null(), 0), // nothing stored!
            n => {
                // stores n-1 bytes AND a NULL TERMINATOR
                (self.buf.as_ptr(), n - 1)
            }
        }
    }
}
thread_local! {
    static STORED_ERROR: RefCell<StoredBytes> = RefCell::new(StoredBytes::default());
    static STORED_RESULT: RefCell<StoredBytes> = RefCell::new(StoredBytes::default());
}
fn tl_display_store_error<E: std::fmt::Display>(error: &E) {
    STORED_ERROR.with(|stored| {
        let mut stored = stored.borrow_mut();
        stored.clear();
        stored.display_store(error);
    })
}
fn tl_clear() {
    STORED_ERROR.with(|stored| stored.borrow_mut().clear());
    STORED_RESULT.with(|stored| stored.borrow_mut().clear());
}
fn tl_store_result(bytes: &[u8]) {
    STORED_RESULT.with(|stored| {
        let mut stored = stored.borrow_mut();
        stored.clear();
        stored.bytes_store(bytes);
    })
}
unsafe fn tl_str_from_raw<'a>(bytes_ptr: *const u8, bytes_len: usize) -> Result<&'a str, c_int> {
    std::str::from_utf8(&*slice_from_raw_parts(bytes_ptr, bytes_len)).map_err(|err| {
        tl_display_store_error(&err);
        ERR_QUILL
    })
}

/// Host integers are converted according to the parameter type of the member.
fn argument_from_raw(value: i64, tag: TypeTag) -> Option<Argument> {
    match tag {
        TypeTag::BOOL => Some(Argument::Bool(value != 0)),
        TypeTag::INT => i32::try_from(value).ok().map(Argument::Int),
        TypeTag::LONG | TypeTag::GENERIC => Some(Argument::Long(value)),
        TypeTag::FLOAT => Some(Argument::Float(value as f64)),
        _ => None,
    }
}

pub const ERR_OK: c_int = 0;
pub const ERR_QUILL: c_int = -1;
pub const RESULT_STORED: c_int = 1;

///////////////////// ERRORS //////////////////////////

/// Returns length (via out pointer) and pointer (via return value) of the last error.
/// - pointer is NULL iff there was no last error
/// - data at pointer is null-delimited
/// - len does NOT include the length of the null-delimiter
/// If len is NULL, it will not written to.
#[no_mangle]
pub unsafe extern "C" fn quill_error_peek(len: *mut usize) -> *const u8 {
    let (ptr, stored_len) = STORED_ERROR.with(|stored| stored.borrow().bytes_peek());
    if !len.is_null() {
        len.write(stored_len);
    }
    ptr
}

///////////////////// IMAGE //////////////////////////

/// Loads an image from the bytes produced by an emitter.
/// - On success, returns a pointer to the loaded image
/// - On failure, stores an error string (see `quill_error_peek`) and returns NULL
#[no_mangle]
pub unsafe extern "C" fn quill_image_load(bytes_ptr: *const u8, bytes_len: usize) -> *mut Arc<Image> {
    tl_clear();
    match Image::from_bytes(&*slice_from_raw_parts(bytes_ptr, bytes_len)) {
        Ok(image) => Box::into_raw(Box::new(Arc::new(image))),
        Err(err) => {
            tl_display_store_error(&err);
            std::ptr::null_mut()
        }
    }
}

/// Destroys the given image and frees its resources.
#[no_mangle]
pub unsafe extern "C" fn quill_image_destroy(image: *mut Arc<Image>) {
    drop(Box::from_raw(image))
}

///////////////////// SESSION //////////////////////////

/// Creates a new session with the default configuration which does not log.
#[no_mangle]
pub unsafe extern "C" fn quill_session_new() -> *mut Session {
    Box::into_raw(Box::new(Session::new_simple()))
}

/// Creates a new session with the default configuration, logging to the file at the given
/// utf-8 encoded path. Returns NULL (and stores an error) if the file cannot be created.
#[no_mangle]
pub unsafe extern "C" fn quill_session_new_logging(path_ptr: *const u8, path_len: usize) -> *mut Session {
    tl_clear();
    let path_str = match tl_str_from_raw(path_ptr, path_len) {
        Ok(path_str) => path_str,
        Err(_) => return std::ptr::null_mut(),
    };
    match std::fs::File::create(path_str) {
        Ok(file) => {
            let session_id = Session::random_id();
            let file_logger = Box::new(FileLogger::new(session_id, file));
            let session = Session::new(file_logger, SessionConfig::default(), session_id);
            Box::into_raw(Box::new(session))
        }
        Err(err) => {
            tl_display_store_error(&err);
            std::ptr::null_mut()
        }
    }
}

/// Destroys the given session, freeing its heap.
#[no_mangle]
pub unsafe extern "C" fn quill_session_destroy(session: *mut Session) {
    drop(Box::from_raw(session))
}

/// Drops all objects allocated by earlier invocations.
#[no_mangle]
pub unsafe extern "C" fn quill_session_reset_heap(session: &mut Session) {
    session.reset_heap()
}

/// Given
/// - an initialized session,
/// - a loaded image,
/// - the utf-8 encoded name of a member in the image (e.g. "Program.main"),
/// - a slice of integer arguments, converted according to the member's parameter types,
/// invokes the member.
/// - Returns 1 if the member returned an object, its display form is available through
///   `quill_result_peek`
/// - Returns 0 if the member returned nothing
/// - Returns -1 and stores an error otherwise
#[no_mangle]
pub unsafe extern "C" fn quill_session_invoke(
    session: &mut Session,
    image: &Arc<Image>,
    member_ptr: *const u8,
    member_len: usize,
    args_ptr: *const i64,
    args_len: usize,
) -> c_int {
    tl_clear();
    let member = match tl_str_from_raw(member_ptr, member_len) {
        Ok(member) => member,
        Err(errcode) => return errcode,
    };
    let raw_args: &[i64] = match args_len {
        0 => &[],
        _ => &*slice_from_raw_parts(args_ptr, args_len),
    };

    // Members unknown to the image, or called with the wrong number of
    // arguments, are reported by the session itself
    let mut arguments = Vec::with_capacity(raw_args.len());
    if let Some(index) = image.member_index(member) {
        for (raw, tag) in raw_args.iter().zip(image.member(index).parameters.iter()) {
            match argument_from_raw(*raw, *tag) {
                Some(argument) => arguments.push(argument),
                None => {
                    tl_display_store_error(&format!(
                        "argument {} of '{}' cannot be passed as '{}'",
                        arguments.len(),
                        member,
                        tag.name()
                    ));
                    return ERR_QUILL;
                }
            }
        }
    }
    if arguments.len() != raw_args.len() {
        arguments = raw_args.iter().map(|raw| Argument::Long(*raw)).collect();
    }

    match session.invoke(image, member, arguments) {
        Ok(Some(object)) => {
            tl_store_result(session.display(&object).as_bytes());
            RESULT_STORED
        }
        Ok(None) => ERR_OK,
        Err(err) => {
            tl_display_store_error(&err);
            ERR_QUILL
        }
    }
}

/// Returns length (via out pointer) and pointer (via return value) of the display form of the
/// object returned by the last invocation on this thread. Same conventions as `quill_error_peek`.
#[no_mangle]
pub unsafe extern "C" fn quill_result_peek(len: *mut usize) -> *const u8 {
    let (ptr, stored_len) = STORED_RESULT.with(|stored| stored.borrow().bytes_peek());
    if !len.is_null() {
        len.write(stored_len);
    }
    ptr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_argument_conversion() {
        assert!(matches!(argument_from_raw(1, TypeTag::BOOL), Some(Argument::Bool(true))));
        assert!(matches!(argument_from_raw(-3, TypeTag::INT), Some(Argument::Int(-3))));
        assert!(argument_from_raw(i64::MAX, TypeTag::INT).is_none());
        assert!(matches!(argument_from_raw(2, TypeTag::FLOAT), Some(Argument::Float(v)) if v == 2.0));
        assert!(argument_from_raw(0, TypeTag::STRING).is_none());
        assert!(argument_from_raw(0, TypeTag::array(crate::lang::symbols::PrimitiveType::Int)).is_none());
    }

    #[test]
    fn test_load_failure_is_stored() {
        unsafe {
            let bytes = b"nope";
            let image = quill_image_load(bytes.as_ptr(), bytes.len());
            assert!(image.is_null());

            let mut len = 0;
            let ptr = quill_error_peek(&mut len);
            assert!(!ptr.is_null());
            let message = std::str::from_utf8(slice_from_raw_parts(ptr, len)).unwrap();
            assert!(!message.is_empty());
            assert_eq!(*ptr.add(len), 0);
        }
    }
}
