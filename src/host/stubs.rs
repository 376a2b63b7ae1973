//! Host stand-ins for the Bionic runtime symbols guest libraries reference.
//!
//! Three families live here: thin pass-throughs to the host libc, inert
//! stubs for the threading primitives (guest code is exercised
//! single-threaded), and the dl* family, which re-enters the loader so a
//! guest's own `dlopen` produces a fresh, independently owned library.

use crate::loader::ElfLibrary;
use core::{
    ffi::{c_char, c_int, c_uint, c_void},
    sync::atomic::{AtomicUsize, Ordering},
};
use std::ffi::CStr;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);
static FREES: AtomicUsize = AtomicUsize::new(0);
static PTHREAD_ONCE_CALLS: AtomicUsize = AtomicUsize::new(0);

/// Number of guest `malloc` and `free` calls served so far.
pub fn heap_counters() -> (usize, usize) {
    (
        ALLOCATIONS.load(Ordering::Relaxed),
        FREES.load(Ordering::Relaxed),
    )
}

/// Number of guest `pthread_once` calls served so far.
pub fn pthread_once_invocations() -> usize {
    PTHREAD_ONCE_CALLS.load(Ordering::Relaxed)
}

/// The shared stand-in bound to every relocation whose symbol has no host
/// implementation. A library referencing unknown symbols still loads;
/// actually calling one of them is unrecoverable.
pub extern "C" fn undefined_symbol() -> ! {
    eprintln!("bionic-loader: undefined symbol invoked");
    std::process::abort()
}

// ---- file I/O pass-throughs ----

pub(crate) extern "C" fn open(path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    unsafe { libc::open(path, flags, mode as c_uint) }
}

pub(crate) extern "C" fn close(fd: c_int) -> c_int {
    unsafe { libc::close(fd) }
}

pub(crate) extern "C" fn read(fd: c_int, buf: *mut c_void, count: usize) -> isize {
    unsafe { libc::read(fd, buf, count) }
}

pub(crate) extern "C" fn write(fd: c_int, buf: *const c_void, count: usize) -> isize {
    unsafe { libc::write(fd, buf, count) }
}

pub(crate) extern "C" fn lstat(path: *const c_char, st: *mut libc::stat) -> c_int {
    unsafe { libc::lstat(path, st) }
}

pub(crate) extern "C" fn fstat(fd: c_int, st: *mut libc::stat) -> c_int {
    unsafe { libc::fstat(fd, st) }
}

pub(crate) extern "C" fn mkdir(path: *const c_char, mode: libc::mode_t) -> c_int {
    unsafe { libc::mkdir(path, mode) }
}

pub(crate) extern "C" fn chmod(path: *const c_char, mode: libc::mode_t) -> c_int {
    unsafe { libc::chmod(path, mode) }
}

pub(crate) extern "C" fn umask(mask: libc::mode_t) -> libc::mode_t {
    unsafe { libc::umask(mask) }
}

pub(crate) extern "C" fn ftruncate(fd: c_int, length: libc::off_t) -> c_int {
    unsafe { libc::ftruncate(fd, length) }
}

// ---- memory, string, time ----

pub(crate) extern "C" fn malloc(size: usize) -> *mut c_void {
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    unsafe { libc::malloc(size) }
}

pub(crate) extern "C" fn free(ptr: *mut c_void) {
    FREES.fetch_add(1, Ordering::Relaxed);
    unsafe { libc::free(ptr) }
}

pub(crate) extern "C" fn strncpy(dst: *mut c_char, src: *const c_char, n: usize) -> *mut c_char {
    unsafe { libc::strncpy(dst, src, n) }
}

pub(crate) extern "C" fn gettimeofday(tv: *mut libc::timeval, tz: *mut c_void) -> c_int {
    unsafe { libc::gettimeofday(tv, tz.cast::<libc::timezone>()) }
}

pub(crate) extern "C" fn __errno() -> *mut c_int {
    unsafe { libc::__errno_location() }
}

pub(crate) extern "C" fn arc4random() -> u32 {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        let res = unsafe {
            libc::getrandom(
                buf[filled..].as_mut_ptr().cast(),
                buf.len() - filled,
                0,
            )
        };
        if res >= 0 {
            filled += res as usize;
        } else if unsafe { *libc::__errno_location() } != libc::EINTR {
            // 内核不支持getrandom时回退到urandom
            use std::io::Read;
            let ok = std::fs::File::open("/dev/urandom")
                .and_then(|mut file| file.read_exact(&mut buf[filled..]))
                .is_ok();
            if !ok {
                eprintln!("bionic-loader: no entropy source available");
                std::process::abort();
            }
            break;
        }
    }
    u32::from_ne_bytes(buf)
}

/// Android system properties do not exist on the host; every query reports
/// the same placeholder serial number.
pub(crate) extern "C" fn __system_property_get(_name: *const c_char, value: *mut c_char) -> c_int {
    const SERIAL: &[u8] = b"no s/n number\0";
    unsafe {
        core::ptr::copy_nonoverlapping(SERIAL.as_ptr(), value.cast::<u8>(), SERIAL.len());
    }
    (SERIAL.len() - 1) as c_int
}

// ---- inert threading stubs ----
//
// The guest's synchronization is a formality under this loader: everything
// runs single-threaded, so locking always succeeds and one-time initializers
// are never driven by the host.

pub(crate) extern "C" fn pthread_create(
    _thread: *mut c_void,
    _attr: *const c_void,
    _start_routine: *mut c_void,
    _arg: *mut c_void,
) -> c_int {
    0
}

pub(crate) extern "C" fn pthread_once(_once: *mut c_int, _init_routine: *mut c_void) -> c_int {
    PTHREAD_ONCE_CALLS.fetch_add(1, Ordering::Relaxed);
    0
}

pub(crate) extern "C" fn pthread_mutex_lock(_mutex: *mut c_void) -> c_int {
    0
}

pub(crate) extern "C" fn pthread_mutex_unlock(_mutex: *mut c_void) -> c_int {
    0
}

pub(crate) extern "C" fn pthread_rwlock_init(_lock: *mut c_void, _attr: *const c_void) -> c_int {
    0
}

pub(crate) extern "C" fn pthread_rwlock_destroy(_lock: *mut c_void) -> c_int {
    0
}

pub(crate) extern "C" fn pthread_rwlock_rdlock(_lock: *mut c_void) -> c_int {
    0
}

pub(crate) extern "C" fn pthread_rwlock_wrlock(_lock: *mut c_void) -> c_int {
    0
}

pub(crate) extern "C" fn pthread_rwlock_unlock(_lock: *mut c_void) -> c_int {
    0
}

// ---- dynamic loading, re-entering this loader ----

pub(crate) extern "C" fn dlopen(filename: *const c_char, _flags: c_int) -> *mut c_void {
    if filename.is_null() {
        return core::ptr::null_mut();
    }
    let Ok(path) = unsafe { CStr::from_ptr(filename) }.to_str() else {
        return core::ptr::null_mut();
    };
    ElfLibrary::from_file(path)
        .map(|lib| Box::into_raw(Box::new(lib)).cast::<c_void>())
        .unwrap_or_else(|_err| {
            #[cfg(feature = "log")]
            log::debug!("guest dlopen({path}) failed: {_err}");
            core::ptr::null_mut()
        })
}

pub(crate) extern "C" fn dlsym(handle: *mut c_void, name: *const c_char) -> *mut c_void {
    if handle.is_null() || name.is_null() {
        return core::ptr::null_mut();
    }
    let lib = unsafe { &*handle.cast::<ElfLibrary>() };
    let Ok(name) = unsafe { CStr::from_ptr(name) }.to_str() else {
        return core::ptr::null_mut();
    };
    lib.load_symbol(name)
        .map(|ptr| ptr.cast_mut().cast::<c_void>())
        .unwrap_or(core::ptr::null_mut())
}

pub(crate) extern "C" fn dlclose(handle: *mut c_void) -> c_int {
    if handle.is_null() {
        return -1;
    }
    drop(unsafe { Box::from_raw(handle.cast::<ElfLibrary>()) });
    0
}
