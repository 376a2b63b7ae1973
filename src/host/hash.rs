//! Perfect-hash dispatch for the host symbol table.
//!
//! The table is closed: it covers exactly the Bionic symbols guest
//! libraries are expected to reference. Dispatch hashes the word length and
//! the bytes at positions 0, 1, and (for words of at least 16 bytes) 15
//! through a 256-entry associated-values table; every slot holds at most
//! one entry and a full string comparison confirms a match before an
//! address is produced, so arbitrary input can never alias a member.

use super::stubs;

pub(crate) const MIN_WORD_LENGTH: usize = 4;
pub(crate) const MAX_WORD_LENGTH: usize = 22;
pub(crate) const MAX_HASH_VALUE: usize = 45;

#[rustfmt::skip]
static ASSO_VALUES: [u8; 256] = [
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,  1,
    46,  2, 46,  0,  5, 27, 12,  4, 34, 14, 46, 16,  0, 16,  0, 13,
     0, 46, 13,  1,  7, 14, 46,  4, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
    46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46, 46,
];

pub(crate) struct HostEntry {
    pub(crate) name: &'static str,
    addr: fn() -> *const (),
}

const fn entry(name: &'static str, addr: fn() -> *const ()) -> Option<HostEntry> {
    Some(HostEntry { name, addr })
}

/// One slot per hash value; a `None` slot can never be produced by a
/// member name.
#[rustfmt::skip]
static WORDLIST: [Option<HostEntry>; MAX_HASH_VALUE + 1] = [
    None, None, None, None, None,
    entry("close", || stubs::close as *const ()),
    entry("lstat", || stubs::lstat as *const ()),
    None, None,
    entry("__errno", || stubs::__errno as *const ()),
    entry("dlsym", || stubs::dlsym as *const ()),
    entry("dlopen", || stubs::dlopen as *const ()),
    entry("dlclose", || stubs::dlclose as *const ()),
    None, None,
    entry("strncpy", || stubs::strncpy as *const ()),
    None,
    entry("open", || stubs::open as *const ()),
    entry("fstat", || stubs::fstat as *const ()),
    entry("pthread_once", || stubs::pthread_once as *const ()),
    None,
    entry("pthread_create", || stubs::pthread_create as *const ()),
    entry("write", || stubs::write as *const ()),
    None,
    entry("malloc", || stubs::malloc as *const ()),
    entry("arc4random", || stubs::arc4random as *const ()),
    None,
    entry("pthread_mutex_unlock", || stubs::pthread_mutex_unlock as *const ()),
    entry("ftruncate", || stubs::ftruncate as *const ()),
    entry("free", || stubs::free as *const ()),
    entry("__system_property_get", || stubs::__system_property_get as *const ()),
    None,
    entry("pthread_rwlock_wrlock", || stubs::pthread_rwlock_wrlock as *const ()),
    None,
    entry("pthread_rwlock_destroy", || stubs::pthread_rwlock_destroy as *const ()),
    entry("umask", || stubs::umask as *const ()),
    None,
    entry("mkdir", || stubs::mkdir as *const ()),
    entry("pthread_mutex_lock", || stubs::pthread_mutex_lock as *const ()),
    entry("chmod", || stubs::chmod as *const ()),
    entry("pthread_rwlock_init", || stubs::pthread_rwlock_init as *const ()),
    entry("pthread_rwlock_rdlock", || stubs::pthread_rwlock_rdlock as *const ()),
    entry("pthread_rwlock_unlock", || stubs::pthread_rwlock_unlock as *const ()),
    entry("gettimeofday", || stubs::gettimeofday as *const ()),
    entry("read", || stubs::read as *const ()),
    None,
];

#[inline]
fn hash(name: &[u8]) -> usize {
    let mut key = name.len() + ASSO_VALUES[name[0] as usize] as usize;
    if name.len() >= 2 {
        key += ASSO_VALUES[name[1] as usize] as usize;
    }
    if name.len() >= 16 {
        key += ASSO_VALUES[name[15] as usize] as usize;
    }
    key
}

/// Returns the host stand-in for `name`, or `None` for anything outside
/// the fixed symbol set.
pub(crate) fn lookup(name: &str) -> Option<*const ()> {
    let len = name.len();
    if !(MIN_WORD_LENGTH..=MAX_WORD_LENGTH).contains(&len) {
        return None;
    }
    let key = hash(name.as_bytes());
    if key > MAX_HASH_VALUE {
        return None;
    }
    let entry = WORDLIST[key].as_ref()?;
    if entry.name == name {
        Some((entry.addr)())
    } else {
        None
    }
}
