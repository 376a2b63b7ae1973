//! Map memory to address space

mod unix;

pub use unix::MmapImpl;

use crate::Result;
use bitflags::bitflags;
use core::{
    ffi::{c_int, c_void},
    ptr::NonNull,
};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Desired memory protection of a memory mapping.
    pub struct ProtFlags: c_int {
        /// Pages cannot be accessed.
        const PROT_NONE = 0;
        /// Pages can be read.
        const PROT_READ = 1;
        /// Pages can be written.
        const PROT_WRITE = 2;
        /// Pages can be executed
        const PROT_EXEC = 4;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug)]
    /// Additional parameters for [`Mmap::mmap_file`].
    pub struct MapFlags: c_int {
        /// Create a private copy-on-write mapping. Mutually exclusive with `MAP_SHARED`.
        const MAP_PRIVATE = 2;
        /// Place the mapping at exactly the address specified in `addr`.
        const MAP_FIXED = 16;
        /// The mapping is not backed by any file.
        const MAP_ANONYMOUS = 32;
    }
}

/// A trait representing the low-level memory mapping operations the loader
/// consumes from the host.
///
/// Two mappings exist per loaded library: the read-only file view and the
/// anonymous image allocation. Both are created, protected, and released
/// through this trait, so a host with unusual memory management (sandboxes,
/// test harnesses) can substitute its own implementation.
pub trait Mmap {
    /// Maps a file into memory at an address chosen by the host.
    ///
    /// # Arguments
    /// * `len` - The length of the memory region to map.
    /// * `prot` - The protection options for the mapping.
    /// * `flags` - The flags controlling the details of the mapping.
    /// * `fd` - The file descriptor backing the mapping.
    /// * `offset` - The page-aligned file offset.
    ///
    /// # Safety
    /// This depends on the correctness of the trait implementation.
    unsafe fn mmap_file(
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
        fd: i32,
        offset: usize,
    ) -> Result<NonNull<c_void>>;

    /// Creates a new anonymous mapping with the specified protection and flags.
    ///
    /// The returned pages are zero-filled.
    ///
    /// # Safety
    /// This depends on the correctness of the trait implementation.
    unsafe fn mmap_anonymous(len: usize, prot: ProtFlags, flags: MapFlags)
    -> Result<NonNull<c_void>>;

    /// Releases a previously mapped memory region.
    ///
    /// # Safety
    /// This depends on the correctness of the trait implementation.
    unsafe fn munmap(addr: NonNull<c_void>, len: usize) -> Result<()>;

    /// Changes the protection of a memory region.
    ///
    /// # Safety
    /// This depends on the correctness of the trait implementation.
    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()>;

    /// Returns the host's page size in bytes.
    fn page_size() -> usize;
}
