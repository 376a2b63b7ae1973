use super::{MapFlags, Mmap, ProtFlags};
use crate::{Result, error::map_error};
use core::{ffi::c_void, ptr::NonNull};
use libc::{mmap, mprotect, munmap, sysconf};

/// An implementation of the [`Mmap`] trait backed by the host libc.
pub struct MmapImpl;

impl Mmap for MmapImpl {
    unsafe fn mmap_file(
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
        fd: i32,
        offset: usize,
    ) -> Result<NonNull<c_void>> {
        let ptr = unsafe {
            mmap(
                core::ptr::null_mut(),
                len,
                prot.bits(),
                flags.bits(),
                fd,
                offset as _,
            )
        };
        if core::ptr::eq(ptr, libc::MAP_FAILED) {
            return Err(map_error("mmap failed"));
        }
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    unsafe fn mmap_anonymous(
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
    ) -> Result<NonNull<c_void>> {
        let ptr = unsafe {
            mmap(
                core::ptr::null_mut(),
                len,
                prot.bits(),
                flags.union(MapFlags::MAP_ANONYMOUS).bits(),
                -1,
                0,
            )
        };
        if core::ptr::eq(ptr, libc::MAP_FAILED) {
            return Err(map_error("mmap anonymous failed"));
        }
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    unsafe fn munmap(addr: NonNull<c_void>, len: usize) -> Result<()> {
        let res = unsafe { munmap(addr.as_ptr(), len) };
        if res != 0 {
            return Err(map_error("munmap failed"));
        }
        Ok(())
    }

    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()> {
        let res = unsafe { mprotect(addr.as_ptr(), len, prot.bits()) };
        if res != 0 {
            return Err(map_error("mprotect failed"));
        }
        Ok(())
    }

    fn page_size() -> usize {
        unsafe { sysconf(libc::_SC_PAGESIZE) as usize }
    }
}
