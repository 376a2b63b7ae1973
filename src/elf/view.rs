//! Read-only view of the shared object file.

use crate::{
    Result,
    arch::EM_ARCH,
    elf::defs::{E_CLASS, E_DATA, EHDR_SIZE, Ehdr},
    error::parse_ehdr_error,
    mmap::{MapFlags, Mmap, ProtFlags},
};
use core::{ffi::c_void, ptr::NonNull};
use elf::abi::{EI_CLASS, EI_DATA, EI_VERSION, ELFMAGIC, ET_DYN, EV_CURRENT};
use std::{fs::File, os::fd::AsRawFd};

/// The memory mapping of the shared object file itself.
///
/// The mapping stays alive for the lifetime of the loaded library because
/// the string, symbol, and hash tables are read straight out of it.
pub(crate) struct ElfView {
    memory: NonNull<c_void>,
    len: usize,
    munmap: unsafe fn(NonNull<c_void>, usize) -> Result<()>,
}

impl ElfView {
    /// Map an opened file read-only.
    pub(crate) fn from_file<M: Mmap>(file: &File) -> Result<ElfView> {
        let len = file.metadata()?.len() as usize;
        if len < EHDR_SIZE {
            return Err(parse_ehdr_error("file too small for an ELF header"));
        }
        let memory = unsafe {
            M::mmap_file(
                len,
                ProtFlags::PROT_READ,
                MapFlags::MAP_PRIVATE,
                file.as_raw_fd(),
                0,
            )
        }?;
        Ok(ElfView {
            memory,
            len,
            munmap: M::munmap,
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn as_ptr(&self) -> *const u8 {
        self.memory.as_ptr().cast()
    }

    /// Reinterpret the bytes at `offset` as a single `T`.
    ///
    /// Returns `None` when the range falls outside the file.
    pub(crate) fn identify<T>(&self, offset: usize) -> Option<&T> {
        let end = offset.checked_add(size_of::<T>())?;
        if end > self.len {
            return None;
        }
        debug_assert!((self.as_ptr() as usize + offset) % align_of::<T>() == 0);
        unsafe { Some(&*self.as_ptr().add(offset).cast::<T>()) }
    }

    /// Reinterpret the bytes at `offset` as a slice of `count` `T` values.
    ///
    /// Returns `None` on arithmetic overflow or when the range falls
    /// outside the file.
    pub(crate) fn identify_array<T>(&self, offset: usize, count: usize) -> Option<&[T]> {
        let bytes = count.checked_mul(size_of::<T>())?;
        let end = offset.checked_add(bytes)?;
        if end > self.len {
            return None;
        }
        debug_assert!((self.as_ptr() as usize + offset) % align_of::<T>() == 0);
        unsafe {
            Some(core::slice::from_raw_parts(
                self.as_ptr().add(offset).cast::<T>(),
                count,
            ))
        }
    }

    /// Raw bytes at `offset`.
    pub(crate) fn bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        unsafe { Some(core::slice::from_raw_parts(self.as_ptr().add(offset), len)) }
    }
}

impl Drop for ElfView {
    fn drop(&mut self) {
        unsafe {
            (self.munmap)(self.memory, self.len).unwrap();
        }
    }
}

/// The ELF header, borrowed from the file view.
pub(crate) struct ElfHeader<'v> {
    pub ehdr: &'v Ehdr,
}

impl<'v> ElfHeader<'v> {
    pub(crate) fn parse(view: &'v ElfView) -> Result<ElfHeader<'v>> {
        let ehdr = view
            .identify::<Ehdr>(0)
            .ok_or_else(|| parse_ehdr_error("truncated ELF header"))?;
        Ok(ElfHeader { ehdr })
    }

    /// Reject files this loader cannot run: wrong container, wrong class or
    /// encoding for the host, executables, foreign machine types.
    pub(crate) fn validate(&self) -> Result<()> {
        let ident = &self.ehdr.e_ident;
        if ident[0..4] != ELFMAGIC {
            return Err(parse_ehdr_error("invalid ELF magic"));
        }
        if ident[EI_CLASS] != E_CLASS {
            return Err(parse_ehdr_error("file class mismatch"));
        }
        if ident[EI_DATA] != E_DATA {
            return Err(parse_ehdr_error("file data encoding mismatch"));
        }
        if ident[EI_VERSION] != EV_CURRENT {
            return Err(parse_ehdr_error("invalid ELF version"));
        }
        if self.ehdr.e_type != ET_DYN {
            return Err(parse_ehdr_error("file type mismatch"));
        }
        if self.ehdr.e_machine != EM_ARCH {
            return Err(parse_ehdr_error("file arch mismatch"));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn e_phoff(&self) -> usize {
        self.ehdr.e_phoff as usize
    }

    #[inline]
    pub(crate) fn e_phnum(&self) -> usize {
        self.ehdr.e_phnum as usize
    }

    #[inline]
    pub(crate) fn e_phentsize(&self) -> usize {
        self.ehdr.e_phentsize as usize
    }

    #[inline]
    pub(crate) fn e_shoff(&self) -> usize {
        self.ehdr.e_shoff as usize
    }

    #[inline]
    pub(crate) fn e_shnum(&self) -> usize {
        self.ehdr.e_shnum as usize
    }

    #[inline]
    pub(crate) fn e_shentsize(&self) -> usize {
        self.ehdr.e_shentsize as usize
    }

    #[inline]
    pub(crate) fn e_shstrndx(&self) -> usize {
        self.ehdr.e_shstrndx as usize
    }
}
