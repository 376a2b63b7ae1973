//! The memory image of the loaded object.

use crate::{
    Result,
    elf::{Phdr, view::ElfView},
    error::parse_phdr_error,
    mmap::{MapFlags, Mmap, ProtFlags},
};
use core::{ffi::c_void, fmt::Debug, ptr::NonNull};
use elf::abi::{PF_R, PF_W, PF_X, PT_LOAD};

pub(crate) const PAGE_SIZE: usize = 0x1000;
pub(crate) const MASK: usize = !(PAGE_SIZE - 1);

#[inline]
fn roundup(x: usize, align: usize) -> usize {
    (x + align - 1) & !(align - 1)
}

/// The image allocation: a single page-aligned anonymous mapping holding
/// every LOAD segment at its file-relative offset.
///
/// `base() + p_vaddr` is the runtime address of the byte at virtual address
/// `p_vaddr`; the mapping itself starts at the page-floor of the smallest
/// LOAD address.
pub(crate) struct ElfSegments {
    memory: NonNull<c_void>,
    /// page-floor of the smallest LOAD p_vaddr
    offset: usize,
    len: usize,
    munmap: unsafe fn(NonNull<c_void>, usize) -> Result<()>,
}

impl Debug for ElfSegments {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ElfSegments")
            .field("memory", &self.memory)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

impl Drop for ElfSegments {
    fn drop(&mut self) {
        unsafe {
            (self.munmap)(self.memory, self.len).unwrap();
        }
    }
}

impl ElfSegments {
    pub(crate) fn map_prot(p_flags: u32) -> ProtFlags {
        let mut prot = ProtFlags::PROT_NONE;
        if p_flags & PF_R != 0 {
            prot |= ProtFlags::PROT_READ;
        }
        if p_flags & PF_W != 0 {
            prot |= ProtFlags::PROT_WRITE;
        }
        if p_flags & PF_X != 0 {
            prot |= ProtFlags::PROT_EXEC;
        }
        prot
    }

    /// Allocate the image and copy every LOAD segment into place.
    ///
    /// The allocation is created readable and writable; the relocator patches
    /// the image through this window and [`ElfSegments::protect`] tightens the
    /// permissions afterwards. Bytes past `p_filesz` stay zero because the
    /// anonymous mapping provides zero-filled pages.
    pub(crate) fn load<M: Mmap>(view: &ElfView, phdrs: &[Phdr]) -> Result<ElfSegments> {
        let mut min_vaddr = usize::MAX;
        let mut max_vaddr = 0;
        let mut prev_end = 0usize;

        // LOAD条目必须按p_vaddr升序排列且互不重叠
        for phdr in phdrs.iter().filter(|phdr| phdr.p_type == PT_LOAD) {
            let vaddr_start = phdr.p_vaddr as usize;
            let vaddr_end = vaddr_start
                .checked_add(phdr.p_memsz as usize)
                .ok_or_else(|| parse_phdr_error("LOAD segment address overflow"))?;
            if vaddr_start < prev_end {
                return Err(parse_phdr_error("overlapping LOAD segments"));
            }
            prev_end = vaddr_end;
            if (phdr.p_filesz as usize) > (phdr.p_memsz as usize) {
                return Err(parse_phdr_error("LOAD segment file size exceeds memory size"));
            }
            let file_end = (phdr.p_offset as usize)
                .checked_add(phdr.p_filesz as usize)
                .ok_or_else(|| parse_phdr_error("LOAD segment file range overflow"))?;
            if file_end > view.len() {
                return Err(parse_phdr_error("LOAD segment outside the file"));
            }
            min_vaddr = min_vaddr.min(vaddr_start);
            max_vaddr = max_vaddr.max(vaddr_end);
        }
        if min_vaddr == usize::MAX {
            return Err(parse_phdr_error("no LOAD segments"));
        }

        // 按页对齐
        let aligned_min = min_vaddr & MASK;
        let aligned_max = max_vaddr
            .checked_add(PAGE_SIZE - 1)
            .ok_or_else(|| parse_phdr_error("LOAD segment address overflow"))?
            & MASK;
        let len = aligned_max - aligned_min;
        let memory = unsafe {
            M::mmap_anonymous(
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE,
            )
        }?;
        let segments = ElfSegments {
            memory,
            offset: aligned_min,
            len,
            munmap: M::munmap,
        };

        let base = segments.base();
        for phdr in phdrs.iter().filter(|phdr| phdr.p_type == PT_LOAD) {
            let filesz = phdr.p_filesz as usize;
            // 目标地址由p_vaddr决定，而不是文件偏移
            let src = view
                .bytes(phdr.p_offset as usize, filesz)
                .ok_or_else(|| parse_phdr_error("LOAD segment outside the file"))?;
            unsafe {
                core::ptr::copy_nonoverlapping(
                    src.as_ptr(),
                    (base + phdr.p_vaddr as usize) as *mut u8,
                    filesz,
                );
            }
            #[cfg(feature = "log")]
            log::trace!(
                "[Load] vaddr: {:#x}, filesz: {:#x}, memsz: {:#x}, flags: {:?}",
                phdr.p_vaddr,
                phdr.p_filesz,
                phdr.p_memsz,
                Self::map_prot(phdr.p_flags),
            );
        }
        Ok(segments)
    }

    /// Set each LOAD segment's page range to exactly its `p_flags` mask.
    pub(crate) fn protect<M: Mmap>(&self, phdrs: &[Phdr]) -> Result<()> {
        let base = self.base();
        for phdr in phdrs.iter().filter(|phdr| phdr.p_type == PT_LOAD) {
            let start = phdr.p_vaddr as usize & MASK;
            let end = roundup(phdr.p_vaddr as usize + phdr.p_memsz as usize, PAGE_SIZE);
            let prot = Self::map_prot(phdr.p_flags);
            unsafe {
                let addr = NonNull::new_unchecked((base + start) as *mut c_void);
                M::mprotect(addr, end - start, prot)?;
            }
            #[cfg(feature = "log")]
            log::trace!(
                "[Mprotect] address: {:#x}, length: {:#x}, prot: {:?}",
                base + start,
                end - start,
                prot,
            );
        }
        Ok(())
    }

    /// base = memory_addr - offset
    #[inline]
    pub(crate) fn base(&self) -> usize {
        unsafe { self.memory.as_ptr().cast::<u8>().sub(self.offset) as usize }
    }

    #[inline]
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn contains_word(&self, vaddr: usize) -> bool {
        vaddr >= self.offset
            && vaddr
                .checked_add(size_of::<usize>())
                .is_some_and(|end| end <= self.offset + self.len)
    }

    /// Read the image word at virtual address `vaddr`.
    pub(crate) fn read_val(&self, vaddr: usize) -> Option<usize> {
        if !self.contains_word(vaddr) {
            return None;
        }
        unsafe { Some(((self.base() + vaddr) as *const usize).read_unaligned()) }
    }

    /// Patch the image word at virtual address `vaddr`.
    pub(crate) fn write_val(&self, vaddr: usize, val: usize) -> Option<()> {
        if !self.contains_word(vaddr) {
            return None;
        }
        unsafe { ((self.base() + vaddr) as *mut usize).write_unaligned(val) };
        Some(())
    }
}
