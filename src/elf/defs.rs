//! ELF format definitions.
//!
//! Word size is selected at build time to match the host architecture;
//! cross-word-size loading is not supported. The raw record layouts come
//! from the `elf` crate, wrapped here so the rest of the loader can read
//! relocation and symbol fields without caring about the file class.

use elf::abi::SHN_UNDEF;

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        pub(crate) const E_CLASS: u8 = elf::abi::ELFCLASS64;
        pub(crate) type Ehdr = elf::file::Elf64_Ehdr;
        pub(crate) type Phdr = elf::segment::Elf64_Phdr;
        pub(crate) type Shdr = elf::section::Elf64_Shdr;
        pub(crate) type Rela = elf::relocation::Elf64_Rela;
        pub(crate) type Rel = elf::relocation::Elf64_Rel;
        pub(crate) type Sym = elf::symbol::Elf64_Sym;
        pub(crate) const REL_MASK: usize = 0xFFFF_FFFF;
        pub(crate) const REL_BIT: usize = 32;
    } else {
        pub(crate) const E_CLASS: u8 = elf::abi::ELFCLASS32;
        pub(crate) type Ehdr = elf::file::Elf32_Ehdr;
        pub(crate) type Phdr = elf::segment::Elf32_Phdr;
        pub(crate) type Shdr = elf::section::Elf32_Shdr;
        pub(crate) type Rela = elf::relocation::Elf32_Rela;
        pub(crate) type Rel = elf::relocation::Elf32_Rel;
        pub(crate) type Sym = Elf32Sym;
        pub(crate) const REL_MASK: usize = 0xFF;
        pub(crate) const REL_BIT: usize = 8;
    }
}

#[cfg(target_endian = "little")]
pub(crate) const E_DATA: u8 = elf::abi::ELFDATA2LSB;
#[cfg(target_endian = "big")]
pub(crate) const E_DATA: u8 = elf::abi::ELFDATA2MSB;

pub(crate) const EHDR_SIZE: usize = size_of::<Ehdr>();

#[cfg(target_pointer_width = "32")]
#[repr(C)]
/// 32-bit ELF symbol table entry.
/// This struct represents the native 32-bit symbol format used in ELF32
/// files. For 64-bit targets, the `Sym` type alias points to
/// `elf::symbol::Elf64_Sym` instead.
pub(crate) struct Elf32Sym {
    pub st_name: u32,
    pub st_value: u32,
    pub st_size: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
}

/// ELF symbol table entry.
///
/// Provides a unified interface for accessing symbol information regardless
/// of whether the file is 32-bit or 64-bit.
#[repr(transparent)]
pub struct ElfSymbol {
    sym: Sym,
}

impl ElfSymbol {
    /// Returns the symbol value (an offset from the image base).
    #[inline]
    pub fn st_value(&self) -> usize {
        self.sym.st_value as usize
    }

    /// Returns the symbol name index into the dynamic string table.
    #[inline]
    pub fn st_name(&self) -> usize {
        self.sym.st_name as usize
    }

    /// Returns the symbol size.
    #[inline]
    pub fn st_size(&self) -> usize {
        self.sym.st_size as usize
    }

    /// Returns the symbol binding.
    #[inline]
    pub fn st_bind(&self) -> u8 {
        self.sym.st_info >> 4
    }

    /// Returns the symbol type.
    #[inline]
    pub fn st_type(&self) -> u8 {
        self.sym.st_info & 0xf
    }

    /// Returns true if the symbol is undefined (not defined in this object).
    #[inline]
    pub fn is_undef(&self) -> bool {
        self.sym.st_shndx == SHN_UNDEF
    }
}

/// ELF RELA relocation entry (explicit addend).
#[repr(transparent)]
pub(crate) struct ElfRela {
    rela: Rela,
}

impl ElfRela {
    /// Returns the relocation type.
    #[inline]
    pub(crate) fn r_type(&self) -> u32 {
        (self.rela.r_info as usize & REL_MASK) as u32
    }

    /// Returns the symbol index.
    #[inline]
    pub(crate) fn r_symbol(&self) -> usize {
        self.rela.r_info as usize >> REL_BIT
    }

    /// Returns the relocation offset (a virtual address in the image).
    #[inline]
    pub(crate) fn r_offset(&self) -> usize {
        self.rela.r_offset as usize
    }

    /// Returns the explicit addend.
    #[inline]
    pub(crate) fn r_addend(&self) -> isize {
        self.rela.r_addend as isize
    }
}

/// ELF REL relocation entry (implicit addend).
#[repr(transparent)]
pub(crate) struct ElfRel {
    rel: Rel,
}

impl ElfRel {
    /// Returns the relocation type.
    #[inline]
    pub(crate) fn r_type(&self) -> u32 {
        (self.rel.r_info as usize & REL_MASK) as u32
    }

    /// Returns the symbol index.
    #[inline]
    pub(crate) fn r_symbol(&self) -> usize {
        self.rel.r_info as usize >> REL_BIT
    }

    /// Returns the relocation offset (a virtual address in the image).
    #[inline]
    pub(crate) fn r_offset(&self) -> usize {
        self.rel.r_offset as usize
    }
}
