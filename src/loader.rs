//! The loader façade: parse, map, relocate, protect.

use crate::{
    Result,
    elf::{ElfHeader, ElfSymbol, Phdr, SectionInfo, Shdr, view::ElfView},
    error::{find_symbol_error, io_error, map_error, parse_phdr_error, parse_shdr_error},
    host::HostSymbols,
    mmap::{Mmap, MmapImpl},
    relocation::{self, SymbolLookup},
    segment::{ElfSegments, PAGE_SIZE},
    symbol::SymbolTable,
};
use core::{marker::PhantomData, ops::Deref};
use elf::abi::{SHT_DYNSYM, SHT_GNU_HASH, SHT_REL, SHT_RELA, SHT_STRTAB};
use std::{
    ffi::{CStr, CString},
    fs::File,
    ops::Range,
    path::Path,
};

/// Section descriptors gathered while scanning the section header table.
pub(crate) struct DynamicSections {
    /// .shstrtab
    #[allow(unused)]
    shstrtab: SectionInfo,
    /// .dynsym
    dynsym: SectionInfo,
    /// .dynstr
    dynstr: SectionInfo,
    /// .gnu.hash
    gnu_hash: SectionInfo,
    /// every SHT_REL / SHT_RELA section, in file order
    rel_sections: Vec<SectionInfo>,
}

fn scan_sections(view: &ElfView, ehdr: &ElfHeader) -> Result<DynamicSections> {
    if ehdr.e_shentsize() != size_of::<Shdr>() {
        return Err(parse_shdr_error("bad section header entry size"));
    }
    let shdrs = view
        .identify_array::<Shdr>(ehdr.e_shoff(), ehdr.e_shnum())
        .ok_or_else(|| parse_shdr_error("section header table out of bounds"))?;
    let shstrtab = shdrs
        .get(ehdr.e_shstrndx())
        .map(SectionInfo::from_shdr)
        .ok_or_else(|| parse_shdr_error("missing section name string table"))?;

    let mut dynsym = None;
    let mut gnu_hash = None;
    let mut rel_sections = Vec::new();
    for shdr in shdrs {
        #[cfg(feature = "log")]
        log::trace!(
            "[Scan] section {}: type {:#x}, offset {:#x}, size {:#x}",
            section_name(view, &shstrtab, shdr.sh_name),
            shdr.sh_type,
            shdr.sh_offset,
            shdr.sh_size,
        );
        match shdr.sh_type {
            SHT_DYNSYM => dynsym = Some(SectionInfo::from_shdr(shdr)),
            SHT_GNU_HASH => gnu_hash = Some(SectionInfo::from_shdr(shdr)),
            SHT_REL | SHT_RELA => rel_sections.push(SectionInfo::from_shdr(shdr)),
            _ => {}
        }
    }
    let dynsym = dynsym.ok_or_else(|| parse_shdr_error("no .dynsym section"))?;
    let gnu_hash = gnu_hash.ok_or_else(|| parse_shdr_error("no .gnu.hash section"))?;
    let dynstr = shdrs
        .get(dynsym.link as usize)
        .map(SectionInfo::from_shdr)
        .filter(|s| s.sh_type == SHT_STRTAB)
        .ok_or_else(|| parse_shdr_error(".dynsym is not linked to a string table"))?;
    Ok(DynamicSections {
        shstrtab,
        dynsym,
        dynstr,
        gnu_hash,
        rel_sections,
    })
}

#[cfg(feature = "log")]
fn section_name<'v>(view: &'v ElfView, shstrtab: &SectionInfo, sh_name: u32) -> &'v str {
    view.bytes(shstrtab.offset, shstrtab.size)
        .and_then(|data| data.get(sh_name as usize..))
        .and_then(|tail| {
            let end = tail.iter().position(|b| *b == 0)?;
            core::str::from_utf8(&tail[..end]).ok()
        })
        .unwrap_or("?")
}

/// The shared object loader, generic over the host's memory mapping
/// facility.
pub struct Loader<M = MmapImpl>
where
    M: Mmap,
{
    _marker: PhantomData<M>,
}

impl<M: Mmap> Default for Loader<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Mmap> Loader<M> {
    /// Create a new loader
    pub const fn new() -> Self {
        Loader {
            _marker: PhantomData,
        }
    }

    /// Load an Android shared object, binding every dynamic relocation
    /// eagerly against the Bionic host symbol table.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ElfLibrary> {
        self.load_with(path, &HostSymbols)
    }

    /// Load with a caller-provided host symbol table.
    ///
    /// Symbols that `pre_find` does not provide are bound to the shared
    /// [`undefined_symbol`](crate::host::undefined_symbol) stand-in and only
    /// fail if the guest actually calls them.
    pub fn load_with<S>(&self, path: impl AsRef<Path>, pre_find: &S) -> Result<ElfLibrary>
    where
        S: SymbolLookup,
    {
        let path = path.as_ref();
        if M::page_size() != PAGE_SIZE {
            return Err(map_error("host page size is not 4096 bytes"));
        }
        let file = File::open(path)?;
        let view = ElfView::from_file::<M>(&file)?;
        let ehdr = ElfHeader::parse(&view)?;
        ehdr.validate()?;
        if ehdr.e_phentsize() != size_of::<Phdr>() {
            return Err(parse_phdr_error("bad program header entry size"));
        }
        let phdrs = view
            .identify_array::<Phdr>(ehdr.e_phoff(), ehdr.e_phnum())
            .ok_or_else(|| parse_phdr_error("program header table out of bounds"))?;
        let sections = scan_sections(&view, &ehdr)?;
        // 镜像在重定位完成之前保持可写
        let segments = ElfSegments::load::<M>(&view, phdrs)?;
        {
            let symtab = SymbolTable::new(
                &view,
                &sections.dynsym,
                &sections.dynstr,
                &sections.gnu_hash,
            )?;
            relocation::relocate(&view, &sections.rel_sections, &segments, &symtab, pre_find)?;
        }
        segments.protect::<M>(phdrs)?;
        let name = CString::new(path.to_string_lossy().into_owned())
            .map_err(|_| io_error("path contains a NUL byte"))?;
        #[cfg(feature = "log")]
        log::debug!(
            "loaded [{}] at base {:#x}, image size {:#x}",
            name.to_string_lossy(),
            segments.base(),
            segments.len(),
        );
        Ok(ElfLibrary {
            name,
            segments,
            view,
            sections,
        })
    }
}

/// An Android shared library loaded into the host process.
///
/// After construction the library is immutable; concurrent
/// [`load_symbol`](ElfLibrary::load_symbol) calls are read-only over the
/// file-backed tables. Field order is load-bearing: dropping releases the
/// image allocation first, then the file mapping.
pub struct ElfLibrary {
    name: CString,
    segments: ElfSegments,
    view: ElfView,
    sections: DynamicSections,
}

impl ElfLibrary {
    /// Load the shared object at `path` with the default mmap backend.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ElfLibrary> {
        Loader::<MmapImpl>::new().load(path)
    }

    fn symtab(&self) -> Result<SymbolTable<'_>> {
        SymbolTable::new(
            &self.view,
            &self.sections.dynsym,
            &self.sections.dynstr,
            &self.sections.gnu_hash,
        )
    }

    /// Resolve an exported symbol to its address inside the mapped image.
    pub fn load_symbol(&self, name: &str) -> Result<*const ()> {
        let symtab = self.symtab()?;
        let sym = symtab.lookup(name).ok_or_else(|| {
            find_symbol_error(format!("symbol [{name}] not found in [{}]", self.name()))
        })?;
        #[cfg(feature = "log")]
        log::trace!("resolved [{}] to base + {:#x}", name, sym.st_value());
        Ok((self.base() + sym.st_value()) as *const ())
    }

    /// Typed variant of [`load_symbol`](ElfLibrary::load_symbol).
    ///
    /// # Safety
    /// Users of this API must specify the correct type of the function or
    /// variable loaded.
    ///
    /// # Examples
    /// ```no_run
    /// # use bionic_loader::ElfLibrary;
    /// # let lib = ElfLibrary::from_file("libguest.so").unwrap();
    /// let add = unsafe { *lib.get::<extern "C" fn(i32, i32) -> i32>("add").unwrap() };
    /// assert_eq!(add(2, 3), 5);
    /// ```
    pub unsafe fn get<'lib, T>(&'lib self, name: &str) -> Result<Symbol<'lib, T>> {
        self.load_symbol(name).map(|ptr| Symbol {
            ptr: ptr.cast_mut(),
            pd: PhantomData,
        })
    }

    /// The runtime base address of the image.
    #[inline]
    pub fn base(&self) -> usize {
        self.segments.base()
    }

    /// The address range of the image allocation.
    #[inline]
    pub fn mapped_range(&self) -> Range<usize> {
        let start = self.base() + self.segments.offset();
        start..start + self.segments.len()
    }

    /// The path this library was loaded from.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.to_str().unwrap()
    }

    /// C-string variant of [`name`](ElfLibrary::name).
    #[inline]
    pub fn cname(&self) -> &CStr {
        self.name.as_c_str()
    }

    /// Number of entries in the dynamic symbol table.
    #[inline]
    pub fn symbol_count(&self) -> usize {
        self.symtab().map(|symtab| symtab.count()).unwrap_or(0)
    }

    /// Name and record of every entry in the dynamic symbol table, in
    /// table order.
    pub fn dynamic_symbols(&self) -> Vec<(&str, &ElfSymbol)> {
        let Ok(symtab) = self.symtab() else {
            return Vec::new();
        };
        (0..symtab.count())
            .filter_map(|idx| {
                let sym = symtab.symbol(idx)?;
                Some((symtab.name_of(sym)?, sym))
            })
            .collect()
    }
}

impl core::fmt::Debug for ElfLibrary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ElfLibrary")
            .field("name", &self.name)
            .field("segments", &self.segments)
            .finish()
    }
}

/// A symbol from a loaded library
#[derive(Debug, Clone)]
pub struct Symbol<'lib, T: 'lib> {
    ptr: *mut (),
    pd: PhantomData<&'lib T>,
}

impl<'lib, T> Deref for Symbol<'lib, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*(&self.ptr as *const *mut _ as *const T) }
    }
}

impl<'lib, T> Symbol<'lib, T> {
    pub fn into_raw(self) -> *const () {
        self.ptr
    }
}
