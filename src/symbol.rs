//! Dynamic string and symbol table views.

use crate::{
    Result,
    elf::{ElfSymbol, SectionInfo, Sym, gnu_hash::GnuHashView, view::ElfView},
    error::parse_shdr_error,
};

/// The dynamic string table (`.dynstr`), borrowed from the file view.
pub(crate) struct ElfStringTable<'v> {
    data: &'v [u8],
}

impl<'v> ElfStringTable<'v> {
    const fn new(data: &'v [u8]) -> Self {
        ElfStringTable { data }
    }

    /// NUL-terminated string at `offset`, or `None` when the offset is out
    /// of range or the bytes are not valid UTF-8.
    #[inline]
    pub(crate) fn get(&self, offset: usize) -> Option<&'v str> {
        let tail = self.data.get(offset..)?;
        let end = tail.iter().position(|b| *b == 0)?;
        core::str::from_utf8(&tail[..end]).ok()
    }
}

/// Symbol table of the loaded object: `.dynsym` entries, `.dynstr`, and the
/// GNU hash index, all borrowed from the file mapping.
pub(crate) struct SymbolTable<'v> {
    pub(crate) symtab: &'v [ElfSymbol],
    pub(crate) strtab: ElfStringTable<'v>,
    hashtab: GnuHashView<'v>,
}

impl<'v> SymbolTable<'v> {
    /// Materialize the table from the scanned section descriptors.
    pub(crate) fn new(
        view: &'v ElfView,
        dynsym: &SectionInfo,
        dynstr: &SectionInfo,
        gnu_hash: &SectionInfo,
    ) -> Result<SymbolTable<'v>> {
        if dynsym.entsize != size_of::<Sym>() {
            return Err(parse_shdr_error("bad .dynsym entry size"));
        }
        let symtab = view
            .identify_array::<ElfSymbol>(dynsym.offset, dynsym.count())
            .ok_or_else(|| parse_shdr_error(".dynsym out of bounds"))?;
        let strtab = view
            .bytes(dynstr.offset, dynstr.size)
            .ok_or_else(|| parse_shdr_error(".dynstr out of bounds"))?;
        let hashtab = GnuHashView::parse(view, gnu_hash)
            .ok_or_else(|| parse_shdr_error("malformed .gnu.hash section"))?;
        Ok(SymbolTable {
            symtab,
            strtab: ElfStringTable::new(strtab),
            hashtab,
        })
    }

    /// The symbol record at `idx`.
    #[inline]
    pub(crate) fn symbol(&self, idx: usize) -> Option<&'v ElfSymbol> {
        self.symtab.get(idx)
    }

    /// The name of a symbol record.
    #[inline]
    pub(crate) fn name_of(&self, sym: &ElfSymbol) -> Option<&'v str> {
        self.strtab.get(sym.st_name())
    }

    /// Find an exported symbol through the GNU hash table.
    #[inline]
    pub(crate) fn lookup(&self, name: &str) -> Option<&'v ElfSymbol> {
        self.hashtab.lookup(self, name)
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.symtab.len()
    }
}
