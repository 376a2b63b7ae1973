//! Eager relocation of the loaded image.
//!
//! Every dynamic relocation is bound at load time; there is no lazy (PLT)
//! path. Referenced symbols resolve against the host symbol table only —
//! a shared object's self-references arrive as RELATIVE entries and never
//! go through name lookup.

use crate::{
    Result,
    arch::{REL_GOT, REL_JUMP_SLOT, REL_NONE, REL_RELATIVE, REL_SYMBOLIC, rel_type_to_str},
    elf::{ElfRel, ElfRela, SectionInfo, view::ElfView},
    error::relocate_error,
    host,
    segment::ElfSegments,
    symbol::SymbolTable,
};
use elf::abi::{SHT_REL, SHT_RELA};

/// A trait for looking up host symbols during relocation
///
/// This trait allows for flexible symbol resolution strategies, supporting
/// both closures and complex structs with state.
pub trait SymbolLookup {
    /// Find the address of a symbol by name
    fn lookup(&self, name: &str) -> Option<*const ()>;
}

impl<F> SymbolLookup for F
where
    F: Fn(&str) -> Option<*const ()>,
{
    fn lookup(&self, name: &str) -> Option<*const ()> {
        self(name)
    }
}

/// Addend sourcing is the only difference between the two relocation
/// section kinds: RELA entries carry one, REL entries do not.
pub(crate) trait RelEntry {
    fn r_offset(&self) -> usize;
    fn r_type(&self) -> u32;
    fn r_symbol(&self) -> usize;
    fn explicit_addend(&self) -> Option<isize>;
}

impl RelEntry for ElfRela {
    #[inline]
    fn r_offset(&self) -> usize {
        ElfRela::r_offset(self)
    }

    #[inline]
    fn r_type(&self) -> u32 {
        ElfRela::r_type(self)
    }

    #[inline]
    fn r_symbol(&self) -> usize {
        ElfRela::r_symbol(self)
    }

    #[inline]
    fn explicit_addend(&self) -> Option<isize> {
        Some(self.r_addend())
    }
}

impl RelEntry for ElfRel {
    #[inline]
    fn r_offset(&self) -> usize {
        ElfRel::r_offset(self)
    }

    #[inline]
    fn r_type(&self) -> u32 {
        ElfRel::r_type(self)
    }

    #[inline]
    fn r_symbol(&self) -> usize {
        ElfRel::r_symbol(self)
    }

    #[inline]
    fn explicit_addend(&self) -> Option<isize> {
        None
    }
}

/// Apply every relocation section in file order.
pub(crate) fn relocate<S>(
    view: &ElfView,
    rel_sections: &[SectionInfo],
    segments: &ElfSegments,
    symtab: &SymbolTable,
    pre_find: &S,
) -> Result<()>
where
    S: SymbolLookup,
{
    for section in rel_sections {
        match section.sh_type {
            SHT_RELA => {
                if section.entsize != size_of::<ElfRela>() {
                    return Err(relocate_error("bad RELA entry size"));
                }
                let entries = view
                    .identify_array::<ElfRela>(section.offset, section.count())
                    .ok_or_else(|| relocate_error("relocation section out of bounds"))?;
                relocate_entries(entries, segments, symtab, pre_find)?;
            }
            SHT_REL => {
                if section.entsize != size_of::<ElfRel>() {
                    return Err(relocate_error("bad REL entry size"));
                }
                let entries = view
                    .identify_array::<ElfRel>(section.offset, section.count())
                    .ok_or_else(|| relocate_error("relocation section out of bounds"))?;
                relocate_entries(entries, segments, symtab, pre_find)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn relocate_entries<E, S>(
    entries: &[E],
    segments: &ElfSegments,
    symtab: &SymbolTable,
    pre_find: &S,
) -> Result<()>
where
    E: RelEntry,
    S: SymbolLookup,
{
    /*
        Relocation formula components:
        A = Addend used to compute the value of the relocatable field
        B = Base address at which the shared object is loaded
        S = Address of the host symbol whose index resides in the entry
    */
    let base = segments.base();
    for rel in entries {
        let r_type = rel.r_type();
        let r_sym = rel.r_symbol();
        let r_offset = rel.r_offset();
        match r_type {
            REL_NONE => {}
            REL_RELATIVE => {
                let addend = match rel.explicit_addend() {
                    Some(addend) => addend,
                    // REL格式的隐式加数保存在镜像的重定位目标处
                    None => segments
                        .read_val(r_offset)
                        .ok_or_else(|| bad_offset(r_type, r_offset))?
                        as isize,
                };
                segments
                    .write_val(r_offset, base.wrapping_add_signed(addend))
                    .ok_or_else(|| bad_offset(r_type, r_offset))?;
            }
            REL_GOT | REL_JUMP_SLOT | REL_SYMBOLIC => {
                if r_sym == 0 {
                    continue;
                }
                let sym = symtab.symbol(r_sym).ok_or_else(|| {
                    relocate_error(format!("symbol index {r_sym} out of range"))
                })?;
                let name = symtab
                    .name_of(sym)
                    .ok_or_else(|| relocate_error(format!("bad name for symbol index {r_sym}")))?;
                let symbol = match pre_find.lookup(name) {
                    Some(addr) => {
                        #[cfg(feature = "log")]
                        log::trace!("binding symbol [{}] to the host table", name);
                        addr as usize
                    }
                    None => {
                        #[cfg(feature = "log")]
                        log::trace!("binding symbol [{}] to the undefined stub", name);
                        host::undefined_symbol as usize
                    }
                };
                // 没有显式加数时取0，此处的镜像字尚未重定位，不能当作加数
                let addend = rel.explicit_addend().unwrap_or(0);
                segments
                    .write_val(r_offset, symbol.wrapping_add_signed(addend))
                    .ok_or_else(|| bad_offset(r_type, r_offset))?;
            }
            _ => {
                return Err(relocate_error(format!(
                    "unsupported relocation type: {} ({})",
                    r_type,
                    rel_type_to_str(r_type)
                )));
            }
        }
    }
    Ok(())
}

#[cold]
fn bad_offset(r_type: u32, r_offset: usize) -> crate::Error {
    relocate_error(format!(
        "relocation {} targets {:#x}, outside the image",
        rel_type_to_str(r_type),
        r_offset
    ))
}
