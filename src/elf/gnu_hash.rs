//! GNU hash table over the exported dynamic symbols.

use crate::{
    elf::{ElfSymbol, SectionInfo, view::ElfView},
    symbol::SymbolTable,
};

#[repr(C)]
struct GnuHashHeader {
    nbucket: u32,
    symbias: u32,
    nbloom: u32,
    nshift: u32,
}

/// Bloom filter, bucket, and chain slices, all borrowed from the file view.
pub(crate) struct GnuHashView<'v> {
    nbucket: u32,
    symbias: u32,
    nshift: u32,
    blooms: &'v [usize],
    buckets: &'v [u32],
    chains: &'v [u32],
}

impl<'v> GnuHashView<'v> {
    /// Slice the table out of the `.gnu.hash` section content.
    pub(crate) fn parse(view: &'v ElfView, section: &SectionInfo) -> Option<GnuHashView<'v>> {
        const HEADER_SIZE: usize = size_of::<GnuHashHeader>();
        let header = view.identify::<GnuHashHeader>(section.offset)?;
        if header.nbucket == 0 {
            return None;
        }
        let bloom_off = section.offset.checked_add(HEADER_SIZE)?;
        let blooms = view.identify_array::<usize>(bloom_off, header.nbloom as usize)?;
        let bucket_off = bloom_off + header.nbloom as usize * size_of::<usize>();
        let buckets = view.identify_array::<u32>(bucket_off, header.nbucket as usize)?;
        let chain_off = bucket_off + header.nbucket as usize * size_of::<u32>();
        let chain_len = section
            .offset
            .checked_add(section.size)?
            .checked_sub(chain_off)?
            / size_of::<u32>();
        let chains = view.identify_array::<u32>(chain_off, chain_len)?;
        Some(GnuHashView {
            nbucket: header.nbucket,
            symbias: header.symbias,
            nshift: header.nshift,
            blooms,
            buckets,
            chains,
        })
    }

    /// dl_new_hash: h = h * 33 + c, 32-bit wrap-around.
    #[inline]
    pub(crate) fn hash(name: &[u8]) -> u32 {
        let mut hash = 5381u32;
        for byte in name {
            hash = hash.wrapping_mul(33).wrapping_add(u32::from(*byte));
        }
        hash
    }

    /// Find an exported symbol by name.
    ///
    /// The bloom filter is only used as a fast negative; whenever it reports
    /// possible presence the chain is walked and names are compared.
    pub(crate) fn lookup<'sym>(
        &self,
        table: &SymbolTable<'sym>,
        name: &str,
    ) -> Option<&'sym ElfSymbol> {
        let hash = Self::hash(name.as_bytes());
        let word_bits = usize::BITS;
        if !self.blooms.is_empty() {
            let filter = self.blooms[(hash / word_bits) as usize % self.blooms.len()];
            let mask = (1usize << (hash % word_bits)) | (1usize << ((hash >> self.nshift) % word_bits));
            if filter & mask != mask {
                return None;
            }
        }
        let bucket = self.buckets[hash as usize % self.nbucket as usize];
        if bucket < self.symbias {
            return None;
        }
        let mut dynsym_idx = bucket as usize;
        loop {
            let chain_hash = *self.chains.get(dynsym_idx - self.symbias as usize)?;
            if (chain_hash ^ hash) & !1 == 0 {
                let sym = table.symbol(dynsym_idx)?;
                if table.name_of(sym) == Some(name) {
                    return Some(sym);
                }
            }
            if chain_hash & 1 != 0 {
                break;
            }
            dynsym_idx += 1;
        }
        None
    }
}
