//! Synthesizes minimal Android-style ET_DYN shared objects in memory so the
//! suite stays hermetic. The layout is fixed: one R+X LOAD covering the
//! headers and code, one R+W LOAD for data, and the dynamic metadata
//! (.dynsym/.dynstr/.gnu.hash and the relocation section) in a non-loaded
//! tail. Machine code is hand-assembled per architecture.
#![allow(dead_code)]

use std::path::PathBuf;

pub const EHDR_SIZE: usize = 64;
pub const PHDR_SIZE: usize = 56;
pub const SHDR_SIZE: usize = 64;

pub const PT_LOAD: u32 = 1;
pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_REL: u32 = 9;
pub const SHT_DYNSYM: u32 = 11;
pub const SHT_GNU_HASH: u32 = 0x6fff_fff6;

pub const ET_DYN: u16 = 3;

/// Code lives in the first page, data in the second.
pub const CODE_BASE: u64 = 0x200;
pub const DATA_BASE: u64 = 0x1000;
pub const DATA_FILESZ: usize = 0x100;
pub const DATA_MEMSZ: u64 = 0x200;
pub const TEXT_FILESZ: u64 = 0x400;

/// Virtual addresses of the relocated words in the canonical fixture.
pub mod slots {
    pub const GOT_MALLOC: u64 = 0x1000;
    pub const GOT_FREE: u64 = 0x1008;
    pub const GOT_SYSPROP: u64 = 0x1010;
    pub const GOT_ONCE: u64 = 0x1018;
    pub const REL_PTR_A: u64 = 0x1020;
    pub const REL_PTR_B: u64 = 0x1028;
    pub const GOT_UNKNOWN: u64 = 0x1030;
    pub const SN_NAME: u64 = 0x1038;
    pub const ABS_GETTIMEOFDAY: u64 = 0x1048;
}

#[cfg(target_arch = "x86_64")]
pub const EM_HOST: u16 = 62;
#[cfg(target_arch = "aarch64")]
pub const EM_HOST: u16 = 183;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const EM_HOST: u16 = 0;

#[cfg(target_arch = "x86_64")]
pub mod rel {
    pub const RELATIVE: u32 = 8;
    pub const GLOB_DAT: u32 = 6;
    pub const JUMP_SLOT: u32 = 7;
    pub const ABS: u32 = 1;
}
#[cfg(target_arch = "aarch64")]
pub mod rel {
    pub const RELATIVE: u32 = 1027;
    pub const GLOB_DAT: u32 = 1025;
    pub const JUMP_SLOT: u32 = 1026;
    pub const ABS: u32 = 257;
}
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub mod rel {
    pub const RELATIVE: u32 = 0;
    pub const GLOB_DAT: u32 = 0;
    pub const JUMP_SLOT: u32 = 0;
    pub const ABS: u32 = 0;
}

pub struct ExportSym {
    pub name: &'static str,
    pub vaddr: u64,
    pub size: u64,
    pub func: bool,
}

#[derive(Clone, Copy)]
pub enum RelocSym {
    None,
    Named(&'static str),
}

pub struct Reloc {
    pub offset: u64,
    pub rtype: u32,
    pub sym: RelocSym,
    pub addend: i64,
}

impl Reloc {
    pub fn relative(offset: u64, addend: i64) -> Self {
        Reloc {
            offset,
            rtype: rel::RELATIVE,
            sym: RelocSym::None,
            addend,
        }
    }

    pub fn named(offset: u64, rtype: u32, name: &'static str) -> Self {
        Reloc {
            offset,
            rtype,
            sym: RelocSym::Named(name),
            addend: 0,
        }
    }
}

pub struct DylibBuilder {
    pub machine: u16,
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub imports: Vec<&'static str>,
    pub exports: Vec<ExportSym>,
    pub relocs: Vec<Reloc>,
    /// Emit a SHT_REL section (implicit addends) instead of SHT_RELA.
    pub use_rel: bool,
    /// Place the data segment on top of the text segment.
    pub overlap_loads: bool,
}

impl DylibBuilder {
    pub fn new() -> Self {
        DylibBuilder {
            machine: EM_HOST,
            code: Vec::new(),
            data: vec![0; DATA_FILESZ],
            imports: Vec::new(),
            exports: Vec::new(),
            relocs: Vec::new(),
            use_rel: false,
            overlap_loads: false,
        }
    }

    pub fn data_word(&mut self, vaddr: u64, value: u64) -> &mut Self {
        let off = (vaddr - DATA_BASE) as usize;
        self.data[off..off + 8].copy_from_slice(&value.to_ne_bytes());
        self
    }

    pub fn data_bytes(&mut self, vaddr: u64, bytes: &[u8]) -> &mut Self {
        let off = (vaddr - DATA_BASE) as usize;
        self.data[off..off + bytes.len()].copy_from_slice(bytes);
        self
    }

    fn dynsym_index(&self, name: &str) -> u64 {
        if let Some(pos) = self.imports.iter().position(|n| *n == name) {
            return 1 + pos as u64;
        }
        if let Some(pos) = self.exports.iter().position(|e| e.name == name) {
            return 1 + self.imports.len() as u64 + pos as u64;
        }
        panic!("fixture references unknown symbol {name:?}");
    }

    pub fn build(&self) -> Vec<u8> {
        assert!(self.code.len() <= 0x200, "code does not fit the text page");
        assert_eq!(self.data.len(), DATA_FILESZ);

        // ---- loaded part ----
        let mut image = vec![0u8; 0x1000 + DATA_FILESZ];
        image[0x200..0x200 + self.code.len()].copy_from_slice(&self.code);
        image[0x1000..0x1000 + DATA_FILESZ].copy_from_slice(&self.data);

        // ---- .dynstr ----
        let mut dynstr = vec![0u8];
        let mut name_offsets = Vec::new();
        for name in self
            .imports
            .iter()
            .copied()
            .chain(self.exports.iter().map(|e| e.name))
        {
            name_offsets.push(dynstr.len() as u32);
            dynstr.extend_from_slice(name.as_bytes());
            dynstr.push(0);
        }

        // ---- .dynsym: null, imports (UNDEF), exports ----
        let mut dynsym = Vec::new();
        push_sym(&mut dynsym, 0, 0, 0, 0, 0);
        for (i, _) in self.imports.iter().enumerate() {
            push_sym(&mut dynsym, name_offsets[i], 0x12, 0, 0, 0);
        }
        for (i, export) in self.exports.iter().enumerate() {
            let info = if export.func { 0x12 } else { 0x11 };
            push_sym(
                &mut dynsym,
                name_offsets[self.imports.len() + i],
                info,
                1,
                export.vaddr,
                export.size,
            );
        }

        // ---- .gnu.hash: one bucket, all-ones bloom word ----
        let symbias = 1 + self.imports.len() as u32;
        let mut gnu_hash = Vec::new();
        gnu_hash.extend_from_slice(&1u32.to_ne_bytes()); // nbucket
        gnu_hash.extend_from_slice(&symbias.to_ne_bytes());
        gnu_hash.extend_from_slice(&1u32.to_ne_bytes()); // nbloom
        gnu_hash.extend_from_slice(&6u32.to_ne_bytes()); // nshift
        gnu_hash.extend_from_slice(&u64::MAX.to_ne_bytes());
        let bucket0 = if self.exports.is_empty() { 0 } else { symbias };
        gnu_hash.extend_from_slice(&bucket0.to_ne_bytes());
        for (i, export) in self.exports.iter().enumerate() {
            let mut h = gnu_hash_of(export.name) & !1;
            if i == self.exports.len() - 1 {
                h |= 1;
            }
            gnu_hash.extend_from_slice(&h.to_ne_bytes());
        }

        // ---- relocation entries ----
        let mut reltab = Vec::new();
        for reloc in &self.relocs {
            let sym_idx = match reloc.sym {
                RelocSym::None => 0,
                RelocSym::Named(name) => self.dynsym_index(name),
            };
            reltab.extend_from_slice(&reloc.offset.to_ne_bytes());
            reltab.extend_from_slice(&((sym_idx << 32) | reloc.rtype as u64).to_ne_bytes());
            if !self.use_rel {
                reltab.extend_from_slice(&reloc.addend.to_ne_bytes());
            }
        }

        // ---- .shstrtab ----
        let section_names = [
            "",
            ".dynsym",
            ".dynstr",
            ".gnu.hash",
            if self.use_rel { ".rel.dyn" } else { ".rela.dyn" },
            ".shstrtab",
        ];
        let mut shstrtab = Vec::new();
        let mut shname_offsets = Vec::new();
        for name in section_names {
            shname_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(name.as_bytes());
            shstrtab.push(0);
        }

        // ---- non-loaded tail ----
        let dynstr_off = append_aligned(&mut image, &dynstr, 8);
        let dynsym_off = append_aligned(&mut image, &dynsym, 8);
        let gnu_hash_off = append_aligned(&mut image, &gnu_hash, 8);
        let reltab_off = append_aligned(&mut image, &reltab, 8);
        let shstrtab_off = append_aligned(&mut image, &shstrtab, 8);

        // ---- section header table ----
        let mut shdrs = Vec::new();
        push_shdr(&mut shdrs, 0, 0, 0, 0, 0, 0, 0, 0); // SHN_UNDEF
        push_shdr(
            &mut shdrs,
            shname_offsets[1],
            SHT_DYNSYM,
            dynsym_off,
            dynsym.len(),
            2,
            8,
            24,
            0,
        );
        push_shdr(
            &mut shdrs,
            shname_offsets[2],
            SHT_STRTAB,
            dynstr_off,
            dynstr.len(),
            0,
            1,
            0,
            0,
        );
        push_shdr(
            &mut shdrs,
            shname_offsets[3],
            SHT_GNU_HASH,
            gnu_hash_off,
            gnu_hash.len(),
            1,
            8,
            0,
            0,
        );
        let (rel_type, rel_entsize) = if self.use_rel {
            (SHT_REL, 16)
        } else {
            (SHT_RELA, 24)
        };
        push_shdr(
            &mut shdrs,
            shname_offsets[4],
            rel_type,
            reltab_off,
            reltab.len(),
            1,
            8,
            rel_entsize,
            0,
        );
        push_shdr(
            &mut shdrs,
            shname_offsets[5],
            SHT_STRTAB,
            shstrtab_off,
            shstrtab.len(),
            0,
            1,
            0,
            0,
        );
        let shoff = append_aligned(&mut image, &shdrs, 8);

        // ---- program headers ----
        let data_vaddr = if self.overlap_loads { 0x200 } else { DATA_BASE };
        let mut phdrs = Vec::new();
        push_phdr(&mut phdrs, PF_R | PF_X, 0, 0, TEXT_FILESZ, TEXT_FILESZ);
        push_phdr(
            &mut phdrs,
            PF_R | PF_W,
            0x1000,
            data_vaddr,
            DATA_FILESZ as u64,
            DATA_MEMSZ,
        );
        image[0x40..0x40 + phdrs.len()].copy_from_slice(&phdrs);

        // ---- ELF header ----
        let mut ehdr = Vec::new();
        ehdr.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
        ehdr.extend_from_slice(&[0u8; 8]);
        ehdr.extend_from_slice(&ET_DYN.to_ne_bytes());
        ehdr.extend_from_slice(&self.machine.to_ne_bytes());
        ehdr.extend_from_slice(&1u32.to_ne_bytes()); // e_version
        ehdr.extend_from_slice(&0u64.to_ne_bytes()); // e_entry
        ehdr.extend_from_slice(&0x40u64.to_ne_bytes()); // e_phoff
        ehdr.extend_from_slice(&(shoff as u64).to_ne_bytes());
        ehdr.extend_from_slice(&0u32.to_ne_bytes()); // e_flags
        ehdr.extend_from_slice(&(EHDR_SIZE as u16).to_ne_bytes());
        ehdr.extend_from_slice(&(PHDR_SIZE as u16).to_ne_bytes());
        ehdr.extend_from_slice(&2u16.to_ne_bytes()); // e_phnum
        ehdr.extend_from_slice(&(SHDR_SIZE as u16).to_ne_bytes());
        ehdr.extend_from_slice(&6u16.to_ne_bytes()); // e_shnum
        ehdr.extend_from_slice(&5u16.to_ne_bytes()); // e_shstrndx
        assert_eq!(ehdr.len(), EHDR_SIZE);
        image[..EHDR_SIZE].copy_from_slice(&ehdr);

        image
    }

    /// Write the object to a unique temp path and return it.
    pub fn write_to_temp(&self, tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "bionic_fixture_{tag}_{}.so",
            std::process::id()
        ));
        std::fs::write(&path, self.build()).expect("failed to write fixture");
        path
    }
}

fn push_sym(out: &mut Vec<u8>, st_name: u32, st_info: u8, st_shndx: u16, vaddr: u64, size: u64) {
    out.extend_from_slice(&st_name.to_ne_bytes());
    out.push(st_info);
    out.push(0); // st_other
    out.extend_from_slice(&st_shndx.to_ne_bytes());
    out.extend_from_slice(&vaddr.to_ne_bytes());
    out.extend_from_slice(&size.to_ne_bytes());
}

#[allow(clippy::too_many_arguments)]
fn push_shdr(
    out: &mut Vec<u8>,
    sh_name: u32,
    sh_type: u32,
    offset: usize,
    size: usize,
    link: u32,
    addralign: u64,
    entsize: u64,
    flags: u64,
) {
    out.extend_from_slice(&sh_name.to_ne_bytes());
    out.extend_from_slice(&sh_type.to_ne_bytes());
    out.extend_from_slice(&flags.to_ne_bytes());
    out.extend_from_slice(&0u64.to_ne_bytes()); // sh_addr
    out.extend_from_slice(&(offset as u64).to_ne_bytes());
    out.extend_from_slice(&(size as u64).to_ne_bytes());
    out.extend_from_slice(&link.to_ne_bytes());
    out.extend_from_slice(&0u32.to_ne_bytes()); // sh_info
    out.extend_from_slice(&addralign.to_ne_bytes());
    out.extend_from_slice(&entsize.to_ne_bytes());
}

fn push_phdr(out: &mut Vec<u8>, flags: u32, offset: u64, vaddr: u64, filesz: u64, memsz: u64) {
    out.extend_from_slice(&PT_LOAD.to_ne_bytes());
    out.extend_from_slice(&flags.to_ne_bytes());
    out.extend_from_slice(&offset.to_ne_bytes());
    out.extend_from_slice(&vaddr.to_ne_bytes());
    out.extend_from_slice(&vaddr.to_ne_bytes()); // p_paddr
    out.extend_from_slice(&filesz.to_ne_bytes());
    out.extend_from_slice(&memsz.to_ne_bytes());
    out.extend_from_slice(&0x1000u64.to_ne_bytes()); // p_align
}

fn append_aligned(image: &mut Vec<u8>, bytes: &[u8], align: usize) -> usize {
    while image.len() % align != 0 {
        image.push(0);
    }
    let off = image.len();
    image.extend_from_slice(bytes);
    off
}

pub fn gnu_hash_of(name: &str) -> u32 {
    let mut hash = 5381u32;
    for byte in name.as_bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u32::from(*byte));
    }
    hash
}

/// The canonical fixture: exported entry points in the text page, GOT-style
/// slots, base-relative pointers, and one reference to a symbol the host
/// does not provide.
pub fn sample_library() -> DylibBuilder {
    let mut builder = DylibBuilder::new();
    builder.code = host_code();
    builder.imports = vec![
        "malloc",
        "free",
        "__system_property_get",
        "pthread_once",
        "gettimeofday",
        "this_symbol_is_not_provided",
    ];
    builder.exports = vec![
        ExportSym {
            name: "add",
            vaddr: 0x200,
            size: 0x10,
            func: true,
        },
        ExportSym {
            name: "alloc_and_free",
            vaddr: 0x210,
            size: 0x30,
            func: true,
        },
        ExportSym {
            name: "get_sn",
            vaddr: 0x240,
            size: 0x20,
            func: true,
        },
        ExportSym {
            name: "call_once",
            vaddr: 0x260,
            size: 0x10,
            func: true,
        },
        ExportSym {
            name: "guest_data",
            vaddr: 0x1020,
            size: 0x10,
            func: false,
        },
    ];
    builder.relocs = vec![
        Reloc::named(slots::GOT_MALLOC, rel::GLOB_DAT, "malloc"),
        Reloc::named(slots::GOT_FREE, rel::JUMP_SLOT, "free"),
        Reloc::named(slots::GOT_SYSPROP, rel::JUMP_SLOT, "__system_property_get"),
        Reloc::named(slots::GOT_ONCE, rel::JUMP_SLOT, "pthread_once"),
        Reloc::relative(slots::REL_PTR_A, 0x200),
        Reloc::relative(slots::REL_PTR_B, 0x1020),
        Reloc::named(slots::GOT_UNKNOWN, rel::GLOB_DAT, "this_symbol_is_not_provided"),
        Reloc::named(slots::ABS_GETTIMEOFDAY, rel::ABS, "gettimeofday"),
    ];
    builder.data_bytes(slots::SN_NAME, b"ro.serialno\0");
    builder
}

/// Relocated word vaddrs of the canonical fixture, with the host symbol
/// each is expected to be bound to (`None` for RELATIVE slots).
pub fn sample_relocated_slots() -> Vec<(u64, Option<&'static str>)> {
    vec![
        (slots::GOT_MALLOC, Some("malloc")),
        (slots::GOT_FREE, Some("free")),
        (slots::GOT_SYSPROP, Some("__system_property_get")),
        (slots::GOT_ONCE, Some("pthread_once")),
        (slots::REL_PTR_A, None),
        (slots::REL_PTR_B, None),
        (slots::GOT_UNKNOWN, None),
        (slots::ABS_GETTIMEOFDAY, Some("gettimeofday")),
    ]
}

/// Read the image word at `vaddr` of a loaded library.
pub fn image_word(lib: &bionic_loader::ElfLibrary, vaddr: u64) -> usize {
    unsafe { *((lib.base() + vaddr as usize) as *const usize) }
}

/// Borrow an image byte range of a loaded library.
pub fn image_bytes(lib: &bionic_loader::ElfLibrary, vaddr: u64, len: usize) -> &[u8] {
    unsafe { core::slice::from_raw_parts((lib.base() + vaddr as usize) as *const u8, len) }
}

#[cfg(target_arch = "x86_64")]
fn host_code() -> Vec<u8> {
    let mut code = vec![0u8; 0x100];
    // 0x200 add: lea eax, [rdi + rsi]; ret
    code[0x00..0x04].copy_from_slice(&[0x8d, 0x04, 0x37, 0xc3]);
    // 0x210 alloc_and_free: malloc(n) through the GOT, free it, return 1
    code[0x10..0x14].copy_from_slice(&[0x48, 0x83, 0xec, 0x08]); // sub rsp, 8
    code[0x14..0x16].copy_from_slice(&[0xff, 0x15]); // call [rip+disp]
    code[0x16..0x1a].copy_from_slice(&disp32(0x21a, slots::GOT_MALLOC));
    code[0x1a..0x1d].copy_from_slice(&[0x48, 0x89, 0xc7]); // mov rdi, rax
    code[0x1d..0x1f].copy_from_slice(&[0xff, 0x15]); // call [rip+disp]
    code[0x1f..0x23].copy_from_slice(&disp32(0x223, slots::GOT_FREE));
    code[0x23..0x28].copy_from_slice(&[0xb8, 0x01, 0x00, 0x00, 0x00]); // mov eax, 1
    code[0x28..0x2c].copy_from_slice(&[0x48, 0x83, 0xc4, 0x08]); // add rsp, 8
    code[0x2c] = 0xc3; // ret
    // 0x240 get_sn: __system_property_get("ro.serialno", buf)
    code[0x40..0x43].copy_from_slice(&[0x48, 0x89, 0xfe]); // mov rsi, rdi
    code[0x43..0x46].copy_from_slice(&[0x48, 0x8d, 0x3d]); // lea rdi, [rip+disp]
    code[0x46..0x4a].copy_from_slice(&disp32(0x24a, slots::SN_NAME));
    code[0x4a..0x4c].copy_from_slice(&[0xff, 0x25]); // jmp [rip+disp]
    code[0x4c..0x50].copy_from_slice(&disp32(0x250, slots::GOT_SYSPROP));
    // 0x260 call_once: tail call through the GOT
    code[0x60..0x62].copy_from_slice(&[0xff, 0x25]); // jmp [rip+disp]
    code[0x62..0x66].copy_from_slice(&disp32(0x266, slots::GOT_ONCE));
    code
}

#[cfg(target_arch = "x86_64")]
fn disp32(next_ip: u64, target: u64) -> [u8; 4] {
    ((target as i64 - next_ip as i64) as i32).to_ne_bytes()
}

#[cfg(target_arch = "aarch64")]
fn host_code() -> Vec<u8> {
    let mut code = vec![0u8; 0x100];
    let mut emit = |off: usize, words: &[u32]| {
        for (i, word) in words.iter().enumerate() {
            code[off + i * 4..off + i * 4 + 4].copy_from_slice(&word.to_ne_bytes());
        }
    };
    // 0x200 add: add w0, w0, w1; ret
    emit(0x00, &[0x0b01_0000, 0xd65f_03c0]);
    // 0x210 alloc_and_free: malloc(n) through the GOT, free it, return 1
    emit(
        0x10,
        &[
            0xa9bf_7bfd, // stp x29, x30, [sp, #-16]!
            0xb000_0010, // adrp x16, +0x1000
            0xf940_0211, // ldr x17, [x16]        (GOT_MALLOC)
            0xd63f_0220, // blr x17
            0xb000_0010, // adrp x16, +0x1000
            0xf940_0611, // ldr x17, [x16, #8]    (GOT_FREE)
            0xd63f_0220, // blr x17
            0x5280_0020, // mov w0, #1
            0xa8c1_7bfd, // ldp x29, x30, [sp], #16
            0xd65f_03c0, // ret
        ],
    );
    // 0x240 get_sn: __system_property_get("ro.serialno", buf)
    emit(
        0x40,
        &[
            0xaa00_03e1, // mov x1, x0
            0xb000_0000, // adrp x0, +0x1000
            0x9100_e000, // add x0, x0, #0x38    (SN_NAME)
            0xb000_0010, // adrp x16, +0x1000
            0xf940_0a11, // ldr x17, [x16, #16]  (GOT_SYSPROP)
            0xd61f_0220, // br x17
        ],
    );
    // 0x260 call_once: tail call through the GOT
    emit(
        0x60,
        &[
            0xb000_0010, // adrp x16, +0x1000
            0xf940_0e11, // ldr x17, [x16, #24]  (GOT_ONCE)
            0xd61f_0220, // br x17
        ],
    );
    code
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn host_code() -> Vec<u8> {
    panic!("fixture code generation is only implemented for x86_64 and aarch64");
}
