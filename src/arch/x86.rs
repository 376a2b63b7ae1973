use elf::abi::EM_386;

pub const EM_ARCH: u16 = EM_386;

// elf::abi does not carry the i386 dynamic relocation numbers
pub const REL_RELATIVE: u32 = 8; // R_386_RELATIVE
pub const REL_GOT: u32 = 6; // R_386_GLOB_DAT
pub const REL_JUMP_SLOT: u32 = 7; // R_386_JMP_SLOT
pub const REL_SYMBOLIC: u32 = 1; // R_386_32

/// Map x86 relocation types to human readable names
pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        0 => "R_386_NONE",
        REL_RELATIVE => "R_386_RELATIVE",
        REL_GOT => "R_386_GLOB_DAT",
        REL_JUMP_SLOT => "R_386_JMP_SLOT",
        REL_SYMBOLIC => "R_386_32",
        _ => "UNKNOWN",
    }
}
