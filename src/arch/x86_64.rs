use elf::abi::*;

pub const EM_ARCH: u16 = EM_X86_64;

pub const REL_RELATIVE: u32 = R_X86_64_RELATIVE;
pub const REL_GOT: u32 = R_X86_64_GLOB_DAT;
pub const REL_JUMP_SLOT: u32 = R_X86_64_JUMP_SLOT;
pub const REL_SYMBOLIC: u32 = R_X86_64_64;

/// Map x86_64 relocation types to human readable names
pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        0 => "R_X86_64_NONE",
        R_X86_64_RELATIVE => "R_X86_64_RELATIVE",
        R_X86_64_GLOB_DAT => "R_X86_64_GLOB_DAT",
        R_X86_64_JUMP_SLOT => "R_X86_64_JUMP_SLOT",
        R_X86_64_64 => "R_X86_64_64",
        _ => "UNKNOWN",
    }
}
