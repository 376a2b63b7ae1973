use elf::abi::*;

pub const EM_ARCH: u16 = EM_AARCH64;

pub const REL_RELATIVE: u32 = R_AARCH64_RELATIVE;
pub const REL_GOT: u32 = R_AARCH64_GLOB_DAT;
pub const REL_JUMP_SLOT: u32 = R_AARCH64_JUMP_SLOT;
pub const REL_SYMBOLIC: u32 = R_AARCH64_ABS64;

/// Map aarch64 relocation types to human readable names
pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        0 => "R_AARCH64_NONE",
        R_AARCH64_RELATIVE => "R_AARCH64_RELATIVE",
        R_AARCH64_GLOB_DAT => "R_AARCH64_GLOB_DAT",
        R_AARCH64_JUMP_SLOT => "R_AARCH64_JUMP_SLOT",
        R_AARCH64_ABS64 => "R_AARCH64_ABS64",
        _ => "UNKNOWN",
    }
}
