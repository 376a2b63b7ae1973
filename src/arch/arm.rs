use elf::abi::*;

pub const EM_ARCH: u16 = EM_ARM;

pub const REL_RELATIVE: u32 = R_ARM_RELATIVE;
pub const REL_GOT: u32 = R_ARM_GLOB_DAT;
pub const REL_JUMP_SLOT: u32 = R_ARM_JUMP_SLOT;
pub const REL_SYMBOLIC: u32 = R_ARM_ABS32;

/// Map arm relocation types to human readable names
pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        0 => "R_ARM_NONE",
        R_ARM_RELATIVE => "R_ARM_RELATIVE",
        R_ARM_GLOB_DAT => "R_ARM_GLOB_DAT",
        R_ARM_JUMP_SLOT => "R_ARM_JUMP_SLOT",
        R_ARM_ABS32 => "R_ARM_ABS32",
        _ => "UNKNOWN",
    }
}
