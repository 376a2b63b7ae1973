//! Architectures whose shared objects this loader accepts.
//!
//! Each submodule pins the ELF machine type and the numeric identifiers of
//! the relocation kinds bound at load time. The set is deliberately small:
//! base-relative pointers, data references, eagerly bound function pointers,
//! and the native absolute word.
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use x86_64::*;
    } else if #[cfg(target_arch = "x86")] {
        mod x86;
        pub use x86::*;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use aarch64::*;
    } else if #[cfg(target_arch = "arm")] {
        mod arm;
        pub use arm::*;
    }
}

pub const REL_NONE: u32 = 0;
