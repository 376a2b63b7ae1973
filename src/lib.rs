//! A loader for Android/Bionic ELF shared libraries.
//!
//! `bionic_loader` maps an Android shared object into the address space of a
//! desktop Linux process of the same instruction-set family, binds every
//! dynamic relocation eagerly against a curated table of Bionic stand-ins,
//! and resolves exported symbols through the object's GNU hash table. The
//! host can then call guest code through ordinary function pointers.
//!
//! No initializers are run, no dependencies are chained, and the guest's
//! threading primitives are inert: the loaded code is expected to be driven
//! single-threaded by the host.
//!
//! # Example
//! ```no_run
//! use bionic_loader::ElfLibrary;
//!
//! let lib = ElfLibrary::from_file("fixtures/libguest.so").unwrap();
//! let add = unsafe { *lib.get::<extern "C" fn(i32, i32) -> i32>("add").unwrap() };
//! assert_eq!(add(2, 3), 5);
//! ```

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "aarch64",
    target_arch = "arm",
)))]
compile_error!("unsupported arch");

#[cfg(not(target_os = "linux"))]
compile_error!("bionic-loader only supports Linux hosts");

pub mod arch;
mod elf;
mod error;
pub mod host;
mod loader;
mod macros;
pub mod mmap;
mod relocation;
mod segment;
mod symbol;

pub use crate::elf::defs::ElfSymbol;
pub use error::{Error, Result};
pub use loader::{ElfLibrary, Loader, Symbol};
pub use relocation::SymbolLookup;
