//! The curated host symbol table standing in for the Bionic runtime.
//!
//! The table is process-wide, immutable, and closed: dispatch goes through
//! a perfect hash over the fixed set of symbol names in [`hash`], and every
//! name maps to a host implementation in [`stubs`]. Anything else resolves
//! to the shared [`undefined_symbol`] stand-in at relocation time.

mod hash;
mod stubs;

use crate::relocation::SymbolLookup;

pub use stubs::{heap_counters, pthread_once_invocations, undefined_symbol};

/// Look up a Bionic symbol name, returning the address of its host
/// stand-in.
#[inline]
pub fn lookup(name: &str) -> Option<*const ()> {
    hash::lookup(name)
}

/// The process-wide host symbol table.
///
/// Implements [`SymbolLookup`] so the relocator can bind against it; hosts
/// with different needs (real threading, instrumented I/O) can pass their
/// own `SymbolLookup` to [`Loader::load_with`](crate::Loader::load_with)
/// instead.
pub struct HostSymbols;

impl SymbolLookup for HostSymbols {
    #[inline]
    fn lookup(&self, name: &str) -> Option<*const ()> {
        hash::lookup(name)
    }
}
