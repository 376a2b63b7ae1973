use core::fmt::Display;
use std::borrow::Cow;

/// Error types used throughout the `bionic_loader` library.
/// These errors represent the failure conditions that can occur while a
/// library is opened, mapped, relocated, or queried for symbols.
#[derive(Debug)]
pub enum Error {
    /// An error occurred while opening or reading the shared object file.
    Io {
        /// A descriptive message about the I/O error.
        msg: Cow<'static, str>,
    },

    /// An error occurred during memory mapping operations.
    ///
    /// This covers failures to map the file, to allocate the image region,
    /// and to change page protections.
    Mmap {
        /// A descriptive message about the memory mapping error.
        msg: Cow<'static, str>,
    },

    /// The ELF header is malformed or describes a file this loader cannot
    /// handle (wrong magic, class, encoding, machine, or file type).
    ParseEhdr {
        /// A descriptive message about the ELF header parsing error.
        msg: Cow<'static, str>,
    },

    /// The program header table is malformed.
    ///
    /// Raised for missing or overlapping LOAD segments and for segments
    /// whose file ranges fall outside the mapped file.
    ParsePhdr {
        /// A descriptive message about the program header parsing error.
        msg: Cow<'static, str>,
    },

    /// The section header table is missing a required section or describes
    /// sections with inconsistent sizes.
    ParseShdr {
        /// A descriptive message about the section header parsing error.
        msg: Cow<'static, str>,
    },

    /// A dynamic relocation could not be applied.
    ///
    /// Raised for relocation types outside the accepted set and for entries
    /// whose target falls outside the image. The message includes the
    /// offending relocation type or symbol.
    Relocation {
        /// A descriptive message about the relocation error.
        msg: Cow<'static, str>,
    },

    /// A symbol was not found in the library's GNU hash table.
    FindSymbol {
        /// A descriptive message naming the missing symbol.
        msg: Cow<'static, str>,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Io { msg } => write!(f, "I/O error: {msg}"),
            Error::Mmap { msg } => write!(f, "Memory mapping error: {msg}"),
            Error::ParseEhdr { msg } => write!(f, "ELF header parsing error: {msg}"),
            Error::ParsePhdr { msg } => write!(f, "Program header parsing error: {msg}"),
            Error::ParseShdr { msg } => write!(f, "Section header parsing error: {msg}"),
            Error::Relocation { msg } => write!(f, "Relocation error: {msg}"),
            Error::FindSymbol { msg } => write!(f, "Symbol lookup error: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<std::io::Error> for Error {
    #[cold]
    fn from(value: std::io::Error) -> Self {
        Error::Io {
            msg: value.to_string().into(),
        }
    }
}

#[cold]
#[inline(never)]
#[allow(unused)]
pub(crate) fn io_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Io { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn map_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Mmap { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn parse_ehdr_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::ParseEhdr { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn parse_phdr_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::ParsePhdr { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn parse_shdr_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::ParseShdr { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn relocate_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Relocation { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn find_symbol_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::FindSymbol { msg: msg.into() }
}

pub type Result<T> = core::result::Result<T, Error>;
