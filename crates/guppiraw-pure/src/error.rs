/// All errors that can occur while decoding headers or reading blocks.
#[derive(Debug)]
pub enum Error {
    /// A required keyword was absent from the header (or carried a zero
    /// / sentinel value, which the format treats the same way).
    MissingKeyword(&'static str),
    /// The header region ended without an END record.
    UnterminatedHeader,
    /// NBITS value other than 8; only 8-bit samples are handled.
    UnsupportedNbits(u32),
    /// OBSNCHAN is not divisible by NANTS.
    ChannelCount { obsnchan: u32, nants: u32 },
    /// BLOCSIZE is not a whole number of timesteps.
    BlockSize {
        blocsize: u64,
        bytes_per_timestep: u64,
    },
    /// Malformed header content.
    InvalidHeader(&'static str),
    /// A data segment ended before the expected byte count.
    TruncatedBlock { expected: u64, actual: u64 },
    /// The current block's data has already been read.
    BlockConsumed,
    /// An I/O error from the standard library.
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::MissingKeyword(kw) => write!(f, "{kw} not found in header"),
            Error::UnterminatedHeader => write!(f, "no END record found in header"),
            Error::UnsupportedNbits(n) => {
                write!(f, "unsupported NBITS value: {n} (only 8-bit samples are handled)")
            }
            Error::ChannelCount { obsnchan, nants } => {
                write!(f, "bad OBSNCHAN/NANTS: {obsnchan} % {nants} != 0")
            }
            Error::BlockSize {
                blocsize,
                bytes_per_timestep,
            } => write!(
                f,
                "invalid block dimensions: BLOCSIZE {blocsize} is not divisible by {bytes_per_timestep}"
            ),
            Error::InvalidHeader(msg) => write!(f, "invalid header: {msg}"),
            Error::TruncatedBlock { expected, actual } => write!(
                f,
                "incomplete block at end of file ({actual} of {expected} bytes)"
            ),
            Error::BlockConsumed => {
                write!(f, "data for this block has already been read")
            }
            #[cfg(feature = "std")]
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
