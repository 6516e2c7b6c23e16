#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod header;
#[cfg(feature = "std")]
pub mod io;
#[cfg(feature = "std")]
pub mod reader;
pub mod record;
pub mod value;

pub use error::{Error, Result};
pub use header::{Header, HeaderBuffer};
#[cfg(feature = "std")]
pub use reader::{BandReadTask, Reader};
pub use record::{DIRECTIO_ALIGN, MAX_HEADER_SIZE, RECORD_SIZE};
