//! Sequential and banded access to raw voltage recordings.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::header::{Header, HeaderBuffer};
use crate::io::{read_at_fully, read_fully};
use crate::record::RECORD_SIZE;

/// Block-by-block reader over one raw recording.
///
/// Sequential access (`read_header`/`read_data`) walks the file and
/// records the first failure in a sticky error slot; once set, further
/// sequential calls return without touching the file, and callers poll
/// [`error`](Self::error)/[`error_message`](Self::error_message). Band
/// access (`read_band`/`read_band_async`) is positional and independent
/// of both the sequential cursor and its error state.
#[derive(Debug)]
pub struct Reader {
    file: Arc<File>,
    path: PathBuf,
    /// Absolute offset the next sequential operation starts from.
    pos: u64,
    buffer: HeaderBuffer,
    headers_read: u64,
    current_block_size: u64,
    current_block_offset: u64,
    pktidx: i64,
    err: Option<String>,
}

impl Reader {
    /// Open a recording for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Reader> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        debug!("opened {}", path.display());
        Ok(Reader {
            file: Arc::new(file),
            path,
            pos: 0,
            buffer: HeaderBuffer::new(),
            headers_read: 0,
            current_block_size: 0,
            current_block_offset: 0,
            pktidx: 0,
            err: None,
        })
    }

    /// Read and decode the next block header.
    ///
    /// Returns `None` both at clean end of file and on error; the two are
    /// distinguished by [`error`](Self::error). On success the returned
    /// header carries `missing_blocks` and `data_offset`, and the cursor
    /// sits at the start of the block's data segment whether or not the
    /// previous block's data was ever read.
    pub fn read_header(&mut self) -> Option<Header> {
        if self.err.is_some() {
            return None;
        }
        match self.next_header() {
            Ok(found) => found,
            Err(e) => {
                self.record_error(format!(
                    "error reading block header #{} from {}: {e}",
                    self.headers_read + 1,
                    self.path.display(),
                ));
                None
            }
        }
    }

    fn next_header(&mut self) -> Result<Option<Header>> {
        let remaining = self.current_block_size - self.current_block_offset;
        if remaining > 0 {
            trace!(
                "skipping {remaining} unread bytes of block #{}",
                self.headers_read
            );
        }
        let header_start = self.pos + remaining;

        let mut file = &*self.file;
        file.seek(SeekFrom::Start(header_start))?;
        let n = read_fully(&mut file, self.buffer.as_bytes_mut())?;
        if n < RECORD_SIZE {
            // Not even one whole record left: clean end of file.
            return Ok(None);
        }

        let mut header = Header::decode(&self.buffer.as_bytes()[..n])?;

        header.missing_blocks = if self.headers_read > 0 {
            header.pktidx - self.pktidx - 1
        } else {
            0
        };
        if header.missing_blocks > 0 {
            warn!(
                "pktidx jumped from {} to {}: {} missing blocks",
                self.pktidx, header.pktidx, header.missing_blocks
            );
        }

        let data_start = header_start + header.padded_size() as u64;
        header.data_offset = data_start;
        file.seek(SeekFrom::Start(data_start))?;

        debug!(
            "block header #{}: pktidx={} blocsize={} ({} antennas, {} channels, {} timesteps)",
            self.headers_read + 1,
            header.pktidx,
            header.blocsize,
            header.nants,
            header.num_channels,
            header.num_timesteps
        );

        self.pos = data_start;
        self.current_block_size = header.blocsize;
        self.current_block_offset = 0;
        self.pktidx = header.pktidx;
        self.headers_read += 1;
        Ok(Some(header))
    }

    /// Read the current block's data segment into `buffer`.
    ///
    /// Returns `false` and enters the sticky error state if the block was
    /// already consumed, the read fails, or the file ends before
    /// `blocsize` bytes. The double-consume case performs no I/O, so the
    /// file position does not move.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is shorter than the current block.
    pub fn read_data(&mut self, buffer: &mut [u8]) -> bool {
        if self.err.is_some() {
            return false;
        }
        match self.fill_block(buffer) {
            Ok(()) => true,
            Err(e) => {
                self.record_error(e.to_string());
                false
            }
        }
    }

    fn fill_block(&mut self, buffer: &mut [u8]) -> Result<()> {
        if self.current_block_offset != 0 {
            return Err(Error::BlockConsumed);
        }
        let size = usize::try_from(self.current_block_size)
            .map_err(|_| Error::InvalidHeader("block size exceeds address space"))?;
        assert!(
            buffer.len() >= size,
            "destination buffer holds {} bytes, block needs {size}",
            buffer.len()
        );

        let mut file = &*self.file;
        file.seek(SeekFrom::Start(self.pos))?;
        let n = read_fully(&mut file, &mut buffer[..size])?;
        self.pos += n as u64;
        self.current_block_offset += n as u64;
        if n < size {
            return Err(Error::TruncatedBlock {
                expected: size as u64,
                actual: n as u64,
            });
        }
        Ok(())
    }

    /// Returns `true` once any sequential operation has failed.
    pub fn error(&self) -> bool {
        self.err.is_some()
    }

    /// The first recorded error message, or `""` when none.
    pub fn error_message(&self) -> &str {
        self.err.as_deref().unwrap_or("")
    }

    fn record_error(&mut self, message: String) {
        // First error wins; later failures never overwrite it.
        if self.err.is_none() {
            warn!("{message}");
            self.err = Some(message);
        }
    }

    /// Number of headers successfully read so far.
    pub fn headers_read(&self) -> u64 {
        self.headers_read
    }

    fn band_layout(header: &Header, band: usize, num_bands: usize) -> (usize, usize) {
        assert!(num_bands > 0, "num_bands must be positive");
        assert!(
            header.num_channels as usize % num_bands == 0,
            "{} channels do not split into {num_bands} bands",
            header.num_channels
        );
        assert!(
            band < num_bands,
            "band {band} out of range for {num_bands} bands"
        );

        let channels_per_band = header.num_channels as usize / num_bands;
        let band_bytes =
            channels_per_band * header.num_timesteps as usize * header.npol as usize * 2;
        (band_bytes, band * band_bytes)
    }

    /// Read one frequency band of the block described by `header`, across
    /// all antennas, into `buffer`.
    ///
    /// Antenna `a`'s slice lands at `buffer[a * band_bytes ..]` with
    /// `band_bytes = blocsize / (nants * num_bands)`. Only positional
    /// reads are issued, so the sequential cursor and sticky error state
    /// are untouched and the call stays valid for any previously returned
    /// header.
    ///
    /// # Panics
    ///
    /// Panics if `num_bands` is zero or does not divide `num_channels`,
    /// if `band` is out of range, or if `buffer` cannot hold
    /// `nants * band_bytes` bytes.
    pub fn read_band(
        &self,
        header: &Header,
        band: usize,
        num_bands: usize,
        buffer: &mut [u8],
    ) -> Result<()> {
        let (band_bytes, preband_bytes) = Self::band_layout(header, band, num_bands);
        let nants = header.nants as usize;
        assert!(
            buffer.len() >= nants * band_bytes,
            "destination buffer holds {} bytes, band needs {}",
            buffer.len(),
            nants * band_bytes
        );

        for antenna in 0..nants {
            let offset = header.data_offset
                + preband_bytes as u64
                + (antenna * num_bands * band_bytes) as u64;
            let dest = &mut buffer[antenna * band_bytes..][..band_bytes];
            let n = read_at_fully(&self.file, dest, offset)?;
            if n < band_bytes {
                return Err(Error::TruncatedBlock {
                    expected: band_bytes as u64,
                    actual: n as u64,
                });
            }
        }
        Ok(())
    }

    /// Dispatch one positional read task per antenna for a band of the
    /// block described by `header`.
    ///
    /// Tasks complete in no particular order; each must be awaited via
    /// [`BandReadTask::wait`] or [`BandReadTask::wait_into`] before its
    /// region can be trusted. A task that is never awaited leaks a
    /// detached thread.
    ///
    /// # Panics
    ///
    /// Panics if `num_bands` is zero or does not divide `num_channels`,
    /// or if `band` is out of range.
    pub fn read_band_async(
        &self,
        header: &Header,
        band: usize,
        num_bands: usize,
    ) -> Vec<BandReadTask> {
        let (band_bytes, preband_bytes) = Self::band_layout(header, band, num_bands);
        let nants = header.nants as usize;

        (0..nants)
            .map(|antenna| {
                let file = Arc::clone(&self.file);
                let offset = header.data_offset
                    + preband_bytes as u64
                    + (antenna * num_bands * band_bytes) as u64;
                let handle = thread::spawn(move || {
                    let mut bytes = vec![0u8; band_bytes];
                    let n = read_at_fully(&file, &mut bytes, offset)?;
                    if n < band_bytes {
                        return Err(Error::TruncatedBlock {
                            expected: band_bytes as u64,
                            actual: n as u64,
                        });
                    }
                    Ok(bytes)
                });
                BandReadTask {
                    antenna,
                    band_bytes,
                    handle,
                }
            })
            .collect()
    }
}

/// One in-flight antenna read dispatched by [`Reader::read_band_async`].
#[derive(Debug)]
pub struct BandReadTask {
    antenna: usize,
    band_bytes: usize,
    handle: JoinHandle<Result<Vec<u8>>>,
}

impl BandReadTask {
    /// The antenna index this task reads.
    pub fn antenna(&self) -> usize {
        self.antenna
    }

    /// Block until the read completes and return the band bytes.
    pub fn wait(self) -> Result<Vec<u8>> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Io(std::io::Error::other("band read task panicked"))),
        }
    }

    /// Block until the read completes and copy the bytes into their
    /// antenna-indexed region of `buffer`.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` cannot hold this antenna's region.
    pub fn wait_into(self, buffer: &mut [u8]) -> Result<()> {
        let antenna = self.antenna;
        let band_bytes = self.band_bytes;
        let bytes = self.wait()?;
        buffer[antenna * band_bytes..][..band_bytes].copy_from_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use crate::record::RECORD_SIZE;

    fn record(text: &str) -> [u8; RECORD_SIZE] {
        let mut r = [b' '; RECORD_SIZE];
        let bytes = text.as_bytes();
        r[..bytes.len()].copy_from_slice(bytes);
        r
    }

    fn header() -> Header {
        let mut region = Vec::new();
        for line in [
            "BLOCSIZE= 640",
            "NPOL    = 2",
            "OBSNCHAN= 8",
            "NBITS   = 8",
            "PKTIDX  = 0",
            "OBSFREQ = 1500.0",
            "OBSBW   = 187.5",
            "TBIN    = 1.0E-6",
            "NANTS   = 2",
            "END",
        ] {
            region.extend_from_slice(&record(line));
        }
        Header::decode(&region).unwrap()
    }

    #[test]
    fn band_layout_arithmetic() {
        let h = header();
        // 4 channels per antenna, 20 timesteps, 2 pols: 320 bytes per
        // antenna, split across bands.
        assert_eq!(Reader::band_layout(&h, 0, 1), (320, 0));
        assert_eq!(Reader::band_layout(&h, 0, 2), (160, 0));
        assert_eq!(Reader::band_layout(&h, 1, 2), (160, 160));
        assert_eq!(Reader::band_layout(&h, 3, 4), (80, 240));
    }

    #[test]
    fn band_bytes_cover_block() {
        let h = header();
        let (band_bytes, _) = Reader::band_layout(&h, 0, 4);
        assert_eq!(band_bytes as u64 * 4 * u64::from(h.nants), h.blocsize);
    }

    #[test]
    #[should_panic(expected = "do not split")]
    fn band_count_must_divide_channels() {
        let h = header();
        let _ = Reader::band_layout(&h, 0, 3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn band_index_must_be_in_range() {
        let h = header();
        let _ = Reader::band_layout(&h, 2, 2);
    }

    #[test]
    #[should_panic(expected = "must be positive")]
    fn zero_bands_rejected() {
        let h = header();
        let _ = Reader::band_layout(&h, 0, 0);
    }
}
