//! Block header decoding and the typed header model.

use alloc::string::String;
use core::fmt;

use crate::error::{Error, Result};
use crate::record::{self, kw, MAX_HEADER_SIZE};
use crate::value;

// ── Aligned buffer ──

/// One reserved header region, aligned for direct I/O.
///
/// Recorders write with `O_DIRECT`, which requires 512-byte alignment of
/// both file offsets and memory buffers, so the read target keeps that
/// alignment even though this reader opens files in buffered mode.
#[repr(C, align(512))]
#[derive(Clone)]
pub struct HeaderBuffer {
    bytes: [u8; MAX_HEADER_SIZE],
}

impl HeaderBuffer {
    /// A zero-filled region.
    pub const fn new() -> Self {
        Self {
            bytes: [0; MAX_HEADER_SIZE],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Default for HeaderBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for HeaderBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..] == other.bytes[..]
    }
}

impl fmt::Debug for HeaderBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeaderBuffer({MAX_HEADER_SIZE} bytes)")
    }
}

// ── Header model ──

const KW_BLOCSIZE: [u8; 8] = kw(b"BLOCSIZE");
const KW_NPOL: [u8; 8] = kw(b"NPOL");
const KW_OBSNCHAN: [u8; 8] = kw(b"OBSNCHAN");
const KW_NBITS: [u8; 8] = kw(b"NBITS");
const KW_PKTIDX: [u8; 8] = kw(b"PKTIDX");
const KW_OBSFREQ: [u8; 8] = kw(b"OBSFREQ");
const KW_OBSBW: [u8; 8] = kw(b"OBSBW");
const KW_TBIN: [u8; 8] = kw(b"TBIN");
const KW_DIRECTIO: [u8; 8] = kw(b"DIRECTIO");
const KW_BEAM_ID: [u8; 8] = kw(b"BEAM_ID");
const KW_NANTS: [u8; 8] = kw(b"NANTS");
const KW_RA_STR: [u8; 8] = kw(b"RA_STR");
const KW_DEC_STR: [u8; 8] = kw(b"DEC_STR");
const KW_STT_IMJD: [u8; 8] = kw(b"STT_IMJD");
const KW_STT_SMJD: [u8; 8] = kw(b"STT_SMJD");
const KW_SRC_NAME: [u8; 8] = kw(b"SRC_NAME");
const KW_TELESCOP: [u8; 8] = kw(b"TELESCOP");

/// A typed, validated view of one block's metadata.
///
/// Produced by [`Header::decode`]; every geometry invariant has been
/// checked by the time a value exists. The two reader-dependent fields,
/// `missing_blocks` and `data_offset`, start at zero and are filled by
/// [`crate::reader::Reader::read_header`].
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Whether the data segment was written with direct I/O. Drives
    /// header padding.
    pub directio: bool,
    /// Data segment size in bytes, excluding any padding.
    pub blocsize: u64,
    /// Polarizations per sample. A raw value of 4 (full-Stokes labeling)
    /// is normalized to 2.
    pub npol: u32,
    /// Total channel count across all antennas.
    pub obsnchan: u32,
    /// Bits per real/imaginary component; only 8 is supported.
    pub nbits: u32,
    /// Packet index of the block's first sample.
    pub pktidx: i64,
    /// Center frequency in MHz.
    pub obsfreq: f64,
    /// Observed bandwidth in MHz, negative when the band is reversed.
    pub obsbw: f64,
    /// Sampling period in seconds.
    pub tbin: f64,
    /// Right ascension in decimal hours.
    pub ra: f64,
    /// Declination in decimal degrees.
    pub dec: f64,
    /// Start MJD of the observation.
    pub mjd: f64,
    /// Beam index, or -1 when not beamformed.
    pub beam_id: i32,
    /// Number of antennas interleaved in the block.
    pub nants: u32,
    /// Source name.
    pub src_name: String,
    /// Telescope name.
    pub telescop: String,
    /// Header size in bytes up to and including END, unpadded.
    pub hdr_size: usize,
    /// Absolute file offset of the block's first data byte; filled by the
    /// reader.
    pub data_offset: u64,
    /// Gap in `pktidx` since the previous block read by the same reader;
    /// 0 for the first block.
    pub missing_blocks: i64,
    /// Timesteps per block: `blocsize / bytes_per_timestep`.
    pub num_timesteps: u64,
    /// Channels per antenna: `obsnchan / nants`.
    pub num_channels: u32,
    buffer: HeaderBuffer,
}

impl Header {
    /// Decode a header from the prefix of the 25600-byte region actually
    /// read from disk.
    ///
    /// All format invariants are checked here: required keys present and
    /// non-zero, supported bit depth, channel count divisible by the
    /// antenna count, block size divisible by the timestep stride.
    ///
    /// # Panics
    ///
    /// Panics if `region` is longer than [`MAX_HEADER_SIZE`].
    pub fn decode(region: &[u8]) -> Result<Header> {
        assert!(
            region.len() <= MAX_HEADER_SIZE,
            "header region exceeds the {MAX_HEADER_SIZE}-byte format limit"
        );

        let hdr_size = record::header_extent(region).ok_or(Error::UnterminatedHeader)?;
        let region = &region[..hdr_size];

        let blocsize = record::find_u64(region, &KW_BLOCSIZE).unwrap_or(0);
        let mut npol = record::find_u32(region, &KW_NPOL).unwrap_or(0);
        let obsnchan = record::find_u32(region, &KW_OBSNCHAN).unwrap_or(0);
        let nbits = record::find_u32(region, &KW_NBITS).unwrap_or(8);
        let pktidx = record::find_i64(region, &KW_PKTIDX).unwrap_or(-1);
        let obsfreq = record::find_f64(region, &KW_OBSFREQ).unwrap_or(0.0);
        let obsbw = record::find_f64(region, &KW_OBSBW).unwrap_or(0.0);
        let tbin = record::find_f64(region, &KW_TBIN).unwrap_or(0.0);
        let directio = record::find_i64(region, &KW_DIRECTIO).unwrap_or(0) != 0;
        let beam_id = record::find_i64(region, &KW_BEAM_ID)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(-1);
        let nants = record::find_u32(region, &KW_NANTS).unwrap_or(1);

        let ra_str = record::find_str(region, &KW_RA_STR).unwrap_or_else(|| String::from("0.0"));
        let dec_str = record::find_str(region, &KW_DEC_STR).unwrap_or_else(|| String::from("0.0"));
        let ra = value::parse_sexagesimal(&ra_str);
        let dec = value::parse_sexagesimal(&dec_str);

        let imjd = record::find_i64(region, &KW_STT_IMJD).unwrap_or(51545);
        let smjd = record::find_i64(region, &KW_STT_SMJD).unwrap_or(0);
        let mjd = imjd as f64 + smjd as f64 / 86400.0;

        let src_name =
            record::find_str(region, &KW_SRC_NAME).unwrap_or_else(|| String::from("Unknown"));
        let telescop =
            record::find_str(region, &KW_TELESCOP).unwrap_or_else(|| String::from("Unknown"));

        // A zero value (or the pktidx sentinel) is indistinguishable from
        // an absent key, and the format never writes zeros for these.
        if blocsize == 0 {
            return Err(Error::MissingKeyword("BLOCSIZE"));
        }
        if npol == 0 {
            return Err(Error::MissingKeyword("NPOL"));
        }
        if obsnchan == 0 {
            return Err(Error::MissingKeyword("OBSNCHAN"));
        }
        if obsfreq == 0.0 {
            return Err(Error::MissingKeyword("OBSFREQ"));
        }
        if obsbw == 0.0 {
            return Err(Error::MissingKeyword("OBSBW"));
        }
        if tbin == 0.0 {
            return Err(Error::MissingKeyword("TBIN"));
        }
        if pktidx == -1 {
            return Err(Error::MissingKeyword("PKTIDX"));
        }

        // Full-Stokes recorders label four polarization products; the
        // voltage layout still carries two.
        if npol == 4 {
            npol = 2;
        }

        if nants == 0 || obsnchan % nants != 0 {
            return Err(Error::ChannelCount { obsnchan, nants });
        }
        let num_channels = obsnchan / nants;

        if nbits != 8 {
            return Err(Error::UnsupportedNbits(nbits));
        }

        let bytes_per_timestep = 2u64
            .checked_mul(u64::from(npol))
            .and_then(|v| v.checked_mul(u64::from(obsnchan)))
            .and_then(|v| v.checked_mul(u64::from(nbits)))
            .map(|v| v / 8)
            .ok_or(Error::InvalidHeader("timestep byte count overflow"))?;
        if blocsize % bytes_per_timestep != 0 {
            return Err(Error::BlockSize {
                blocsize,
                bytes_per_timestep,
            });
        }
        let num_timesteps = blocsize / bytes_per_timestep;

        let mut buffer = HeaderBuffer::new();
        buffer.bytes[..hdr_size].copy_from_slice(region);

        Ok(Header {
            directio,
            blocsize,
            npol,
            obsnchan,
            nbits,
            pktidx,
            obsfreq,
            obsbw,
            tbin,
            ra,
            dec,
            mjd,
            beam_id,
            nants,
            src_name,
            telescop,
            hdr_size,
            data_offset: 0,
            missing_blocks: 0,
            num_timesteps,
            num_channels,
            buffer,
        })
    }

    /// On-disk header size including DIRECTIO padding. The data segment
    /// begins this many bytes after the header start.
    pub fn padded_size(&self) -> usize {
        record::padded_extent(self.hdr_size, self.directio)
    }

    /// Bytes per timestep across all antennas, channels, and
    /// polarizations.
    pub fn bytes_per_timestep(&self) -> u64 {
        2 * u64::from(self.npol) * u64::from(self.obsnchan) * u64::from(self.nbits) / 8
    }

    /// The raw header bytes, up to and including the END record.
    pub fn raw(&self) -> &[u8] {
        &self.buffer.bytes[..self.hdr_size]
    }

    /// Look up any header key as a signed 64-bit integer. Returns `None`
    /// for absent keys and unparseable values.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        record::find_i64(self.raw(), &record::make_keyword(key)?)
    }

    /// Look up any header key as an unsigned 32-bit integer.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        record::find_u32(self.raw(), &record::make_keyword(key)?)
    }

    /// Look up any header key as an unsigned 64-bit integer.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        record::find_u64(self.raw(), &record::make_keyword(key)?)
    }

    /// Look up any header key as a float.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        record::find_f64(self.raw(), &record::make_keyword(key)?)
    }

    /// Look up any header key as a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        record::find_str(self.raw(), &record::make_keyword(key)?)
    }

    /// Unix time of the block's first sample.
    ///
    /// Requires the `SYNCTIME` and `PIPERBLK` keys; absent or zero values
    /// are reported as missing.
    pub fn start_time(&self) -> Result<f64> {
        let synctime = self
            .get_u64("SYNCTIME")
            .filter(|&v| v > 0)
            .ok_or(Error::MissingKeyword("SYNCTIME"))?;
        let piperblk = self
            .get_u64("PIPERBLK")
            .filter(|&v| v > 0)
            .ok_or(Error::MissingKeyword("PIPERBLK"))?;
        let time_per_packet = self.tbin * self.num_timesteps as f64 / piperblk as f64;
        Ok(synctime as f64 + self.pktidx as f64 * time_per_packet)
    }

    /// Unix time of the block's midpoint.
    pub fn mid_time(&self) -> Result<f64> {
        Ok(self.start_time()? + self.tbin * self.num_timesteps as f64 / 2.0)
    }

    /// View a data block as `(real, imaginary)` sample pairs.
    ///
    /// # Panics
    ///
    /// Panics if `block` does not hold exactly `blocsize` bytes.
    pub fn samples<'a>(&self, block: &'a [u8]) -> &'a [[i8; 2]] {
        assert!(
            block.len() as u64 == self.blocsize,
            "block length {} does not match BLOCSIZE {}",
            block.len(),
            self.blocsize
        );
        bytemuck::cast_slice(block)
    }
}

#[cfg(test)]
mod decode_tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use crate::record::RECORD_SIZE;

    fn record(text: &str) -> [u8; RECORD_SIZE] {
        let mut r = [b' '; RECORD_SIZE];
        let bytes = text.as_bytes();
        r[..bytes.len()].copy_from_slice(bytes);
        r
    }

    fn region(lines: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for line in lines {
            out.extend_from_slice(&record(line));
        }
        out.extend_from_slice(&record("END"));
        out
    }

    fn base_lines() -> Vec<&'static str> {
        vec![
            "BLOCSIZE= 640",
            "NPOL    = 2",
            "OBSNCHAN= 8",
            "NBITS   = 8",
            "PKTIDX  = 0",
            "OBSFREQ = 1500.0",
            "OBSBW   = 187.5",
            "TBIN    = 1.0E-6",
            "NANTS   = 2",
        ]
    }

    #[test]
    fn decode_populates_fields() {
        let h = Header::decode(&region(&base_lines())).unwrap();
        assert_eq!(h.blocsize, 640);
        assert_eq!(h.npol, 2);
        assert_eq!(h.obsnchan, 8);
        assert_eq!(h.nbits, 8);
        assert_eq!(h.pktidx, 0);
        assert_eq!(h.obsfreq, 1500.0);
        assert_eq!(h.obsbw, 187.5);
        assert_eq!(h.tbin, 1.0e-6);
        assert_eq!(h.nants, 2);
        assert_eq!(h.num_channels, 4);
        assert_eq!(h.bytes_per_timestep(), 32);
        assert_eq!(h.num_timesteps, 20);
        // Defaults for keys the region omits.
        assert!(!h.directio);
        assert_eq!(h.beam_id, -1);
        assert_eq!(h.ra, 0.0);
        assert_eq!(h.dec, 0.0);
        assert_eq!(h.mjd, 51545.0);
        assert_eq!(h.src_name, "Unknown");
        assert_eq!(h.telescop, "Unknown");
        // Reader-owned fields stay zero at decode time.
        assert_eq!(h.data_offset, 0);
        assert_eq!(h.missing_blocks, 0);
        assert_eq!(h.hdr_size, 10 * RECORD_SIZE);
    }

    #[test]
    fn decode_is_idempotent() {
        let r = region(&base_lines());
        let first = Header::decode(&r).unwrap();
        let second = Header::decode(&r).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn npol_four_normalizes_to_two() {
        let mut lines = base_lines();
        lines[1] = "NPOL    = 4";
        let h = Header::decode(&region(&lines)).unwrap();
        assert_eq!(h.npol, 2);
        assert_eq!(h.bytes_per_timestep(), 32);
    }

    #[test]
    fn npol_two_stays_two() {
        let h = Header::decode(&region(&base_lines())).unwrap();
        assert_eq!(h.npol, 2);
    }

    #[test]
    fn missing_required_keys_are_fatal() {
        let required = [
            "BLOCSIZE", "NPOL", "OBSNCHAN", "OBSFREQ", "OBSBW", "TBIN", "PKTIDX",
        ];
        for name in required {
            let lines: Vec<&str> = base_lines()
                .into_iter()
                .filter(|l| !l.starts_with(name))
                .collect();
            match Header::decode(&region(&lines)) {
                Err(Error::MissingKeyword(k)) => assert_eq!(k, name),
                other => panic!("expected MissingKeyword({name}), got {other:?}"),
            }
        }
    }

    #[test]
    fn zero_values_count_as_missing() {
        let mut lines = base_lines();
        lines[0] = "BLOCSIZE= 0";
        assert!(matches!(
            Header::decode(&region(&lines)),
            Err(Error::MissingKeyword("BLOCSIZE"))
        ));

        let mut lines = base_lines();
        lines[7] = "TBIN    = 0.0";
        assert!(matches!(
            Header::decode(&region(&lines)),
            Err(Error::MissingKeyword("TBIN"))
        ));
    }

    #[test]
    fn pktidx_sentinel_counts_as_missing() {
        let mut lines = base_lines();
        lines[4] = "PKTIDX  = -1";
        assert!(matches!(
            Header::decode(&region(&lines)),
            Err(Error::MissingKeyword("PKTIDX"))
        ));
    }

    #[test]
    fn channel_count_must_divide() {
        let mut lines = base_lines();
        lines[8] = "NANTS   = 3";
        match Header::decode(&region(&lines)) {
            Err(Error::ChannelCount { obsnchan, nants }) => {
                assert_eq!(obsnchan, 8);
                assert_eq!(nants, 3);
            }
            other => panic!("expected ChannelCount, got {other:?}"),
        }

        let mut lines = base_lines();
        lines[8] = "NANTS   = 4";
        let h = Header::decode(&region(&lines)).unwrap();
        assert_eq!(h.num_channels, 2);
    }

    #[test]
    fn zero_antennas_rejected() {
        let mut lines = base_lines();
        lines[8] = "NANTS   = 0";
        assert!(matches!(
            Header::decode(&region(&lines)),
            Err(Error::ChannelCount { nants: 0, .. })
        ));
    }

    #[test]
    fn unsupported_nbits_rejected() {
        let mut lines = base_lines();
        lines[3] = "NBITS   = 16";
        assert!(matches!(
            Header::decode(&region(&lines)),
            Err(Error::UnsupportedNbits(16))
        ));
    }

    #[test]
    fn channel_geometry_reported_before_bit_depth() {
        let mut lines = base_lines();
        lines[3] = "NBITS   = 16";
        lines[8] = "NANTS   = 3";
        assert!(matches!(
            Header::decode(&region(&lines)),
            Err(Error::ChannelCount { .. })
        ));
    }

    #[test]
    fn blocsize_must_be_whole_timesteps() {
        // npol=2, obsnchan=4, nbits=8: 16 bytes per timestep.
        let lines = [
            "BLOCSIZE= 160",
            "NPOL    = 2",
            "OBSNCHAN= 4",
            "NBITS   = 8",
            "PKTIDX  = 0",
            "OBSFREQ = 1500.0",
            "OBSBW   = 187.5",
            "TBIN    = 1.0E-6",
        ];
        let h = Header::decode(&region(&lines)).unwrap();
        assert_eq!(h.bytes_per_timestep(), 16);
        assert_eq!(h.num_timesteps, 10);
        assert_eq!(h.nants, 1);

        let mut lines = lines;
        lines[0] = "BLOCSIZE= 161";
        match Header::decode(&region(&lines)) {
            Err(Error::BlockSize {
                blocsize,
                bytes_per_timestep,
            }) => {
                assert_eq!(blocsize, 161);
                assert_eq!(bytes_per_timestep, 16);
            }
            other => panic!("expected BlockSize, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_region_rejected() {
        let mut r = Vec::new();
        for line in base_lines() {
            r.extend_from_slice(&record(line));
        }
        assert!(matches!(
            Header::decode(&r),
            Err(Error::UnterminatedHeader)
        ));
    }

    #[test]
    #[should_panic(expected = "format limit")]
    fn oversize_region_panics() {
        let r = vec![b' '; MAX_HEADER_SIZE + RECORD_SIZE];
        let _ = Header::decode(&r);
    }

    #[test]
    fn directio_padding_reported() {
        let h = Header::decode(&region(&base_lines())).unwrap();
        assert_eq!(h.hdr_size, 800);
        assert_eq!(h.padded_size(), 800);

        let mut lines = base_lines();
        lines.push("DIRECTIO= 1");
        let h = Header::decode(&region(&lines)).unwrap();
        assert!(h.directio);
        assert_eq!(h.hdr_size, 880);
        assert_eq!(h.padded_size(), 1024);
    }

    #[test]
    fn mjd_from_day_and_second_fields() {
        let mut lines = base_lines();
        lines.push("STT_IMJD= 59000");
        lines.push("STT_SMJD= 43200");
        let h = Header::decode(&region(&lines)).unwrap();
        assert_eq!(h.mjd, 59000.5);
    }

    #[test]
    fn ra_dec_from_sexagesimal_strings() {
        let mut lines = base_lines();
        lines.push("RA_STR  = '12:30:00'");
        lines.push("DEC_STR = '-45:30:00'");
        let h = Header::decode(&region(&lines)).unwrap();
        assert_eq!(h.ra, 12.5);
        assert_eq!(h.dec, -45.5);
    }

    #[test]
    fn source_and_telescope_strings() {
        let mut lines = base_lines();
        lines.push("SRC_NAME= 'J1921+2153'");
        lines.push("TELESCOP= GBT");
        let h = Header::decode(&region(&lines)).unwrap();
        assert_eq!(h.src_name, "J1921+2153");
        assert_eq!(h.telescop, "GBT");
    }
}
