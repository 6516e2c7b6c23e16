//! Fixed-width ASCII header record scanning.

use alloc::string::String;

use crate::value;

/// Size in bytes of one ASCII header record.
pub const RECORD_SIZE: usize = 80;

/// Size in bytes of the reserved header region at the start of each block.
pub const MAX_HEADER_SIZE: usize = 25600;

/// Number of records that fit in one header region.
pub const RECORDS_PER_HEADER: usize = MAX_HEADER_SIZE / RECORD_SIZE;

/// Required alignment of data segments written with DIRECTIO.
pub const DIRECTIO_ALIGN: usize = 512;

/// Build an 8-byte, space-padded keyword from a short name.
pub const fn kw(name: &[u8]) -> [u8; 8] {
    let mut out = [b' '; 8];
    let mut i = 0;
    while i < name.len() {
        out[i] = name[i];
        i += 1;
    }
    out
}

/// Build a lookup keyword from a runtime string.
///
/// Returns `None` when the name is longer than 8 bytes; no such key can
/// exist in a record.
pub fn make_keyword(name: &str) -> Option<[u8; 8]> {
    let bytes = name.as_bytes();
    if bytes.len() > 8 {
        return None;
    }
    let mut out = [b' '; 8];
    out[..bytes.len()].copy_from_slice(bytes);
    Some(out)
}

/// Returns `true` if the record is the END terminator.
///
/// Only the leading `"END "` is significant; the remaining 76 bytes are
/// padding and historically carry arbitrary content.
fn is_end(record: &[u8]) -> bool {
    record.len() >= 4 && &record[..4] == b"END "
}

fn keyword_name(keyword: &[u8; 8]) -> &[u8] {
    let end = keyword
        .iter()
        .rposition(|&b| b != b' ')
        .map(|i| i + 1)
        .unwrap_or(0);
    &keyword[..end]
}

/// Locate a record by keyword and return its raw value field.
///
/// Records are scanned in 80-byte strides until the END record or the end
/// of `region`, whichever comes first. A record matches when it starts with
/// the keyword name followed by a space or `=`, so `KEY = value`,
/// `KEY= value`, and the bare `KEY value` form all resolve. The returned
/// slice starts at the first byte of the value text.
pub fn find_record<'a>(region: &'a [u8], keyword: &[u8; 8]) -> Option<&'a [u8]> {
    let name = keyword_name(keyword);
    if name.is_empty() {
        return None;
    }

    let mut offset = 0;
    while offset + RECORD_SIZE <= region.len() {
        let record = &region[offset..offset + RECORD_SIZE];
        if is_end(record) {
            return None;
        }
        if record.starts_with(name) {
            let mut i = name.len();
            if record[i] == b' ' || record[i] == b'=' {
                while i < RECORD_SIZE && record[i] == b' ' {
                    i += 1;
                }
                if i < RECORD_SIZE && record[i] == b'=' {
                    i += 1;
                    while i < RECORD_SIZE && record[i] == b' ' {
                        i += 1;
                    }
                }
                return Some(&record[i..]);
            }
        }
        offset += RECORD_SIZE;
    }
    None
}

/// Find a record and parse its value as a signed 64-bit integer.
pub fn find_i64(region: &[u8], keyword: &[u8; 8]) -> Option<i64> {
    value::parse_i64(find_record(region, keyword)?)
}

/// Find a record and parse its value as an unsigned 64-bit integer.
pub fn find_u64(region: &[u8], keyword: &[u8; 8]) -> Option<u64> {
    value::parse_u64(find_record(region, keyword)?)
}

/// Find a record and parse its value as an unsigned 32-bit integer.
/// Values wider than 32 bits are treated as absent.
pub fn find_u32(region: &[u8], keyword: &[u8; 8]) -> Option<u32> {
    find_u64(region, keyword).and_then(|v| u32::try_from(v).ok())
}

/// Find a record and parse its value as a float.
pub fn find_f64(region: &[u8], keyword: &[u8; 8]) -> Option<f64> {
    value::parse_f64(find_record(region, keyword)?)
}

/// Find a record and parse its value as a string.
pub fn find_str(region: &[u8], keyword: &[u8; 8]) -> Option<String> {
    value::parse_str(find_record(region, keyword)?)
}

/// Byte length of the header up to and including the END record, with no
/// padding applied. Returns `None` when the region holds no complete END
/// record.
pub fn header_extent(region: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while offset + RECORD_SIZE <= region.len() {
        if is_end(&region[offset..offset + RECORD_SIZE]) {
            return Some(offset + RECORD_SIZE);
        }
        offset += RECORD_SIZE;
    }
    None
}

/// Header extent after DIRECTIO padding.
///
/// When `directio` is set the writer pads the header so the data segment
/// that follows starts on a 512-byte boundary, measured from the start of
/// the 25600-byte region. `extent` must not exceed [`MAX_HEADER_SIZE`].
pub const fn padded_extent(extent: usize, directio: bool) -> usize {
    if directio {
        extent + (MAX_HEADER_SIZE - extent) % DIRECTIO_ALIGN
    } else {
        extent
    }
}
