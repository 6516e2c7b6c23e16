use alloc::string::String;
use alloc::string::ToString;
use core::str;

/// Strip an inline comment from a bare (unquoted) value field.
///
/// The FITS convention is ` / ` (space-slash-space) but files in the wild
/// omit the trailing space, so ` /` is enough to start a comment. Quoted
/// values must be handled by the caller before this runs; a `/` inside
/// quotes is content, not a separator.
fn strip_comment(field: &[u8]) -> &[u8] {
    let len = field.len();
    let mut i = 0;
    while i + 1 < len {
        if field[i] == b' ' && field[i + 1] == b'/' {
            return &field[..i];
        }
        i += 1;
    }
    field
}

/// Parse a quoted value: content between single quotes, with doubled
/// single-quotes `''` representing a literal `'`. Unterminated strings are
/// accepted as-is. Trailing spaces are trimmed (writers pad short values).
fn parse_quoted(field: &[u8]) -> Option<String> {
    if field.is_empty() || field[0] != b'\'' {
        return None;
    }

    let mut value = String::new();
    let mut i = 1; // skip opening quote
    let len = field.len();

    loop {
        if i >= len {
            // Unterminated string: accept what we have.
            break;
        }
        if field[i] == b'\'' {
            if i + 1 < len && field[i + 1] == b'\'' {
                value.push('\'');
                i += 2;
            } else {
                break;
            }
        } else {
            value.push(field[i] as char);
            i += 1;
        }
    }

    Some(value.trim_end().to_string())
}

/// Extract the textual content of a raw value field: quoted values yield
/// their inner content, bare values are comment-stripped and trimmed.
/// Returns `None` when nothing remains.
pub fn value_text(field: &[u8]) -> Option<String> {
    if field.first() == Some(&b'\'') {
        return parse_quoted(field).filter(|s| !s.is_empty());
    }
    let text = str::from_utf8(strip_comment(field)).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(String::from(text))
}

/// Parse a float string, handling Fortran `D` exponent notation.
fn parse_float_str(s: &str) -> Option<f64> {
    let normalized = s.replace('D', "E").replace('d', "e");
    normalized.parse::<f64>().ok()
}

/// Parse a value field as a signed 64-bit integer.
///
/// Quoted numbers (`PKTIDX = '12345'`) parse the same as bare ones; values
/// that are not integers at all yield `None` so the caller's default
/// applies.
pub fn parse_i64(field: &[u8]) -> Option<i64> {
    value_text(field)?.trim().parse::<i64>().ok()
}

/// Parse a value field as an unsigned 64-bit integer.
pub fn parse_u64(field: &[u8]) -> Option<u64> {
    value_text(field)?.trim().parse::<u64>().ok()
}

/// Parse a value field as a float, accepting `D` exponents and quoting.
pub fn parse_f64(field: &[u8]) -> Option<f64> {
    let text = value_text(field)?;
    parse_float_str(text.trim())
}

/// Parse a value field as a string (quoted content or bare token).
pub fn parse_str(field: &[u8]) -> Option<String> {
    value_text(field)
}

/// Convert a sexagesimal angle string into a decimal value.
///
/// The input is `[+|-]D:M:S` with up to three `:`-delimited tokens; absent
/// minutes/seconds count as zero, and a string with no `:` is a plain
/// decimal. Unparseable tokens contribute zero, matching the permissive
/// conversion used by the telescope recorders.
pub fn parse_sexagesimal(text: &str) -> f64 {
    let text = text.trim();
    let (sign, rest) = match text.as_bytes().first() {
        Some(b'-') => (-1.0, &text[1..]),
        Some(b'+') => (1.0, &text[1..]),
        _ => (1.0, text),
    };

    let mut total = 0.0;
    let mut scale = 1.0;
    for token in rest.split(':') {
        total += token.trim().parse::<f64>().unwrap_or(0.0) / scale;
        scale *= 60.0;
    }
    sign * total
}

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn field(s: &str) -> [u8; 70] {
        let mut f = [b' '; 70];
        let bytes = s.as_bytes();
        f[..bytes.len()].copy_from_slice(bytes);
        f
    }

    // ---- integers ----

    #[test]
    fn integer_bare() {
        assert_eq!(parse_i64(&field("1024")), Some(1024));
    }

    #[test]
    fn integer_negative() {
        assert_eq!(parse_i64(&field("-7")), Some(-7));
    }

    #[test]
    fn integer_with_comment() {
        assert_eq!(parse_i64(&field("640 / block bytes")), Some(640));
    }

    #[test]
    fn integer_quoted() {
        assert_eq!(parse_i64(&field("'12345'")), Some(12345));
    }

    #[test]
    fn integer_garbage() {
        assert_eq!(parse_i64(&field("12abc")), None);
    }

    #[test]
    fn integer_float_text_rejected() {
        assert_eq!(parse_i64(&field("1.5")), None);
    }

    #[test]
    fn unsigned_rejects_negative() {
        assert_eq!(parse_u64(&field("-1")), None);
        assert_eq!(parse_u64(&field("42")), Some(42));
    }

    // ---- floats ----

    #[test]
    fn float_plain() {
        assert_eq!(parse_f64(&field("1500.0")), Some(1500.0));
    }

    #[test]
    fn float_d_exponent() {
        assert_eq!(parse_f64(&field("1.5D3")), Some(1500.0));
        assert_eq!(parse_f64(&field("2.5d-1")), Some(0.25));
    }

    #[test]
    fn float_quoted() {
        assert_eq!(parse_f64(&field("'0.25'")), Some(0.25));
    }

    #[test]
    fn float_with_comment() {
        assert_eq!(parse_f64(&field("3.125e-7 / seconds per sample")), Some(3.125e-7));
    }

    // ---- strings ----

    #[test]
    fn string_bare_token() {
        assert_eq!(parse_str(&field("VOYAGER1 / target")), Some("VOYAGER1".to_string()));
    }

    #[test]
    fn string_quoted() {
        assert_eq!(parse_str(&field("'J1921+2153'")), Some("J1921+2153".to_string()));
    }

    #[test]
    fn string_doubled_quote() {
        assert_eq!(parse_str(&field("'O''BRIEN'")), Some("O'BRIEN".to_string()));
    }

    #[test]
    fn string_unterminated_accepted() {
        assert_eq!(parse_str(&field("'GBT")), Some("GBT".to_string()));
    }

    #[test]
    fn string_empty_field() {
        assert_eq!(parse_str(&field("")), None);
        assert_eq!(parse_str(&field("   / comment only")), None);
    }

    #[test]
    fn quoted_slash_is_content() {
        assert_eq!(parse_str(&field("'a /b'")), Some("a /b".to_string()));
    }
}

#[cfg(test)]
mod sexagesimal_tests {
    use super::*;

    #[test]
    fn hours_minutes_seconds() {
        assert_eq!(parse_sexagesimal("12:30:00"), 12.5);
    }

    #[test]
    fn negative_degrees() {
        assert_eq!(parse_sexagesimal("-45:30:00"), -45.5);
    }

    #[test]
    fn explicit_plus_sign() {
        assert_eq!(parse_sexagesimal("+3:30"), 3.5);
    }

    #[test]
    fn plain_decimal() {
        assert_eq!(parse_sexagesimal("10"), 10.0);
        assert_eq!(parse_sexagesimal("0.0"), 0.0);
    }

    #[test]
    fn missing_tokens_are_zero() {
        assert_eq!(parse_sexagesimal("7"), 7.0);
        assert_eq!(parse_sexagesimal("7:"), 7.0);
    }

    #[test]
    fn garbage_tokens_contribute_zero() {
        assert_eq!(parse_sexagesimal("abc"), 0.0);
        assert_eq!(parse_sexagesimal("12:xx:00"), 12.0);
    }
}
