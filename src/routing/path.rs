//! Request path canonicalization.
//!
//! # Responsibilities
//! - Decode percent-escaped unreserved characters, uppercase the rest
//! - Collapse repeated `/`
//! - Resolve `.` and `..` segments
//!
//! # Design Decisions
//! - Policy is selected on the canonical path and the upstream receives it
//! - Encoded separators, backslashes, NUL and `..` above the root are refused

use std::borrow::Cow;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed percent escape")]
    BadEscape,

    #[error("encoded or alternate path separator")]
    Separator,

    #[error("path contains a NUL byte")]
    Nul,

    #[error("path escapes the root")]
    AboveRoot,
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn decode_escapes(path: &str) -> Result<String, PathError> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let bytes = path.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(hex_value);
                let lo = bytes.get(i + 2).copied().and_then(hex_value);
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(PathError::BadEscape);
                };
                let value = (hi << 4) | lo;
                match value {
                    b'/' | b'\\' => return Err(PathError::Separator),
                    0 => return Err(PathError::Nul),
                    v if is_unreserved(v) => out.push(char::from(v)),
                    v => {
                        out.push('%');
                        out.push(char::from(HEX[usize::from(v >> 4)]));
                        out.push(char::from(HEX[usize::from(v & 0x0f)]));
                    }
                }
                i += 3;
            }
            b'\\' => return Err(PathError::Separator),
            0 => return Err(PathError::Nul),
            // Non-ASCII bytes cannot appear in a parsed URI path; copy whole chars anyway.
            _ => {
                let ch_len = path[i..].chars().next().map_or(1, char::len_utf8);
                out.push_str(&path[i..i + ch_len]);
                i += ch_len;
            }
        }
    }
    Ok(out)
}

/// Canonical form of `path`. Borrowed when the input is already canonical.
pub fn canonicalize(path: &str) -> Result<Cow<'_, str>, PathError> {
    let decoded = decode_escapes(path)?;

    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_slash = false;
    for segment in decoded.split('/') {
        trailing_slash = false;
        match segment {
            "" => trailing_slash = true,
            "." => trailing_slash = true,
            ".." => {
                segments.pop().ok_or(PathError::AboveRoot)?;
                trailing_slash = true;
            }
            s => segments.push(s),
        }
    }

    let mut canonical = String::with_capacity(decoded.len());
    for segment in &segments {
        canonical.push('/');
        canonical.push_str(segment);
    }
    if canonical.is_empty() || trailing_slash {
        canonical.push('/');
    }

    if canonical == path {
        Ok(Cow::Borrowed(path))
    } else {
        Ok(Cow::Owned(canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(path: &str) -> String {
        canonicalize(path).unwrap().into_owned()
    }

    #[test]
    fn test_canonical_paths_are_borrowed() {
        for path in ["/", "/v1/movies", "/v1/movies/", "/v1/movies/7", "/a%20b"] {
            assert!(matches!(canonicalize(path), Ok(Cow::Borrowed(p)) if p == path));
        }
    }

    #[test]
    fn test_alternate_spellings_collapse() {
        assert_eq!(canon("/v1//movies"), "/v1/movies");
        assert_eq!(canon("//v1/movies"), "/v1/movies");
        assert_eq!(canon("/v1/./movies"), "/v1/movies");
        assert_eq!(canon("/v1/%6Dovies"), "/v1/movies");
        assert_eq!(canon("/v1/%2E/movies"), "/v1/movies");
        assert_eq!(canon("/v1/tokens/../movies"), "/v1/movies");
        assert_eq!(canon("/v1/%2e%2e/v1/movies"), "/v1/movies");
    }

    #[test]
    fn test_trailing_slash_and_root() {
        assert_eq!(canon(""), "/");
        assert_eq!(canon("//"), "/");
        assert_eq!(canon("/v1/movies/."), "/v1/movies/");
        assert_eq!(canon("/v1/movies/.."), "/v1/");
        assert_eq!(canon("/v1/movies//"), "/v1/movies/");
    }

    #[test]
    fn test_reserved_escapes_are_normalized_not_decoded() {
        assert_eq!(canon("/a%3fb"), "/a%3Fb");
        assert_eq!(canon("/a%20b"), "/a%20b");
    }

    #[test]
    fn test_refused_paths() {
        assert_eq!(canonicalize("/v1%2Fmovies"), Err(PathError::Separator));
        assert_eq!(canonicalize("/v1%5cmovies"), Err(PathError::Separator));
        assert_eq!(canonicalize("/v1\\movies"), Err(PathError::Separator));
        assert_eq!(canonicalize("/v1/%00"), Err(PathError::Nul));
        assert_eq!(canonicalize("/v1/%4"), Err(PathError::BadEscape));
        assert_eq!(canonicalize("/v1/%zz"), Err(PathError::BadEscape));
        assert_eq!(canonicalize("/../v1/movies"), Err(PathError::AboveRoot));
    }
}
