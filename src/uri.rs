//! Request target handling: percent decoding, dot-segment removal and index page substitution.

use heapless::{String, Vec};

/// Decode `%XX` escapes in place.  A `%` not followed by two hex digits is kept as is.  Fails
/// when the decoded path is not UTF-8 or contains a NUL.
pub(crate) fn percent_decode<const N: usize>(path: &mut String<N>) -> Result<(), ()> {
    if !path.contains('%') {
        return Ok(());
    }

    let mut out: Vec<u8, N> = Vec::new();
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let hi = bytes.get(i + 1).and_then(hex_value);
        let lo = bytes.get(i + 2).and_then(hex_value);
        let b = match (bytes[i], hi, lo) {
            (b'%', Some(hi), Some(lo)) => {
                i += 3;
                hi << 4 | lo
            }
            (b, _, _) => {
                i += 1;
                b
            }
        };
        if b == 0 {
            return Err(());
        }
        // the output is never longer than the input
        let _ = out.push(b);
    }

    let decoded = core::str::from_utf8(&out).or(Err(()))?;
    *path = String::try_from(decoded)?;
    Ok(())
}

fn hex_value(b: &u8) -> Option<u8> {
    char::from(*b).to_digit(16).map(|d| d as u8)
}

/// Remove `.` and `..` segments and empty segments from an absolute path, in place.  `..` never
/// climbs above the root.  A trailing slash is preserved so directory requests still receive
/// the index page.
pub(crate) fn normalize<const N: usize>(path: &mut String<N>) {
    let mut out: String<N> = String::new();
    let trailing_slash = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                let keep = out.rfind('/').unwrap_or(0);
                out.truncate(keep);
            }
            s => {
                // the output is never longer than the input
                let _ = out.push('/');
                let _ = out.push_str(s);
            }
        }
    }

    if out.is_empty() || trailing_slash {
        let _ = out.push('/');
    }

    *path = out;
}

/// Append `index` when the path names a directory.
pub(crate) fn with_index<const N: usize>(path: &mut String<N>, index: &str) -> Result<(), ()> {
    if path.ends_with('/') {
        path.push_str(index)?;
    }
    Ok(())
}

/// File extension of the last path segment, if any.
pub(crate) fn extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next().unwrap_or(path);
    segment.rsplit_once('.').map(|(_, ext)| ext)
}
