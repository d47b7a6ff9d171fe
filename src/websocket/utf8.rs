/// Validates a text message delivered in pieces.  A code point cut by a piece boundary is carried
/// (at most 3 bytes plus the count still missing) into the next piece.
#[derive(Debug, Default)]
pub(crate) struct Utf8Validator {
    carry: [u8; 4],
    carried: usize,
    missing: usize,
}

#[derive(Debug, PartialEq)]
pub(crate) struct InvalidUtf8;

/// Length of the sequence introduced by `lead`, for leads `core::str::from_utf8` reported as an
/// incomplete (but so far valid) sequence.
fn sequence_len(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

impl Utf8Validator {
    pub(crate) fn reset(&mut self) {
        self.carried = 0;
        self.missing = 0;
    }

    /// Validate the next piece.  `last` marks the final piece of the message; a code point left
    /// incomplete at that point is an error.
    pub(crate) fn feed(&mut self, data: &[u8], last: bool) -> Result<(), InvalidUtf8> {
        let mut rest = data;

        if self.carried > 0 {
            let take = self.missing.min(rest.len());
            self.carry[self.carried..self.carried + take].copy_from_slice(&rest[..take]);
            self.carried += take;
            self.missing -= take;
            rest = &rest[take..];

            match core::str::from_utf8(&self.carry[..self.carried]) {
                Ok(_) => self.reset(),
                Err(e) if e.error_len().is_some() => return Err(InvalidUtf8),
                Err(_) => {
                    // still short of bytes, so `rest` is empty
                    return if last { Err(InvalidUtf8) } else { Ok(()) };
                }
            }
        }

        if let Err(e) = core::str::from_utf8(rest) {
            if e.error_len().is_some() {
                return Err(InvalidUtf8);
            }
            let tail = &rest[e.valid_up_to()..];
            self.carry[..tail.len()].copy_from_slice(tail);
            self.carried = tail.len();
            self.missing = sequence_len(tail[0]) - tail.len();
        }

        if last && self.carried > 0 {
            return Err(InvalidUtf8);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn test_code_point_split_across_pieces() {
        // "€" is e2 82 ac
        let mut v = Utf8Validator::default();
        assert_eq!(v.feed(b"price: \xe2", false), Ok(()));
        assert_eq!(v.feed(b"\x82", false), Ok(()));
        assert_eq!(v.feed(b"\xac 5", true), Ok(()));
    }

    #[test]
    fn test_four_byte_code_point_one_byte_at_a_time() {
        let mut v = Utf8Validator::default();
        let bytes = "😀".as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            assert_eq!(v.feed(&[*b], i == bytes.len() - 1), Ok(()));
        }
    }

    #[test]
    fn test_corrupted_continuation_is_rejected() {
        let mut v = Utf8Validator::default();
        assert_eq!(v.feed(b"ok \xe2\x82", false), Ok(()));
        assert_eq!(v.feed(b"A", false), Err(InvalidUtf8));

        let mut v = Utf8Validator::default();
        assert_eq!(v.feed(b"\xff", false), Err(InvalidUtf8));

        // surrogate half
        let mut v = Utf8Validator::default();
        assert_eq!(v.feed(b"\xed", false), Ok(()));
        assert_eq!(v.feed(b"\xa0\x80", false), Err(InvalidUtf8));
    }

    #[test]
    fn test_truncated_message_is_rejected() {
        let mut v = Utf8Validator::default();
        assert_eq!(v.feed(b"abc\xe2\x82", true), Err(InvalidUtf8));

        let mut v = Utf8Validator::default();
        assert_eq!(v.feed(b"abc\xe2", false), Ok(()));
        assert_eq!(v.feed(b"", true), Err(InvalidUtf8));
    }
}
