pub(crate) const CR: u8 = 13;
pub(crate) const LF: u8 = 10;
pub(crate) const SP: u8 = 32;
pub(crate) const COLON: u8 = 58;
pub(crate) const ZERO: u8 = 48;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Parse an unsigned decimal.  Returns None for empty input, non-digits or overflow.
pub(crate) fn atoi(data: &[u8]) -> Option<u32> {
    if data.is_empty() {
        return None;
    }

    let mut val: u32 = 0;
    for digit in data {
        if !digit.is_ascii_digit() {
            return None;
        }
        val = val.checked_mul(10)?.checked_add((digit - ZERO) as u32)?;
    }

    Some(val)
}

/// Decimal rendering of an integer without allocation.  Digits are right aligned in the
/// backing array.
pub(crate) struct AsciiInt {
    digits: [u8; 20],
    start: usize,
}

impl AsciiInt {
    pub(crate) fn as_str(&self) -> &str {
        // only ever holds ascii digits
        core::str::from_utf8(&self.digits[self.start..]).unwrap_or("0")
    }
}

impl From<u64> for AsciiInt {
    fn from(value: u64) -> Self {
        let mut digits = [ZERO; 20];
        let mut start = digits.len();
        let mut int = value;

        loop {
            start -= 1;
            digits[start] = ZERO + (int % 10) as u8;
            int /= 10;
            if int == 0 {
                break;
            }
        }

        AsciiInt { digits, start }
    }
}

/// Lower case hexadecimal rendering, used for chunk sizes.
pub(crate) struct AsciiHex {
    digits: [u8; 16],
    start: usize,
}

impl AsciiHex {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.digits[self.start..]
    }
}

impl From<usize> for AsciiHex {
    fn from(value: usize) -> Self {
        let mut digits = [ZERO; 16];
        let mut start = digits.len();
        let mut int = value as u64;

        loop {
            start -= 1;
            digits[start] = HEX_DIGITS[(int & 0xF) as usize];
            int >>= 4;
            if int == 0 {
                break;
            }
        }

        AsciiHex { digits, start }
    }
}

/// Trim leading and trailing spaces and tabs.
pub(crate) fn trim(data: &[u8]) -> &[u8] {
    let is_ws = |b: &u8| *b == SP || *b == b'\t';
    let start = data.iter().position(|b| !is_ws(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !is_ws(b)).map_or(start, |i| i + 1);
    &data[start..end]
}
