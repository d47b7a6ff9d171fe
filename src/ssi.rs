//! Incremental scanner for `<% name %>` server side include tags.
//!
//! File bodies arrive in arbitrary chunks so a tag may straddle two reads.  Bytes that might be
//! the start of a tag are held in a small lookahead buffer until they either complete a tag or
//! turn out to be literal text.

/// Longest tag (including the delimiters) that is recognised; longer candidates are emitted as
/// literal text.
pub const SSI_LOOKAHEAD: usize = 40;

const OPEN: [u8; 2] = *b"<%";
const CLOSE: [u8; 2] = *b"%>";

/// Output of the scanner.
#[derive(Debug, PartialEq)]
pub(crate) enum SsiEvent<'s, 'i> {
    /// Literal bytes taken straight from the input
    Literal(&'i [u8]),
    /// Literal bytes released from the lookahead buffer
    Held(&'s [u8]),
    /// A complete tag, name trimmed
    Tag(&'s str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Text,
    /// holding `<`
    Opening,
    /// holding `<%` and part of a name
    InTag,
    /// holding a candidate that ends with `%`
    Closing,
}

pub(crate) struct SsiScanner {
    lookahead: [u8; SSI_LOOKAHEAD],
    held: usize,
    state: ScanState,
}

impl SsiScanner {
    pub(crate) fn new() -> Self {
        Self {
            lookahead: [0; SSI_LOOKAHEAD],
            held: 0,
            state: ScanState::Text,
        }
    }

    /// Produce the next event, consuming from `input`.  Returns `None` once `input` is
    /// exhausted; a partial candidate stays held for the next chunk.
    pub(crate) fn next<'s, 'i>(&'s mut self, input: &mut &'i [u8]) -> Option<SsiEvent<'s, 'i>> {
        loop {
            let data: &'i [u8] = *input;
            let &b = data.first()?;

            match self.state {
                ScanState::Text => match data.iter().position(|c| *c == OPEN[0]) {
                    Some(0) => {
                        self.hold(b);
                        self.state = ScanState::Opening;
                        *input = &data[1..];
                    }
                    Some(n) => {
                        *input = &data[n..];
                        return Some(SsiEvent::Literal(&data[..n]));
                    }
                    None => {
                        *input = &[];
                        return Some(SsiEvent::Literal(data));
                    }
                },
                ScanState::Opening if b == OPEN[1] => {
                    self.hold(b);
                    self.state = ScanState::InTag;
                    *input = &data[1..];
                }
                // not a tag: release what is held and rescan `b` as text
                ScanState::Opening => return Some(self.release()),
                _ if self.held == SSI_LOOKAHEAD => return Some(self.release()),
                ScanState::InTag => {
                    self.hold(b);
                    if b == CLOSE[0] {
                        self.state = ScanState::Closing;
                    }
                    *input = &data[1..];
                }
                ScanState::Closing => {
                    self.hold(b);
                    *input = &data[1..];
                    if b == CLOSE[1] {
                        return Some(self.tag());
                    }
                    if b != CLOSE[0] {
                        self.state = ScanState::InTag;
                    }
                }
            }
        }
    }

    /// Bytes still held when the body ends; they are literal text.
    pub(crate) fn finish(&mut self) -> &[u8] {
        let held = self.held;
        self.held = 0;
        self.state = ScanState::Text;
        &self.lookahead[..held]
    }

    fn hold(&mut self, b: u8) {
        self.lookahead[self.held] = b;
        self.held += 1;
    }

    fn release<'s, 'i>(&'s mut self) -> SsiEvent<'s, 'i> {
        let held = self.held;
        self.held = 0;
        self.state = ScanState::Text;
        SsiEvent::Held(&self.lookahead[..held])
    }

    fn tag<'s, 'i>(&'s mut self) -> SsiEvent<'s, 'i> {
        let held = self.held;
        self.held = 0;
        self.state = ScanState::Text;
        let name = &self.lookahead[OPEN.len()..held - CLOSE.len()];
        SsiEvent::Tag(core::str::from_utf8(name).unwrap_or("").trim())
    }
}
