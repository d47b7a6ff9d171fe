/// Close status codes this server sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CloseCode {
    /// 1001, the server is going away or the application closed the session
    GoingAway,
    /// 1002
    ProtocolError,
    /// 1007, a text message was not valid UTF-8
    InvalidPayload,
    /// 1009, a frame length beyond what the session can represent
    MessageTooBig,
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> u16 {
        match code {
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::InvalidPayload => 1007,
            CloseCode::MessageTooBig => 1009,
        }
    }
}

/// Whether a peer may send `code` on the wire.  1004-1006 and 1015 are reserved for local use;
/// 3000-4999 belong to libraries and applications.
pub fn is_valid_close_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

/// Validate a received close payload.  An empty payload carries no code; otherwise it is a two
/// byte code and an optional UTF-8 reason.
pub(crate) fn parse_close_payload(payload: &[u8]) -> Result<Option<u16>, CloseCode> {
    match payload {
        [] => Ok(None),
        [_] => Err(CloseCode::ProtocolError),
        [hi, lo, reason @ ..] => {
            let code = u16::from_be_bytes([*hi, *lo]);
            if !is_valid_close_code(code) || core::str::from_utf8(reason).is_err() {
                return Err(CloseCode::ProtocolError);
            }
            Ok(Some(code))
        }
    }
}
