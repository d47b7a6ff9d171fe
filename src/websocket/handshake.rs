use base64ct::{Base64, Encoding};
use sha1::{Digest, Sha1};

const SEC_WEBSOCKET_ACCEPT_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Encoded length of a `Sec-WebSocket-Key`
pub const KEY_LEN: usize = 24;
/// Encoded length of a `Sec-WebSocket-Accept`
pub const ACCEPT_LEN: usize = 28;

/// A client key must be base64 of exactly 16 bytes.
pub fn key_is_valid(key: &str) -> bool {
    let mut decoded = [0u8; 18];
    key.len() == KEY_LEN && matches!(Base64::decode(key, &mut decoded), Ok(d) if d.len() == 16)
}

/// `base64(sha1(key + magic))`
pub fn accept_token(key: &str) -> Result<[u8; ACCEPT_LEN], &'static str> {
    let mut key_hasher = Sha1::new();
    key_hasher.update(key.as_bytes());
    key_hasher.update(SEC_WEBSOCKET_ACCEPT_MAGIC.as_bytes());
    let key_hash = key_hasher.finalize();

    let mut token = [0u8; ACCEPT_LEN];
    if Base64::encode(&key_hash, &mut token).is_err() {
        return Err("error encoding key hash due to invalid length");
    }

    Ok(token)
}

/// Pick the subprotocol to confirm: the server's preference, if the client offered it in its
/// comma separated `Sec-WebSocket-Protocol` list.
pub fn select_protocol(offered: Option<&str>, preferred: Option<&'static str>) -> Option<&'static str> {
    let preferred = preferred?;
    offered?
        .split(',')
        .map(str::trim)
        .any(|p| p.eq_ignore_ascii_case(preferred))
        .then_some(preferred)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn test_accept_token_rfc_sample() {
        let token = accept_token("dGhlIHNhbXBsZSBub25jZQ==").unwrap();
        assert_eq!(&token, b"s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_key_validation() {
        assert!(key_is_valid("dGhlIHNhbXBsZSBub25jZQ=="));
        // 24 chars but 17 bytes worth of data
        assert!(!key_is_valid("dGhlIHNhbXBsZSBub25jZQ=A"));
        assert!(!key_is_valid("dGhlIHNhbXBsZSBub25jZQ="));
        assert!(!key_is_valid("not base64 at all!!!!!!!"));
        assert!(!key_is_valid(""));
    }

    #[test]
    fn test_select_protocol() {
        assert_eq!(select_protocol(Some("chat, superchat"), Some("chat")), Some("chat"));
        assert_eq!(select_protocol(Some("superchat"), Some("chat")), None);
        assert_eq!(select_protocol(None, Some("chat")), None);
        assert_eq!(select_protocol(Some("chat"), None), None);
    }
}
