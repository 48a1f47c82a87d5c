//! Peer identities handed out by the ingest transport.

use std::fmt;

/// The opaque token the ingest socket attaches to every message from a peer.
/// Clients that set their own identity usually pick something readable, but
/// ZeroMQ assigns 5 random bytes to the ones that don't, so this is kept as
/// raw bytes and only rendered for display and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientIdentity(Vec<u8>);

impl ClientIdentity {
    /// Wraps the identity frame of an inbound message.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The identity exactly as the transport delivered it.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for ClientIdentity {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

// UTF-8 identities are shown verbatim. Anything that isn't text, holds a
// control character (the transport's generated identities start with a zero
// byte), or contains a `/` or `;` is shown as hex so it can never break the
// framing of a telemetry tick.
impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let readable = std::str::from_utf8(&self.0).ok().filter(|text| {
            !text.is_empty()
                && !text
                    .chars()
                    .any(|c| c.is_control() || c == '/' || c == ';')
        });
        if let Some(text) = readable {
            write!(f, "{}", text)
        } else {
            write!(f, "0x")?;
            for b in &self.0 {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_identities_print_verbatim() {
        assert_eq!(ClientIdentity::from("clientA").to_string(), "clientA");
    }

    #[test]
    fn spaces_and_unicode_print_verbatim() {
        assert_eq!(ClientIdentity::from("headset 1").to_string(), "headset 1");
        assert_eq!(ClientIdentity::from("hmd-é").to_string(), "hmd-é");
    }

    #[test]
    fn control_bytes_and_bad_utf8_print_as_hex() {
        assert_eq!(ClientIdentity::from("a\nb").to_string(), "0x610a62");
        assert_eq!(ClientIdentity::new(vec![0x68, 0xff]).to_string(), "0x68ff");
        assert_eq!(ClientIdentity::from("").to_string(), "0x");
    }

    #[test]
    fn generated_identities_print_as_hex() {
        let id = ClientIdentity::new(vec![0x00, 0x6b, 0x8b, 0x45, 0x67]);
        assert_eq!(id.to_string(), "0x006b8b4567");
    }

    #[test]
    fn separators_force_hex() {
        assert_eq!(ClientIdentity::from("a/b").to_string(), "0x612f62");
    }
}
