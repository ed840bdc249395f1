use std::sync::{Arc, LazyLock};

use rand::Rng;
use regex::Regex;
use tokio::sync::{Mutex, RwLock};

/// A thread-safe, mutually exclusive shared component.
pub type Shared<T> = Arc<Mutex<T>>;

/// A thread-safe, read-write shared component.
pub type SharedRw<T> = Arc<RwLock<T>>;

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// Alphabet for room codes. Excludes `I`, `O`, `0` and `1`, which are too
/// easy to confuse when a code is read out loud or typed from a screen.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Room codes are exactly 6 characters over the restricted alphabet.
pub const ROOM_CODE_LEN: usize = 6;

static ROOM_CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z2-9]{6}$").unwrap());

/// Human-typable room identifier, e.g. `K7QW2N`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Generates a random 6-character code over [`ROOM_CODE_ALPHABET`].
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..ROOM_CODE_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..ROOM_CODE_ALPHABET.len());
                ROOM_CODE_ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    /// Validates and normalises an externally-supplied code.
    pub fn parse(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        if ROOM_CODE_REGEX.is_match(&upper) {
            Some(Self(upper))
        } else {
            None
        }
    }
}

impl std::ops::Deref for RoomCode {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque per-room player identifier (`p1`, `p2`, ...). Sequence numbers are
/// never reused within a room, even after players leave.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn from_seq(seq: u64) -> Self {
        Self(format!("p{}", seq))
    }
}

impl std::ops::Deref for PlayerId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat message id: `<unixMs>-<6 base36 chars>`.
pub fn chat_message_id(now_ms: u64) -> String {
    const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", now_ms, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_shape() {
        for _ in 0..64 {
            let code = RoomCode::generate();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
            assert!(RoomCode::parse(&code).is_some());
        }
    }

    #[test]
    fn test_room_code_parse_rejects_junk() {
        assert!(RoomCode::parse("").is_none());
        assert!(RoomCode::parse("ABC").is_none());
        assert!(RoomCode::parse("ABCDEFG").is_none());
        assert!(RoomCode::parse("AB CD1").is_none());
        // lowercase input is normalised before validation
        assert_eq!(RoomCode::parse("abq2w9").unwrap().0, "ABQ2W9");
    }

    #[test]
    fn test_player_id_sequence() {
        assert_eq!(PlayerId::from_seq(1).0, "p1");
        assert_eq!(PlayerId::from_seq(42).0, "p42");
    }

    #[test]
    fn test_chat_message_id_format() {
        let id = chat_message_id(1700000000000);
        let (ms, suffix) = id.split_once('-').unwrap();
        assert_eq!(ms, "1700000000000");
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }
}
