use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Music/anime providers a track can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackProvider {
    Spotify,
    Deezer,
    Youtube,
    Animethemes,
    Anilist,
}

impl TrackProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::Deezer => "deezer",
            Self::Youtube => "youtube",
            Self::Animethemes => "animethemes",
            Self::Anilist => "anilist",
        }
    }

    /// Parses an externally-supplied provider name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spotify" => Some(Self::Spotify),
            "deezer" => Some(Self::Deezer),
            "youtube" => Some(Self::Youtube),
            "animethemes" => Some(Self::Animethemes),
            "anilist" => Some(Self::Anilist),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hosts whose embedded players the game can actually drive.
static PLAYABLE_HOST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(?:[a-z0-9-]+\.)*(youtube\.com|youtu\.be|animethemes\.moe)(?:[/:]|$)")
        .unwrap()
});

/// Promotional filler some providers inject into playlists and libraries.
/// Matched case-insensitively against `"<title> <artist>"`.
static PROMO_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(this app|download app|free music alternative|best free music)\b",
        r"(?i)\bspotify\b.*\b(app|alternative|free)\b",
        r"(?i)\bdeezer\s*-\s*deezer\b",
        r"(?i)\bdeezer session\b",
        r"(?i)\bheartify\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// A playable item in a room's pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub provider: TrackProvider,
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u32>,
}

impl Track {
    /// `"<title> - <artist>"`, the label players must identify.
    pub fn canonical_label(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }

    /// De-duplication key across providers and fetches.
    pub fn signature(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.provider.as_str(),
            self.id,
            self.title.to_lowercase(),
            self.artist.to_lowercase()
        )
    }

    /// A track is playable when it comes from YouTube or AnimeThemes, or its
    /// source URL points at one of their hosts.
    pub fn is_playable(&self) -> bool {
        if matches!(
            self.provider,
            TrackProvider::Youtube | TrackProvider::Animethemes
        ) {
            return true;
        }
        self.source_url
            .as_deref()
            .is_some_and(|url| PLAYABLE_HOST_REGEX.is_match(url))
    }

    pub fn is_promotional(&self) -> bool {
        let text = format!("{} {}", self.title, self.artist);
        PROMO_RULES.iter().any(|rule| rule.is_match(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(provider: TrackProvider, title: &str, artist: &str) -> Track {
        Track {
            provider,
            id: "t1".to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            preview_url: None,
            source_url: None,
            duration_sec: None,
        }
    }

    #[test]
    fn test_playability_by_provider() {
        assert!(track(TrackProvider::Youtube, "a", "b").is_playable());
        assert!(track(TrackProvider::Animethemes, "a", "b").is_playable());
        assert!(!track(TrackProvider::Deezer, "a", "b").is_playable());
        assert!(!track(TrackProvider::Spotify, "a", "b").is_playable());
    }

    #[test]
    fn test_playability_by_source_url() {
        let mut t = track(TrackProvider::Deezer, "a", "b");
        t.source_url = Some("https://www.youtube.com/watch?v=abc".to_string());
        assert!(t.is_playable());

        t.source_url = Some("https://youtu.be/abc".to_string());
        assert!(t.is_playable());

        t.source_url = Some("https://v.animethemes.moe/Clip.webm".to_string());
        assert!(t.is_playable());

        t.source_url = Some("https://example.com/youtube.com/fake".to_string());
        assert!(!t.is_playable());

        t.source_url = Some("https://notyoutube.community/x".to_string());
        assert!(!t.is_playable());
    }

    #[test]
    fn test_promotional_detection() {
        assert!(track(TrackProvider::Deezer, "Deezer - Deezer", "Deezer").is_promotional());
        assert!(track(TrackProvider::Deezer, "Deezer Session", "Various").is_promotional());
        assert!(track(TrackProvider::Spotify, "Try this APP now", "Ad").is_promotional());
        assert!(track(TrackProvider::Spotify, "Spotify free trial", "x").is_promotional());
        assert!(track(TrackProvider::Youtube, "heartify mix", "dj").is_promotional());
        assert!(!track(TrackProvider::Youtube, "Heart of Glass", "Blondie").is_promotional());
    }

    #[test]
    fn test_signature_is_case_insensitive_on_text() {
        let a = track(TrackProvider::Deezer, "Alpha Song", "Neon Waves");
        let b = track(TrackProvider::Deezer, "ALPHA SONG", "neon waves");
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_canonical_label() {
        let t = track(TrackProvider::Youtube, "Alpha Song", "Neon Waves");
        assert_eq!(t.canonical_label(), "Alpha Song - Neon Waves");
    }
}
