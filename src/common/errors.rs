use serde::{Deserialize, Serialize};

/// Tagged error codes returned across the public operation boundary.
///
/// These serialize as SCREAMING_SNAKE_CASE strings (`ROOM_NOT_FOUND`, ...)
/// and are the only error vocabulary clients ever see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RoomNotFound,
    PlayerNotFound,
    TargetNotFound,
    RoomNotJoinable,
    InvalidPayload,
    InvalidMode,
    InvalidProvider,
    InvalidState,
    HostOnly,
    NoPlayers,
    SourceNotSet,
    PlayersLibraryNotReady,
    PlayersLibrarySyncing,
    PlaylistTracksResolving,
    SpotifyRateLimited,
    NoTracksFound,
    TrackPoolLoadTimeout,
    PlayersLibraryTimeout,
    PlayersLibrarySyncTimeout,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::TargetNotFound => "TARGET_NOT_FOUND",
            Self::RoomNotJoinable => "ROOM_NOT_JOINABLE",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::InvalidMode => "INVALID_MODE",
            Self::InvalidProvider => "INVALID_PROVIDER",
            Self::InvalidState => "INVALID_STATE",
            Self::HostOnly => "HOST_ONLY",
            Self::NoPlayers => "NO_PLAYERS",
            Self::SourceNotSet => "SOURCE_NOT_SET",
            Self::PlayersLibraryNotReady => "PLAYERS_LIBRARY_NOT_READY",
            Self::PlayersLibrarySyncing => "PLAYERS_LIBRARY_SYNCING",
            Self::PlaylistTracksResolving => "PLAYLIST_TRACKS_RESOLVING",
            Self::SpotifyRateLimited => "SPOTIFY_RATE_LIMITED",
            Self::NoTracksFound => "NO_TRACKS_FOUND",
            Self::TrackPoolLoadTimeout => "TRACK_POOL_LOAD_TIMEOUT",
            Self::PlayersLibraryTimeout => "PLAYERS_LIBRARY_TIMEOUT",
            Self::PlayersLibrarySyncTimeout => "PLAYERS_LIBRARY_SYNC_TIMEOUT",
        }
    }

    /// Retryable codes carry a `retryAfterMs` hint for clients.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PlayersLibrarySyncing | Self::PlaylistTracksResolving | Self::SpotifyRateLimited
        )
    }

    /// HTTP status mapped by the transport layer.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::RoomNotFound | Self::PlayerNotFound | Self::TargetNotFound => 404,
            Self::HostOnly => 403,
            Self::InvalidPayload | Self::InvalidMode | Self::InvalidProvider => 400,
            Self::RoomNotJoinable | Self::InvalidState | Self::NoPlayers | Self::SourceNotSet => {
                409
            }
            Self::PlayersLibrarySyncing
            | Self::PlaylistTracksResolving
            | Self::SpotifyRateLimited => 429,
            Self::PlayersLibraryNotReady | Self::NoTracksFound => 422,
            Self::TrackPoolLoadTimeout
            | Self::PlayersLibraryTimeout
            | Self::PlayersLibrarySyncTimeout => 504,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation failure with a tagged code and optional retry hint.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct GameError {
    pub code: ErrorCode,
    pub message: String,
    pub retry_after_ms: Option<u64>,
}

impl GameError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after_ms: None,
        }
    }

    pub fn retryable(code: ErrorCode, message: impl Into<String>, retry_after_ms: u64) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after_ms: Some(retry_after_ms),
        }
    }

    pub fn room_not_found(code: &str) -> Self {
        Self::new(ErrorCode::RoomNotFound, format!("no such room: {}", code))
    }

    pub fn player_not_found(id: &str) -> Self {
        Self::new(ErrorCode::PlayerNotFound, format!("no such player: {}", id))
    }

    pub fn host_only() -> Self {
        Self::new(ErrorCode::HostOnly, "operation restricted to the room host")
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }
}

pub type GameResult<T> = std::result::Result<T, GameError>;
