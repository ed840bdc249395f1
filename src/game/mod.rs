pub mod choices;
pub mod clock;
pub mod matching;
pub mod media;
pub mod profile;
pub mod scoring;
pub mod session;
pub mod snapshot;
pub mod track;

pub use clock::{Clock, SystemClock};
pub use session::{RoomPhase, RoomSession, RoundMode, SourceMode};
pub use track::{Track, TrackProvider};
