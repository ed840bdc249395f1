use crate::game::track::{Track, TrackProvider};

/// Minimum track length before a random start offset is worth it.
const OFFSET_MIN_DURATION_SEC: u32 = 45;
/// Never start inside the intro or the outro.
const OFFSET_LEAD_IN_SEC: u64 = 18;
const OFFSET_TAIL_SEC: u64 = 20;

/// Stable non-cryptographic hash (FNV-1a, 64-bit).
fn fnv1a64(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in input.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Maps a seed into `[min, max]` deterministically: the same seed always
/// lands on the same value, so repeated snapshots never jump around.
pub fn deterministic_int(seed: &str, min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    min + fnv1a64(seed) % (max - min + 1)
}

/// Start offset (seconds) for a round's YouTube embed. Zero unless the track
/// is a YouTube item long enough to skip into.
pub fn youtube_start_offset(room_code: &str, round: usize, track: &Track) -> u64 {
    if track.provider != TrackProvider::Youtube {
        return 0;
    }
    let Some(duration) = track.duration_sec else {
        return 0;
    };
    if duration < OFFSET_MIN_DURATION_SEC {
        return 0;
    }
    let seed = format!("{}:{}:{}", room_code, round, track.id);
    deterministic_int(&seed, OFFSET_LEAD_IN_SEC, duration as u64 - OFFSET_TAIL_SEC)
}

/// Client-side embed URL for the round's media, when one can be built.
pub fn embed_url(room_code: &str, round: usize, track: &Track) -> Option<String> {
    match track.provider {
        TrackProvider::Youtube => {
            let start = youtube_start_offset(room_code, round, track);
            Some(format!(
                "https://www.youtube.com/embed/{}?autoplay=1&start={}",
                track.id, start
            ))
        }
        TrackProvider::Animethemes => track.source_url.clone(),
        _ => track
            .source_url
            .as_deref()
            .filter(|url| url.contains("youtube.com") || url.contains("youtu.be"))
            .map(|url| url.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn youtube_track(id: &str, duration_sec: u32) -> Track {
        Track {
            provider: TrackProvider::Youtube,
            id: id.to_string(),
            title: "t".to_string(),
            artist: "a".to_string(),
            preview_url: None,
            source_url: None,
            duration_sec: Some(duration_sec),
        }
    }

    #[test]
    fn test_offset_is_deterministic() {
        let t = youtube_track("dQw4w9WgXcQ", 212);
        let a = youtube_start_offset("K7QW2N", 3, &t);
        let b = youtube_start_offset("K7QW2N", 3, &t);
        assert_eq!(a, b);
    }

    #[test]
    fn test_offset_stays_in_bounds() {
        for dur in [45u32, 60, 90, 212, 600] {
            let t = youtube_track("vid", dur);
            for round in 1..=10 {
                let start = youtube_start_offset("ABCDEF", round, &t);
                assert!(start >= 18, "start {} below lead-in", start);
                assert!(start <= dur as u64 - 20, "start {} past tail", start);
            }
        }
    }

    #[test]
    fn test_offset_varies_with_seed() {
        let t = youtube_track("vid", 600);
        let offsets: Vec<u64> = (1..=20)
            .map(|round| youtube_start_offset("ABCDEF", round, &t))
            .collect();
        let first = offsets[0];
        assert!(offsets.iter().any(|&o| o != first));
    }

    #[test]
    fn test_short_tracks_start_at_zero() {
        let t = youtube_track("vid", 44);
        assert_eq!(youtube_start_offset("ABCDEF", 1, &t), 0);
    }

    #[test]
    fn test_non_youtube_has_no_offset() {
        let mut t = youtube_track("vid", 300);
        t.provider = TrackProvider::Deezer;
        assert_eq!(youtube_start_offset("ABCDEF", 1, &t), 0);
    }

    #[test]
    fn test_embed_url_includes_start() {
        let t = youtube_track("dQw4w9WgXcQ", 212);
        let url = embed_url("K7QW2N", 1, &t).unwrap();
        assert!(url.starts_with("https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1&start="));
        // same inputs, same URL
        assert_eq!(url, embed_url("K7QW2N", 1, &t).unwrap());
    }
}
