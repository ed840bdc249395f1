/// Outcome of scoring one player's round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOutcome {
    pub earned: u32,
    pub next_streak: u32,
    pub multiplier: f64,
}

/// Score floor for very slow correct answers.
const MIN_SPEED_FACTOR: f64 = 0.25;

/// Pure scoring rule.
///
/// A miss (or no submission) earns nothing and resets the streak. A correct
/// answer earns `base_score x multiplier x speed`, where the multiplier grows
/// with the running streak (`1 + streak / streak_step`) so that every
/// consecutive correct round multiplies strictly harder than the previous
/// one, and the speed factor decays linearly over the playing window down to
/// a floor of 0.25.
pub fn apply_score(
    is_correct: bool,
    response_ms: u64,
    playing_ms: u64,
    streak: u32,
    base_score: u32,
    streak_step: u32,
    streak_cap: Option<u32>,
) -> ScoreOutcome {
    if !is_correct {
        return ScoreOutcome {
            earned: 0,
            next_streak: 0,
            multiplier: 1.0,
        };
    }

    let effective_streak = match streak_cap {
        Some(cap) => streak.min(cap),
        None => streak,
    };
    let multiplier = 1.0 + effective_streak as f64 / streak_step.max(1) as f64;

    let speed = if playing_ms == 0 {
        MIN_SPEED_FACTOR
    } else {
        (1.0 - response_ms as f64 / playing_ms as f64).max(MIN_SPEED_FACTOR)
    };

    ScoreOutcome {
        earned: (base_score as f64 * multiplier * speed).round() as u32,
        next_streak: streak + 1,
        multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_resets_streak() {
        let out = apply_score(false, 500, 12_000, 7, 1000, 2, None);
        assert_eq!(out.earned, 0);
        assert_eq!(out.next_streak, 0);
        assert_eq!(out.multiplier, 1.0);
    }

    #[test]
    fn test_multiplier_strictly_increases_on_consecutive_corrects() {
        let mut streak = 0;
        let mut last_multiplier = 0.0;
        for _ in 0..12 {
            let out = apply_score(true, 3000, 12_000, streak, 1000, 2, None);
            assert!(
                out.multiplier > last_multiplier,
                "multiplier must strictly increase: {} then {}",
                last_multiplier,
                out.multiplier
            );
            last_multiplier = out.multiplier;
            streak = out.next_streak;
        }
    }

    #[test]
    fn test_streak_cap_bounds_multiplier() {
        let capped = apply_score(true, 0, 12_000, 50, 1000, 2, Some(10));
        let uncapped = apply_score(true, 0, 12_000, 50, 1000, 2, None);
        assert_eq!(capped.multiplier, 6.0);
        assert!(uncapped.multiplier > capped.multiplier);
    }

    #[test]
    fn test_speed_factor_floor() {
        // A response slower than the window still earns a quarter of base.
        let out = apply_score(true, 20_000, 12_000, 0, 1000, 2, None);
        assert_eq!(out.earned, 250);
    }

    #[test]
    fn test_instant_answer_earns_full_base() {
        let out = apply_score(true, 0, 12_000, 0, 1000, 2, None);
        assert_eq!(out.earned, 1000);
        assert_eq!(out.next_streak, 1);
    }

    #[test]
    fn test_half_window_answer() {
        let out = apply_score(true, 6000, 12_000, 0, 1000, 2, None);
        assert_eq!(out.earned, 500);
    }

    #[test]
    fn test_streak_scales_earnings() {
        // streak 2, step 2 -> multiplier 2.0; instant answer doubles base.
        let out = apply_score(true, 0, 12_000, 2, 1000, 2, None);
        assert_eq!(out.multiplier, 2.0);
        assert_eq!(out.earned, 2000);
    }
}
