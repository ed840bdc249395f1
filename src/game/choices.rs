use rand::seq::SliceRandom;

use crate::game::{
    matching::normalize,
    profile::{Genre, Language, TrackProfile, Vocal, profile_track},
    track::Track,
};

/// MCQ rounds always present exactly four options.
pub const MCQ_OPTION_COUNT: usize = 4;

/// How well a candidate distractor fits next to the round's answer track.
/// Higher is more plausible; candidates below the acceptance threshold are
/// never shown.
pub fn coherence_score(
    source: &TrackProfile,
    candidate: &TrackProfile,
    source_artist: &str,
    candidate_artist: &str,
) -> i32 {
    let mut score = 0;

    if source.language == candidate.language {
        score += 80;
    }
    if source.genre == candidate.genre {
        score += 45;
    }
    if source.vocal != Vocal::Unknown && source.vocal == candidate.vocal {
        score += 25;
    }

    if normalize(source_artist) == normalize(candidate_artist) {
        // Same artist would leak the answer's neighbourhood.
        score -= 20;
    }

    score -= language_mismatch_penalty(source.language, candidate.language);

    if source.genre != Genre::Other && candidate.genre != source.genre {
        score -= 15;
    }

    score
}

/// Asymmetric penalties: a French source track surrounded by English labels
/// is far more jarring than the reverse.
fn language_mismatch_penalty(source: Language, candidate: Language) -> i32 {
    if source == candidate {
        return 0;
    }
    match source {
        Language::French => {
            if candidate == Language::English {
                55
            } else {
                30
            }
        }
        Language::English => {
            if candidate == Language::Latin {
                0
            } else if candidate == Language::French {
                35
            } else {
                25
            }
        }
        Language::Japanese => 40,
        Language::Korean => 35,
        _ => 0,
    }
}

/// Coherence floor; stricter for languages where an off-language distractor
/// is an instant give-away.
pub fn min_acceptance_score(source_language: Language) -> i32 {
    match source_language {
        Language::Japanese | Language::Korean | Language::French => 35,
        _ => 15,
    }
}

/// Assembles the four MCQ options for a round: the answer's canonical label
/// plus the three most coherent distinct distractor labels. Returns `None`
/// when the candidate pool cannot produce four unique coherent options, in
/// which case the round must fall back to free-text before the game starts.
pub fn build_choices(answer: &Track, candidates: &[&Track]) -> Option<Vec<String>> {
    let correct = answer.canonical_label();
    let correct_norm = normalize(&correct);
    let source_profile = profile_track(&answer.title, &answer.artist);
    let threshold = min_acceptance_score(source_profile.language);

    let mut scored: Vec<(i32, &Track)> = candidates
        .iter()
        .filter(|c| normalize(&c.canonical_label()) != correct_norm)
        .map(|c| {
            let profile = profile_track(&c.title, &c.artist);
            (
                coherence_score(&source_profile, &profile, &answer.artist, &c.artist),
                *c,
            )
        })
        .collect();

    let mut rng = rand::thread_rng();
    scored.shuffle(&mut rng);
    // Stable sort keeps the shuffled order among equal scores.
    scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));

    let mut options = vec![correct];
    let mut seen = vec![correct_norm];
    for (score, track) in scored {
        if options.len() == MCQ_OPTION_COUNT {
            break;
        }
        if score < threshold {
            // Ranked descending: nothing below passes either.
            break;
        }
        let label = track.canonical_label();
        let label_norm = normalize(&label);
        if seen.contains(&label_norm) {
            continue;
        }
        seen.push(label_norm);
        options.push(label);
    }

    if options.len() < MCQ_OPTION_COUNT {
        return None;
    }

    options.shuffle(&mut rng);
    Some(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::track::TrackProvider;

    fn track(id: &str, title: &str, artist: &str) -> Track {
        Track {
            provider: TrackProvider::Youtube,
            id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            preview_url: None,
            source_url: None,
            duration_sec: None,
        }
    }

    #[test]
    fn test_same_profile_scores_high() {
        let p = profile_track("The Night We Met", "Lord Huron");
        let q = profile_track("The Sound of Silence", "Simon");
        let score = coherence_score(&p, &q, "Lord Huron", "Simon");
        assert!(score >= 80, "same-language candidates should pass: {}", score);
    }

    #[test]
    fn test_french_source_penalises_english_candidate() {
        let fr = profile_track("Dans la nuit", "Les Ombres");
        let en = profile_track("The Sound of Silence", "Simon");
        let score = coherence_score(&fr, &en, "Les Ombres", "Simon");
        assert!(
            score < min_acceptance_score(fr.language),
            "fr->en must fall below threshold: {}",
            score
        );
    }

    #[test]
    fn test_english_source_penalises_french_candidate() {
        let en = profile_track("The Sound of Silence", "Simon");
        let fr = profile_track("Dans la nuit", "Les Ombres");
        // en->fr carries its own -35, heavier than the generic -25.
        let to_french = coherence_score(&en, &fr, "Simon", "Les Ombres");
        assert!(
            to_french < min_acceptance_score(en.language),
            "en->fr must fall below threshold: {}",
            to_french
        );

        let other = TrackProfile {
            language: Language::Other,
            genre: en.genre,
            vocal: en.vocal,
        };
        let to_other = coherence_score(&en, &other, "Simon", "Trio");
        assert!(to_french < to_other);
    }

    #[test]
    fn test_same_artist_penalty_applies() {
        let p = profile_track("The First Song", "The Band");
        let with = coherence_score(&p, &p, "The Band", "The Band");
        let without = coherence_score(&p, &p, "The Band", "The Other Band");
        assert_eq!(with + 20, without);
    }

    #[test]
    fn test_build_choices_has_four_unique_with_answer() {
        let answer = track("a", "The Night We Met", "Lord Huron");
        let pool = vec![
            track("b", "The Sound of Silence", "Simon"),
            track("c", "The House of the Rising Sun", "Animals"),
            track("d", "The Times They Are Changing", "Bob Dylan"),
            track("e", "The Boxer", "Simon"),
        ];
        let refs: Vec<&Track> = pool.iter().collect();
        let choices = build_choices(&answer, &refs).expect("enough coherent candidates");

        assert_eq!(choices.len(), MCQ_OPTION_COUNT);
        assert!(choices.contains(&"The Night We Met - Lord Huron".to_string()));
        let mut unique: Vec<String> = choices.iter().map(|c| normalize(c)).collect();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), MCQ_OPTION_COUNT);
    }

    #[test]
    fn test_build_choices_fails_without_enough_candidates() {
        let answer = track("a", "Alpha Song", "Neon Waves");
        let pool = vec![track("b", "Beta Lights", "City Echo")];
        let refs: Vec<&Track> = pool.iter().collect();
        assert!(build_choices(&answer, &refs).is_none());
    }

    #[test]
    fn test_build_choices_excludes_duplicate_labels() {
        let answer = track("a", "The Night We Met", "Lord Huron");
        let pool = vec![
            track("b", "The Boxer", "Simon"),
            track("c", "The Boxer", "Simon"), // same label, different id
            track("d", "The Sound of Silence", "Simon"),
        ];
        let refs: Vec<&Track> = pool.iter().collect();
        // Only two distinct coherent labels -> cannot fill four options.
        assert!(build_choices(&answer, &refs).is_none());
    }

    #[test]
    fn test_japanese_source_rejects_english_distractors() {
        let answer = track("a", "残酷な天使のテーゼ", "高橋洋子");
        let pool = vec![
            track("b", "The Sound of Silence", "Simon"),
            track("c", "The Boxer", "Simon"),
            track("d", "The House of the Rising Sun", "Animals"),
        ];
        let refs: Vec<&Track> = pool.iter().collect();
        assert!(build_choices(&answer, &refs).is_none());
    }
}
