use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::game::track::Track;

/// Canonicalises free text for comparison: NFKD, strip combining marks,
/// lowercase, squash anything outside `[a-z0-9 ]` to a space, collapse runs
/// of whitespace.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for c in s.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Classic two-row Levenshtein over bytes (inputs are already normalised to
/// ASCII).
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Minimum normalised length for the prefix/suffix shortcut. Applied to the
/// variant, and also to the submission so one or two letters never match a
/// whole title.
const PARTIAL_MIN_LEN: usize = 4;

fn fuzzy_matches(submission_norm: &str, variant: &str) -> bool {
    let variant_norm = normalize(variant);
    if variant_norm.is_empty() {
        return false;
    }
    if submission_norm == variant_norm {
        return true;
    }

    let max_distance = (variant_norm.len() / 6).max(1);
    if levenshtein(submission_norm, &variant_norm) <= max_distance {
        return true;
    }

    variant_norm.len() >= PARTIAL_MIN_LEN
        && submission_norm.len() >= PARTIAL_MIN_LEN
        && (variant_norm.starts_with(submission_norm) || variant_norm.ends_with(submission_norm))
}

/// MCQ answers must equal the canonical `"title - artist"` label.
pub fn is_correct_choice(submission: &str, track: &Track) -> bool {
    let sub = normalize(submission);
    !sub.is_empty() && sub == normalize(&track.canonical_label())
}

/// Builds the accepted variant set for free-text answering: title, artist,
/// their combinations, and the same shapes over romanized forms when the
/// romanizer cache has them.
pub fn text_variants(
    track: &Track,
    romaji_title: Option<&str>,
    romaji_artist: Option<&str>,
) -> Vec<String> {
    let title = track.title.as_str();
    let artist = track.artist.as_str();

    let mut title_forms = vec![title.to_string()];
    if let Some(rt) = romaji_title {
        if !rt.is_empty() && rt != title {
            title_forms.push(rt.to_string());
        }
    }
    let mut artist_forms = vec![artist.to_string()];
    if let Some(ra) = romaji_artist {
        if !ra.is_empty() && ra != artist {
            artist_forms.push(ra.to_string());
        }
    }

    let mut variants = Vec::new();
    for t in &title_forms {
        variants.push(t.clone());
    }
    for a in &artist_forms {
        variants.push(a.clone());
    }
    for t in &title_forms {
        for a in &artist_forms {
            variants.push(format!("{} {}", t, a));
            variants.push(format!("{} - {}", t, a));
        }
    }
    variants
}

/// Free-text answers fuzzy-match any variant.
pub fn is_correct_text(submission: &str, variants: &[String]) -> bool {
    let sub = normalize(submission);
    if sub.is_empty() {
        return false;
    }
    variants.iter().any(|v| fuzzy_matches(&sub, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::track::TrackProvider;

    fn track(title: &str, artist: &str) -> Track {
        Track {
            provider: TrackProvider::Youtube,
            id: "yt1".to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            preview_url: None,
            source_url: None,
            duration_sec: None,
        }
    }

    #[test]
    fn test_normalize_strips_marks_and_punctuation() {
        assert_eq!(normalize("Élan Vital!"), "elan vital");
        assert_eq!(normalize("  Don't  Stop—Me  "), "don t stop me");
        assert_eq!(normalize("Ｆｕｌｌｗｉｄｔｈ"), "fullwidth");
        assert_eq!(normalize("***"), "");
    }

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_mcq_requires_exact_label() {
        let t = track("Alpha Song", "Neon Waves");
        assert!(is_correct_choice("Alpha Song - Neon Waves", &t));
        assert!(is_correct_choice("alpha song   neon waves", &t));
        assert!(!is_correct_choice("Alpha Song", &t));
        assert!(!is_correct_choice("", &t));
    }

    #[test]
    fn test_text_accepts_title_or_artist() {
        let t = track("Beta Lights", "City Echo");
        let variants = text_variants(&t, None, None);
        assert!(is_correct_text("beta lights", &variants));
        assert!(is_correct_text("City Echo", &variants));
        assert!(is_correct_text("beta lights city echo", &variants));
        assert!(is_correct_text("Beta Lights - City Echo", &variants));
        assert!(!is_correct_text("gamma", &variants));
    }

    #[test]
    fn test_text_tolerates_small_typos() {
        let t = track("Bohemian Rhapsody", "Queen");
        let variants = text_variants(&t, None, None);
        // "bohemian rhapsody" is 17 normalised chars -> distance budget 2
        assert!(is_correct_text("bohemian rapsody", &variants));
        assert!(is_correct_text("bohemian rhapsodie", &variants));
        // long-enough prefixes of a variant are accepted too
        assert!(is_correct_text("bohemian", &variants));
        assert!(!is_correct_text("queen of hearts", &variants));
    }

    #[test]
    fn test_text_prefix_suffix_rule() {
        let t = track("Supercalifragilistic", "Julie");
        let variants = text_variants(&t, None, None);
        assert!(is_correct_text("supercali", &variants));
        assert!(!is_correct_text("sup", &variants)); // below the 4-char floor
    }

    #[test]
    fn test_romaji_variants_accepted() {
        let t = track("残酷な天使のテーゼ", "高橋洋子");
        let variants = text_variants(
            &t,
            Some("Zankoku na Tenshi no These"),
            Some("Yoko Takahashi"),
        );
        assert!(is_correct_text("zankoku na tenshi no these", &variants));
        assert!(is_correct_text("yoko takahashi", &variants));
        assert!(is_correct_text(
            "zankoku na tenshi no these - yoko takahashi",
            &variants
        ));
        assert!(!is_correct_text("evangelion", &variants));
    }

    #[test]
    fn test_distance_budget_has_minimum_of_one() {
        let t = track("Ace", "Bo");
        let variants = text_variants(&t, None, None);
        // len 3 -> floor(3/6) = 0, bumped to 1
        assert!(is_correct_text("aci", &variants));
    }
}
