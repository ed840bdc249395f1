use std::sync::LazyLock;

use regex::Regex;

/// Dominant language guessed from title+artist text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Japanese,
    Korean,
    French,
    English,
    Latin,
    Other,
}

/// Coarse genre bucket used only to keep MCQ distractors coherent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genre {
    Metal,
    Rock,
    Pop,
    Jpop,
    Kpop,
    Rap,
    Electro,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocal {
    Female,
    Male,
    Mixed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackProfile {
    pub language: Language,
    pub genre: Genre,
    pub vocal: Vocal,
}

const FRENCH_WORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "du", "de", "et", "ou", "je", "tu", "il", "elle",
    "mon", "ma", "mes", "ton", "ta", "tes", "son", "sa", "ses", "au", "aux", "avec", "pour",
    "dans", "sur", "pas", "est", "suis", "nous", "vous", "moi", "toi", "rien", "tout",
];

const ENGLISH_WORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "you", "i", "my", "your", "is", "are", "it", "me",
    "we", "to", "in", "on", "for", "with", "this", "that", "don", "can", "will", "never",
    "all", "what", "when",
];

/// Ordered genre rules; the first hit wins.
static GENRE_RULES: LazyLock<Vec<(Genre, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Genre::Metal,
            Regex::new(r"\b(metal|metallica|megadeth|slayer|iron maiden|rammstein|sabaton|nightwish|slipknot)\b").unwrap(),
        ),
        (
            Genre::Kpop,
            Regex::new(r"\b(k-?pop|bts|blackpink|twice|stray kids|ateez|seventeen|newjeans|itzy|aespa)\b").unwrap(),
        ),
        (
            Genre::Jpop,
            Regex::new(r"\b(j-?pop|anime|opening|ending|yoasobi|ado|radwimps|king gnu|utada|perfume|vocaloid|miku)\b").unwrap(),
        ),
        (
            Genre::Rap,
            Regex::new(r"\b(rap|hip ?hop|trap|freestyle|eminem|drake|kendrick|booba|ninho|nekfeu|jul|damso)\b").unwrap(),
        ),
        (
            Genre::Electro,
            Regex::new(r"\b(electro|edm|house|techno|trance|dubstep|remix|daft punk|david guetta|avicii|tiesto|deadmau5)\b").unwrap(),
        ),
        (
            Genre::Rock,
            Regex::new(r"\b(rock|punk|grunge|nirvana|queen|ac ?dc|foo fighters|arctic monkeys|muse|oasis|radiohead)\b").unwrap(),
        ),
        (
            Genre::Pop,
            Regex::new(r"\b(pop|taylor swift|ariana grande|dua lipa|ed sheeran|katy perry|britney|rihanna)\b").unwrap(),
        ),
    ]
});

/// Markers splitting a credit string into several artists.
static ARTIST_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|x|vs\.?)\s+|\s*[,&]\s*").unwrap());

const FEMALE_FIRST_NAMES: &[&str] = &[
    "aya", "yui", "miku", "hana", "sakura", "emi", "rin", "airi", "mina", "yuki", "aiko",
    "alice", "emma", "sarah", "lisa", "marie", "claire", "anna", "julia", "laura", "nina",
    "amy", "ariana", "billie", "dua", "taylor", "adele", "angele", "louane",
];

const MALE_FIRST_NAMES: &[&str] = &[
    "ken", "taro", "hiro", "takumi", "kenji", "ryo", "john", "david", "michael", "james",
    "paul", "peter", "tom", "jack", "leo", "louis", "hugo", "lucas", "adam", "marc", "ed",
    "bruno", "justin", "drake", "kendrick",
];

fn is_japanese_char(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'    // hiragana
        | '\u{30A0}'..='\u{30FF}'  // katakana
        | '\u{4E00}'..='\u{9FFF}'  // CJK ideographs
        | '\u{FF66}'..='\u{FF9D}'  // halfwidth katakana
    )
}

fn is_korean_char(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

fn detect_language(text: &str) -> Language {
    if text.chars().any(is_japanese_char) {
        return Language::Japanese;
    }
    if text.chars().any(is_korean_char) {
        return Language::Korean;
    }

    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let french_hits = words.iter().filter(|w| FRENCH_WORDS.contains(w)).count();
    let english_hits = words.iter().filter(|w| ENGLISH_WORDS.contains(w)).count();

    if french_hits > english_hits {
        return Language::French;
    }
    if english_hits > 0 {
        return Language::English;
    }

    let is_latin_letter =
        |c: char| c.is_ascii_alphabetic() || matches!(c, '\u{00C0}'..='\u{024F}');
    let has_letters = text.chars().any(|c| c.is_alphabetic());
    if has_letters && text.chars().filter(|c| c.is_alphabetic()).all(is_latin_letter) {
        Language::Latin
    } else {
        Language::Other
    }
}

fn detect_genre(text_lower: &str, language: Language) -> Genre {
    for (genre, rule) in GENRE_RULES.iter() {
        if rule.is_match(text_lower) {
            return *genre;
        }
    }
    // Plain pop in a CJK language reads as its local scene.
    match language {
        Language::Japanese => Genre::Jpop,
        Language::Korean => Genre::Kpop,
        _ => Genre::Other,
    }
}

fn detect_vocal(artist: &str) -> Vocal {
    let parts: Vec<&str> = ARTIST_SPLIT
        .split(artist)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() > 1 {
        return Vocal::Mixed;
    }

    let lower = artist.to_lowercase();
    if lower.contains("girls") || lower.contains("sisters") || lower.contains("ladies") {
        return Vocal::Female;
    }
    if lower.contains("boys") || lower.contains("brothers") {
        return Vocal::Male;
    }

    let first = lower
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty());
    match first {
        Some(name) if FEMALE_FIRST_NAMES.contains(&name) => Vocal::Female,
        Some(name) if MALE_FIRST_NAMES.contains(&name) => Vocal::Male,
        _ => Vocal::Unknown,
    }
}

/// Derives `(language, genre, vocal)` tags from a track's title and artist.
pub fn profile_track(title: &str, artist: &str) -> TrackProfile {
    let text = format!("{} {}", title, artist);
    let language = detect_language(&text);
    let genre = detect_genre(&text.to_lowercase(), language);
    let vocal = detect_vocal(artist);
    TrackProfile {
        language,
        genre,
        vocal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_by_script() {
        assert_eq!(
            profile_track("残酷な天使のテーゼ", "高橋洋子").language,
            Language::Japanese
        );
        assert_eq!(profile_track("강남스타일", "싸이").language, Language::Korean);
        // katakana only
        assert_eq!(profile_track("サクラ", "ヨルシカ").language, Language::Japanese);
    }

    #[test]
    fn test_language_by_function_words() {
        assert_eq!(
            profile_track("Dans la nuit", "Les Ombres").language,
            Language::French
        );
        assert_eq!(
            profile_track("The Sound of Silence", "Simon").language,
            Language::English
        );
        assert_eq!(profile_track("Bésame Mucho", "Trio").language, Language::Latin);
    }

    #[test]
    fn test_genre_rules_ordered() {
        assert_eq!(profile_track("Master of Puppets", "Metallica").genre, Genre::Metal);
        assert_eq!(profile_track("Dynamite", "BTS").genre, Genre::Kpop);
        assert_eq!(profile_track("Idol", "YOASOBI").genre, Genre::Jpop);
        assert_eq!(profile_track("Lose Yourself", "Eminem").genre, Genre::Rap);
        assert_eq!(profile_track("One More Time", "Daft Punk").genre, Genre::Electro);
        assert_eq!(profile_track("Smells Like Teen Spirit", "Nirvana").genre, Genre::Rock);
        assert_eq!(profile_track("Anti-Hero", "Taylor Swift").genre, Genre::Pop);
        assert_eq!(profile_track("Untitled", "Somebody").genre, Genre::Other);
    }

    #[test]
    fn test_japanese_fallback_genre_is_jpop() {
        assert_eq!(profile_track("夜に駆ける", "ヨルシカ").genre, Genre::Jpop);
    }

    #[test]
    fn test_vocal_markers() {
        assert_eq!(profile_track("Song", "A feat. B").vocal, Vocal::Mixed);
        assert_eq!(profile_track("Song", "A & B").vocal, Vocal::Mixed);
        assert_eq!(profile_track("Song", "Alice Martin").vocal, Vocal::Female);
        assert_eq!(profile_track("Song", "David Guetta").vocal, Vocal::Male);
        assert_eq!(profile_track("Song", "Unknown Band").vocal, Vocal::Unknown);
    }
}
