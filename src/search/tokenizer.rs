// Tokenization profiles for the derived search index. The platform serves
// an English/Turkish user base, so queries and documents can be normalized
// under either language or a combined profile for mixed corpora.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("word pattern"));

static EN_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has",
        "have", "he", "her", "his", "i", "if", "in", "is", "it", "its", "no", "not", "of", "on",
        "or", "our", "she", "so", "that", "the", "their", "them", "they", "this", "to", "was",
        "we", "were", "will", "with", "you", "your",
    ]
    .into_iter()
    .collect()
});

static TR_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "acaba", "ama", "ancak", "bir", "biz", "bu", "da", "daha", "de", "değil", "diye", "en",
        "gibi", "her", "hiç", "ile", "ise", "için", "kadar", "ki", "mi", "mu", "mü", "mı", "ne",
        "neden", "o", "sen", "siz", "ve", "veya", "ya", "yani", "çok", "çünkü", "şu",
    ]
    .into_iter()
    .collect()
});

/// Language profile a query or document is normalized under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    English,
    Turkish,
    /// Combined profile for mixed-language corpora.
    Bilingual,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::English, Profile::Turkish, Profile::Bilingual];

    pub fn idx(self) -> usize {
        match self {
            Profile::English => 0,
            Profile::Turkish => 1,
            Profile::Bilingual => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::English => "english",
            Profile::Turkish => "turkish",
            Profile::Bilingual => "bilingual",
        }
    }

    /// Accepts the names the legacy API used as well ("bilingual_tr_en").
    pub fn parse(s: &str) -> Option<Profile> {
        match s.to_ascii_lowercase().as_str() {
            "english" | "en" => Some(Profile::English),
            "turkish" | "tr" => Some(Profile::Turkish),
            "bilingual" | "bilingual_tr_en" | "combined" => Some(Profile::Bilingual),
            _ => None,
        }
    }
}

/// Lowercase with the dotted capital İ folded to plain "i" instead of the
/// combining-dot sequence the standard mapping produces.
fn fold_latin(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        match c {
            'İ' => out.push('i'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Turkish case folding: I→ı and İ→i, everything else standard.
fn fold_turkish(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        match c {
            'I' => out.push('ı'),
            'İ' => out.push('i'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Light English suffix stripping: possessives, plurals, and the common
/// participle endings. Not a full stemmer; enough to line queries up with
/// document forms.
fn strip_suffix_en(token: &str) -> String {
    let mut t = token;
    if let Some(stripped) = t.strip_suffix("'s") {
        t = stripped;
    }
    let len = t.chars().count();
    if len > 5 {
        if let Some(stripped) = t.strip_suffix("ing") {
            return stripped.to_string();
        }
    }
    if len > 4 {
        if let Some(stripped) = t.strip_suffix("ies") {
            let mut s = stripped.to_string();
            s.push('y');
            return s;
        }
        if let Some(stripped) = t.strip_suffix("ed") {
            return stripped.to_string();
        }
        // "es" only follows sibilant endings; elsewhere the plural is a
        // bare "s" ("recipes" -> "recipe", not "recip").
        for sibilant in ["ses", "xes", "zes", "ches", "shes"] {
            if t.ends_with(sibilant) {
                return t[..t.len() - 2].to_string();
            }
        }
    }
    if len > 3 && !t.ends_with("ss") && !t.ends_with("us") {
        if let Some(stripped) = t.strip_suffix('s') {
            return stripped.to_string();
        }
    }
    t.to_string()
}

/// Tokenize `text` under `profile`, preserving order (phrase matching
/// relies on token adjacency). Stopwords are removed; single characters
/// are dropped.
pub fn tokenize(text: &str, profile: Profile) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in WORD_RE.find_iter(text) {
        let raw = word.as_str();
        let token = match profile {
            Profile::English => {
                let folded = fold_latin(raw);
                if EN_STOPWORDS.contains(folded.as_str()) {
                    continue;
                }
                strip_suffix_en(&folded)
            }
            Profile::Turkish => {
                let folded = fold_turkish(raw);
                if TR_STOPWORDS.contains(folded.as_str()) {
                    continue;
                }
                folded
            }
            Profile::Bilingual => {
                // One deterministic folding for both sides of a match; a
                // token is dropped only when both languages stop it.
                let folded = fold_latin(raw);
                if EN_STOPWORDS.contains(folded.as_str())
                    && TR_STOPWORDS.contains(folded.as_str())
                {
                    continue;
                }
                if folded.is_ascii() {
                    strip_suffix_en(&folded)
                } else {
                    folded
                }
            }
        };
        if token.chars().count() < 2 {
            continue;
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_folds_and_strips() {
        let tokens = tokenize("The runner was running fast", Profile::English);
        assert_eq!(tokens, vec!["runner", "runn", "fast"]);
    }

    #[test]
    fn english_drops_stopwords() {
        let tokens = tokenize("a cat and the dog", Profile::English);
        assert_eq!(tokens, vec!["cat", "dog"]);
    }

    #[test]
    fn turkish_case_folding() {
        // Dotted and dotless I fold per Turkish rules.
        let tokens = tokenize("ISPARTA İstanbul", Profile::Turkish);
        assert_eq!(tokens, vec!["ısparta", "istanbul"]);
    }

    #[test]
    fn turkish_keeps_surface_forms() {
        let tokens = tokenize("çaylar ve kitaplar", Profile::Turkish);
        assert_eq!(tokens, vec!["çaylar", "kitaplar"]);
    }

    #[test]
    fn bilingual_matches_both_sides() {
        // The same folding applies to documents and queries, so mixed
        // content stays matchable.
        let doc = tokenize("Kahve break at İstanbul office", Profile::Bilingual);
        let query = tokenize("istanbul kahve", Profile::Bilingual);
        for term in query {
            assert!(doc.contains(&term), "missing {}", term);
        }
    }

    #[test]
    fn plural_query_matches_singular_document() {
        let doc = tokenize("my favorite recipe", Profile::English);
        let query = tokenize("recipes", Profile::English);
        assert_eq!(query, vec!["recipe"]);
        assert!(doc.contains(&query[0]));
    }
}
