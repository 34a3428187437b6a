use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Edition and release-type qualifiers stripped by [`clean`] unless the
/// configuration supplies its own list.
pub const DEFAULT_EDITION_QUALIFIERS: &[&str] = &[
    "通常版",
    "体験版",
    "豪華版",
    "完全版",
    "初回限定",
    "限定版",
    "特装版",
    "Remake",
    "HD Remaster",
    "新装版",
    "Premium",
    "豪華絢爛版",
    "デモ",
    "standard edition",
    "trial version",
    "deluxe edition",
    "limited edition",
    "remaster",
];

/// Characters `simplify` cuts a title at.
const SUBTITLE_SEPARATORS: &[char] = &['-', '–', '~', '〜', '—', '―', '－', '～'];

/// Longest run of CJK, kana, latin, digits and dashes.
static MAIN_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{4E00}-\x{9FFF}\x{3040}-\x{309F}\x{30A0}-\x{30FF}A-Za-z0-9\-〜～]+")
        .expect("valid main-keyword regex")
});

static DEFAULT_NORMALIZER: Lazy<TextNormalizer> = Lazy::new(TextNormalizer::default);

/// Canonicalizes titles and names for comparison.
///
/// All operations are total: any string (including the empty one) maps to a
/// string, and each operation is idempotent.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    /// Qualifiers in normalized form, longest first so "hd remaster" wins
    /// over "remaster".
    qualifiers: Vec<String>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::with_qualifiers(DEFAULT_EDITION_QUALIFIERS.iter().copied())
    }
}

impl TextNormalizer {
    pub fn with_qualifiers<I, S>(qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut qualifiers: Vec<String> = qualifiers
            .into_iter()
            .map(|q| normalize(q.as_ref()))
            .filter(|q| !q.is_empty())
            .collect();
        qualifiers.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        qualifiers.dedup();
        Self { qualifiers }
    }

    pub fn normalize(&self, text: &str) -> String {
        normalize(text)
    }

    /// Normalized form with a leading `【…】` annotation and every edition
    /// qualifier removed.
    pub fn clean(&self, text: &str) -> String {
        let mut current = normalize(text);
        loop {
            let next = normalize(&self.strip_once(&current));
            if next == current {
                return current;
            }
            current = next;
        }
    }

    pub fn simplify(&self, text: &str) -> String {
        simplify(text)
    }

    fn strip_once(&self, text: &str) -> String {
        let mut out = strip_bracket_prefix(text).to_string();
        for qualifier in &self.qualifiers {
            if out.contains(qualifier.as_str()) {
                out = out.replace(qualifier.as_str(), "");
            }
        }
        out
    }
}

// ─── Free functions ────────────────────────────────────────

/// Comparison form of `text`: NFKC, unified punctuation and dashes, no
/// whitespace, lowercase.
pub fn normalize(text: &str) -> String {
    let mut current = normalize_once(text);
    // Lowercasing can leave a string outside NFKC; settle it.
    for _ in 0..4 {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// [`TextNormalizer::clean`] with the default qualifier vocabulary.
pub fn clean(text: &str) -> String {
    DEFAULT_NORMALIZER.clean(text)
}

/// Prefix of `text` before the first dash-like separator, trimmed.
///
/// Works on the raw text: normalizing first would turn the katakana long
/// vowel mark into a hyphen and cut words in half.
pub fn simplify(text: &str) -> String {
    let prefix = match text.find(SUBTITLE_SEPARATORS) {
        Some(idx) => &text[..idx],
        None => text,
    };
    prefix.trim().to_string()
}

/// First run of title-like characters in `raw`, or `raw` trimmed when none.
pub fn extract_main_keyword(raw: &str) -> String {
    match MAIN_KEYWORD_RE.find(raw) {
        Some(m) => m.as_str().to_string(),
        None => raw.trim().to_string(),
    }
}

fn normalize_once(text: &str) -> String {
    text.nfkc()
        .filter_map(|c| match c {
            '〜' | '～' | '〰' => Some('~'),
            '’' | '‘' | '´' => Some('\''),
            '“' | '”' | '„' => Some('"'),
            '！' => Some('!'),
            'ー' | '─' | '━' | '―' | '‐' | '‑' | '‒' | '–' | '—' | '﹣' | '－' => Some('-'),
            c if c.is_whitespace() => None,
            c => Some(c),
        })
        .flat_map(char::to_lowercase)
        .collect()
}

fn strip_bracket_prefix(text: &str) -> &str {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('【')
        && let Some(end) = rest.find('】')
    {
        return &rest[end + '】'.len_utf8()..];
    }
    trimmed
}
