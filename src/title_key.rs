//! Coarse headline similarity key used as the fallback duplicate group.
//!
//! Two headlines that differ only in punctuation, casing, filler words or a
//! trailing clause collapse onto the same key, e.g.
//! `"NVIDIA beats estimates, shares jump"` and `"Nvidia Beats Estimates!"`
//! both map to `nvidia_beats_estimates`.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Key returned when nothing meaningful survives normalization.
pub const UNKNOWN_KEY: &str = "unknown";

/// Number of leading content tokens that make up a key.
const KEY_TOKENS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "onto", "over", "under", "after", "before",
    "amid", "about", "are", "was", "were", "been", "has", "have", "had", "its", "this", "that",
    "these", "those", "than", "then", "says", "said", "will", "would", "could", "may", "might",
    "new", "report", "reports", "update", "breaking", "live", "just",
];

fn strip_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("title strip regex"))
}

/// Build the similarity key for a headline.
///
/// Lower-cases, removes everything that is not a letter, digit or whitespace,
/// drops stop words and tokens of two characters or fewer, then joins the
/// first three remaining tokens with `_`.
pub fn title_key(title: &str) -> String {
    // Feed titles routinely carry entities (`&amp;`, `&#8217;`).
    let decoded = html_escape::decode_html_entities(title);
    let lowered = decoded.to_lowercase();
    let stripped = strip_re().replace_all(&lowered, "");

    let key = stripped
        .split_whitespace()
        .filter(|tok| tok.chars().count() > 2)
        .filter(|tok| !STOP_WORDS.contains(tok))
        .take(KEY_TOKENS)
        .collect::<Vec<_>>()
        .join("_");

    if key.is_empty() {
        UNKNOWN_KEY.to_string()
    } else {
        key
    }
}
