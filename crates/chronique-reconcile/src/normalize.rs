//! Text canonicalization for short bibliographic strings.
//!
//! Tuned for titles and names, not paragraphs: diacritics, case,
//! punctuation and typography variants are folded away; apostrophes
//! survive because they separate words in French titles while also
//! appearing as "no separator" or a space in noisy transcriptions.

use regex::Regex;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

enum Class {
    Keep(char),
    Expand(&'static str),
    Apostrophe,
    Separator,
}

fn classify(ch: char) -> Class {
    match ch {
        'œ' => Class::Expand("oe"),
        'æ' => Class::Expand("ae"),
        '\'' | '’' | 'ʼ' | '`' | '´' => Class::Apostrophe,
        c if c.is_alphanumeric() => Class::Keep(c),
        // hyphen, en/em dash, all other punctuation and whitespace
        _ => Class::Separator,
    }
}

/// Canonical comparison form. Total and pure; `"" -> ""`.
///
/// Unicode-decomposes, strips combining marks, lowercases, expands
/// ligatures, unifies apostrophe variants to `'` and collapses every
/// other separator run to a single space. An apostrophe absorbs
/// adjacent spaces so `l' amour` and `l'amour` normalize identically.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    // pending separator run; true once it contains an apostrophe
    let mut pending: Option<bool> = None;

    let mut push_sep_then = |out: &mut String, pending: &mut Option<bool>| {
        if let Some(has_apostrophe) = pending.take()
            && !out.is_empty()
        {
            out.push(if has_apostrophe { '\'' } else { ' ' });
        }
    };

    for ch in input.nfd().filter(|c| !is_combining_mark(*c)) {
        for low in ch.to_lowercase() {
            match classify(low) {
                Class::Keep(c) => {
                    push_sep_then(&mut out, &mut pending);
                    out.push(c);
                }
                Class::Expand(s) => {
                    push_sep_then(&mut out, &mut pending);
                    out.push_str(s);
                }
                Class::Apostrophe => pending = Some(true),
                Class::Separator => pending = Some(pending.unwrap_or(false)),
            }
        }
    }
    // a trailing separator run is dropped
    out
}

fn pattern_body(normalized: &str) -> String {
    let chars: Vec<char> = normalized.chars().collect();
    let mut body = String::with_capacity(normalized.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            ' ' => {
                body.push_str(r"[\s'’\-–—]+");
                i += 1;
            }
            '\'' => {
                body.push_str(r"(?:['’]|\s)?");
                i += 1;
            }
            'o' if chars.get(i + 1) == Some(&'e') => {
                body.push_str("(?:oe|œ)");
                i += 2;
            }
            'a' if chars.get(i + 1) == Some(&'e') => {
                body.push_str("(?:ae|æ)");
                i += 2;
            }
            // normalize() only emits alphanumerics beyond the above,
            // so no regex escaping is needed here
            c => {
                body.push(c);
                i += 1;
            }
        }
    }
    body
}

/// Anchored, typography-insensitive pattern for whole-string equality.
pub fn match_pattern(input: &str) -> Regex {
    let body = pattern_body(&normalize(input));
    Regex::new(&format!("^(?:{body})$")).expect("valid match pattern")
}

/// Unanchored variant for substring (truncated-title) matching.
pub fn search_pattern(input: &str) -> Regex {
    Regex::new(&pattern_body(&normalize(input))).expect("valid search pattern")
}
