//! Slug derivation for locations.
//!
//! A slug is `name` + `city` transliterated to ASCII, lower-cased, with every
//! run of non-alphanumeric characters collapsed to one `-`.

use std::collections::HashSet;

use deunicode::deunicode;

const FALLBACK_SLUG: &str = "location";

/// Transliterate to ASCII, lower-case, and collapse every run of other
/// characters into a single `-`.
pub fn slugify(input: &str) -> String {
    let ascii = deunicode(input);
    let mut slug = String::with_capacity(ascii.len());
    let mut last_dash = false;
    for ch in ascii.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Deterministic base candidate for a new location.
pub fn base_slug(name: &str, city: &str) -> String {
    let slug = slugify(&format!("{name} {city}"));
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// First free candidate among `base`, `base-2`, ..., `base-{max_probes + 1}`.
pub fn next_free_slug(base: &str, taken: &HashSet<String>, max_probes: u32) -> Option<String> {
    if !taken.contains(base) {
        return Some(base.to_string());
    }
    (2..=u64::from(max_probes) + 1)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
}

/// Collision fallback. The suffix comes from the clock and a database
/// sequence, never from the name, so a retry cannot reproduce the slug that
/// just collided.
pub fn disambiguated_slug(base: &str, unix_millis: i64, sequence: i64) -> String {
    format!("{base}-{unix_millis}-{sequence}")
}
