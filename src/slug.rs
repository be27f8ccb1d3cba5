//! Name Sanitizer - display names to directory-safe identifiers

/// Maximum length of a sanitized name.
pub const MAX_SLUG_LEN: usize = 50;

/// Returned when nothing usable survives sanitizing.
pub const FALLBACK_SLUG: &str = "untitled";

const SEPARATOR: char = '_';

/// Map an arbitrary display name to `[a-z0-9_]`, at most 50 characters,
/// never empty.
///
/// Every run of characters outside `[a-z0-9]` collapses into one `_`, and
/// separators are trimmed from both ends. Truncation can expose a trailing
/// separator, so the ends are trimmed again afterwards; that keeps the
/// function idempotent.
pub fn sanitize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut in_gap = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            in_gap = false;
        } else if !in_gap {
            slug.push(SEPARATOR);
            in_gap = true;
        }
    }

    // Output is pure ASCII here, so byte truncation is char-safe.
    let mut slug = slug.trim_matches(SEPARATOR).to_string();
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_matches(SEPARATOR);

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}
