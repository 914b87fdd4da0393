//! Slug generation for derived code fields.

/// Maximum length of a generated slug.
pub const SLUG_MAX_LEN: usize = 48;

/// Lowercase `input`, collapse every run of characters outside `[a-z0-9]`
/// into a single hyphen, trim leading and trailing hyphens and truncate to
/// [`SLUG_MAX_LEN`] characters.
pub fn slugify(input: &str) -> String {
    slugify_with_limit(input, SLUG_MAX_LEN)
}

/// [`slugify`] with an explicit length limit.
pub fn slugify_with_limit(input: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    // Only ASCII is pushed, so byte truncation is char-safe.
    slug.truncate(max_len);
    slug
}
