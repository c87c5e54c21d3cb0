//! URL-safe slug derivation for topic names
//!
//! Slugs key the persisted summary history: the fetch stage looks up a
//! topic's checkpoint by slug, and the read API addresses topics by slug.

/// Derive a URL-safe slug from a topic display name.
///
/// Lowercases the input, maps every non-alphanumeric character to `-`,
/// collapses runs of dashes and trims leading/trailing dashes.
pub fn slugify(input: &str) -> String {
    let mut slug: String = input
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }

    slug.trim_matches('-').to_string()
}

/// Check whether a string is already a well-formed slug.
///
/// Callers passing a non-conforming slug to the store or the API are
/// rejected before any store access.
pub fn is_valid_slug(candidate: &str) -> bool {
    !candidate.is_empty()
        && !candidate.starts_with('-')
        && !candidate.ends_with('-')
        && !candidate.contains("--")
        && candidate
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
