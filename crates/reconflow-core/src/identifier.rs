//! Stable provider identifiers derived from human-readable names
//!
//! The same name must map to the same identifier on every run: dependency
//! references and drift detection are keyed on it.

/// Longest identifier handed to a provider
pub const MAX_IDENTIFIER_LEN: usize = 64;

const HASH_SUFFIX_LEN: usize = 8;

/// Normalize `name` into a provider-safe resource identifier
///
/// Lowercases, spells `*` as `star`, turns every character outside
/// `[a-z0-9_-]` into `-`, collapses and trims dashes, and prefixes a leading
/// digit with `_`. Names longer than [`MAX_IDENTIFIER_LEN`] are truncated and
/// suffixed with a hash of the original name so distinct long names stay
/// distinct.
pub fn safe_resource_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '*' => push_segment(&mut out, "star"),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c.to_ascii_lowercase()),
            _ => {
                if !out.ends_with('-') {
                    out.push('-');
                }
            }
        }
    }

    let mut id = out.trim_matches('-').to_string();
    if id.is_empty() {
        id.push('_');
    }
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert(0, '_');
    }

    if id.len() > MAX_IDENTIFIER_LEN {
        let hash = blake3::hash(name.as_bytes()).to_hex();
        let keep = MAX_IDENTIFIER_LEN - HASH_SUFFIX_LEN - 1;
        id.truncate(keep);
        let trimmed = id.trim_end_matches('-').len();
        id.truncate(trimmed);
        id.push('-');
        id.push_str(&hash.as_str()[..HASH_SUFFIX_LEN]);
    }

    id
}

fn push_segment(out: &mut String, segment: &str) {
    if !out.is_empty() && !out.ends_with('-') {
        out.push('-');
    }
    out.push_str(segment);
}
