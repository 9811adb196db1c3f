//! Slug generation for migrated contacts.
//!
//! Slugs are derived from the display name plus a short fragment of the
//! source system's record id, so two people with the same name still get
//! distinct slugs.

/// Number of trailing id characters appended to a slug.
pub const ID_FRAGMENT_LEN: usize = 6;

/// Fallback slug stem when the name has no usable characters.
const FALLBACK_STEM: &str = "contact";

/// Lowercase ASCII-alphanumeric runs joined by single hyphens.
///
/// ```
/// use tradeflow_core::naming::slugify;
///
/// assert_eq!(slugify("  Mary-Jane  O'Neil "), "mary-jane-o-neil");
/// ```
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_sep = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Trailing alphanumeric fragment of an external id, lowercased.
fn id_fragment(external_id: &str) -> String {
    let chars: Vec<char> = external_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let start = chars.len().saturating_sub(ID_FRAGMENT_LEN);
    chars[start..].iter().collect()
}

/// Build a contact slug: `{first}-{last}-{id fragment}`.
///
/// ```
/// use tradeflow_core::naming::contact_slug;
///
/// assert_eq!(contact_slug("Ada", "Lovelace", "c_9F31A7B2"), "ada-lovelace-31a7b2");
/// ```
pub fn contact_slug(first_name: &str, last_name: &str, external_id: &str) -> String {
    let mut stem = slugify(&format!("{first_name} {last_name}"));
    if stem.is_empty() {
        stem.push_str(FALLBACK_STEM);
    }
    let fragment = id_fragment(external_id);
    if fragment.is_empty() {
        stem
    } else {
        format!("{stem}-{fragment}")
    }
}
