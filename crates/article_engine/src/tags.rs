pub const MAX_TAGS: usize = 4;
pub const MAX_TAG_LEN: usize = 20;

/// Builds the comma-joined `tags` front matter value from feed categories.
///
/// Only the first [`MAX_TAGS`] categories are considered. Each is reduced to
/// ASCII alphanumerics and cut at [`MAX_TAG_LEN`] characters; categories that
/// end up empty are dropped.
pub fn extract_tags<S: AsRef<str>>(categories: &[S]) -> String {
    categories
        .iter()
        .take(MAX_TAGS)
        .map(|category| clean_tag(category.as_ref()))
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn clean_tag(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_TAG_LEN)
        .collect()
}
