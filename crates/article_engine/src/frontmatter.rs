use chrono::{DateTime, SecondsFormat, Utc};

pub struct FrontMatter<'a> {
    pub title: &'a str,
    pub date: DateTime<Utc>,
    pub tags: &'a str,
    /// Empty unless the user marks imported items as canonical.
    pub canonical_url: &'a str,
}

pub fn build_markdown_document(front_matter: &FrontMatter<'_>, body_markdown: &str) -> String {
    let document = format!(
        "---\ntitle: {title}\npublished: false\ndate: {date}\ntags: {tags}\ncanonical_url: {canonical_url}\n---\n\n{body}",
        title = quote_yaml(front_matter.title.trim()),
        date = front_matter.date.to_rfc3339_opts(SecondsFormat::Secs, true),
        tags = front_matter.tags,
        canonical_url = front_matter.canonical_url,
        body = body_markdown.trim(),
    );
    document.trim().to_string()
}

fn quote_yaml(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => {}
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::{build_markdown_document, FrontMatter};

    #[test]
    fn document_layout() {
        let doc = build_markdown_document(
            &FrontMatter {
                title: "  My Post ",
                date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                tags: "tag1,tag2",
                canonical_url: "https://example.com/original",
            },
            "\nBody content here.\n",
        );
        assert_eq!(
            doc,
            "---\ntitle: \"My Post\"\npublished: false\ndate: 2024-01-01T00:00:00Z\ntags: tag1,tag2\ncanonical_url: https://example.com/original\n---\n\nBody content here."
        );
    }

    #[test]
    fn title_quotes_are_escaped() {
        let doc = build_markdown_document(
            &FrontMatter {
                title: r#"Say "hi" \o/"#,
                date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                tags: "",
                canonical_url: "",
            },
            "",
        );
        assert!(doc.contains(r#"title: "Say \"hi\" \\o/""#));
        assert!(doc.ends_with("canonical_url: \n---"));
    }
}
