use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::document::RenderedHtml;
use crate::embed::substitute_placeholders;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("markdown conversion panicked: {0}")]
    Panicked(String),
}

/// HTML to GitHub flavoured Markdown.
pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> Result<String, ConvertError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> Result<String, ConvertError> {
        panic::catch_unwind(AssertUnwindSafe(|| html2md::parse_html(html))).map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ConvertError::Panicked(message)
        })
    }
}

static NBSP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)&nbsp;|&#160;|&#xa0;|\x{a0}").expect("valid regex"));

static EMBED_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%\s?(?P<tag>\S+)\s?(?P<text>(?:\\_|\S){11,18})\s?%\}").expect("valid regex")
});

/// Converts rendered feed HTML and applies the Markdown fix-ups.
pub(crate) fn convert_rendered(
    converter: &dyn Converter,
    rendered: &RenderedHtml,
) -> Result<String, ConvertError> {
    let markdown = converter.to_markdown(&rendered.html)?;
    let fixed = apply_post_fixes(&markdown);
    Ok(substitute_placeholders(&fixed, &rendered.slots)
        .trim()
        .to_string())
}

/// Applying the fix-ups to their own output changes nothing.
pub fn apply_post_fixes(markdown: &str) -> String {
    let without_empty_fences = remove_empty_fences(markdown);
    let spaced = NBSP_RE.replace_all(&without_empty_fences, " ");
    let collapsed = collapse_blank_lines(&spaced);
    unescape_embed_tags(&collapsed)
}

/// Drops fenced code blocks that hold nothing but blank lines.
fn remove_empty_fences(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if let Some(marker) = fence_marker(line) {
            let close = lines[i + 1..]
                .iter()
                .position(|l| is_closing_fence(l, marker))
                .map(|offset| i + 1 + offset);
            match close {
                Some(end) if lines[i + 1..end].iter().all(|l| l.trim().is_empty()) => {
                    i = end + 1;
                }
                Some(end) => {
                    kept.extend_from_slice(&lines[i..=end]);
                    i = end + 1;
                }
                None => {
                    kept.extend_from_slice(&lines[i..]);
                    break;
                }
            }
        } else {
            kept.push(line);
            i += 1;
        }
    }
    kept.join("\n")
}

/// At most one blank line between blocks; fenced code is left as written.
fn collapse_blank_lines(markdown: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut open_fence: Option<&'static str> = None;
    for line in markdown.lines() {
        match open_fence {
            Some(marker) => {
                if is_closing_fence(line, marker) {
                    open_fence = None;
                }
            }
            None => {
                let blank = line.trim().is_empty();
                if blank && kept.last().is_some_and(|prev| prev.trim().is_empty()) {
                    continue;
                }
                open_fence = fence_marker(line);
            }
        }
        kept.push(line);
    }
    kept.join("\n")
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn is_closing_fence(line: &str, marker: &str) -> bool {
    let trimmed = line.trim();
    let fence_char = marker.chars().next().unwrap_or('`');
    trimmed.starts_with(marker) && trimmed.chars().all(|c| c == fence_char)
}

/// Embed tags must reach the renderer literally, so undo `\_` inside them.
fn unescape_embed_tags(markdown: &str) -> String {
    EMBED_TAG_RE
        .replace_all(markdown, |caps: &Captures<'_>| caps[0].replace("\\_", "_"))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::{
        apply_post_fixes, collapse_blank_lines, remove_empty_fences, unescape_embed_tags,
    };

    #[test]
    fn empty_fence_is_removed() {
        assert_eq!(remove_empty_fences("before\n```\n\n```\nafter"), "before\nafter");
        assert_eq!(remove_empty_fences("```ruby\n```"), "");
    }

    #[test]
    fn adjacent_code_blocks_survive() {
        let md = "```\nfirst\n```\n\n```\nsecond\n```";
        assert_eq!(remove_empty_fences(md), md);
    }

    #[test]
    fn unclosed_fence_is_kept() {
        let md = "```\ncode without end";
        assert_eq!(remove_empty_fences(md), md);
    }

    #[test]
    fn non_breaking_spaces_become_spaces() {
        let fixed = apply_post_fixes("a\u{a0}b&nbsp;c&#160;d");
        assert_eq!(fixed, "a b c d");
        assert!(!fixed.contains('\u{a0}'));
    }

    #[test]
    fn underscores_inside_embed_ids_are_unescaped() {
        assert_eq!(
            unescape_embed_tags(r"{% youtube abc\_defghij %}"),
            "{% youtube abc_defghij %}"
        );
    }

    #[test]
    fn longest_ids_are_unescaped_too() {
        assert_eq!(
            unescape_embed_tags(r"{% youtube abcdefgh\_ijklmnopq %}"),
            "{% youtube abcdefgh_ijklmnopq %}"
        );
    }

    #[test]
    fn removed_fence_leaves_single_blank_line() {
        assert_eq!(apply_post_fixes("x\n\n```\n```\n\ny"), "x\n\ny");
    }

    #[test]
    fn blank_lines_inside_fences_are_kept() {
        let md = "a\n\n\n\nb\n\n```\nfn main() {}\n\n\n}\n```";
        assert_eq!(
            collapse_blank_lines(md),
            "a\n\nb\n\n```\nfn main() {}\n\n\n}\n```"
        );
    }

    #[test]
    fn post_fixes_are_stable() {
        let md = "snake\\_case\u{a0}and 2\\*3\n\n\n\n```\n\n```\n{% youtube abc\\_defghij %}";
        let once = apply_post_fixes(md);
        assert_eq!(apply_post_fixes(&once), once);
    }

    #[test]
    fn underscores_elsewhere_stay_escaped() {
        assert_eq!(unescape_embed_tags(r"snake\_case"), r"snake\_case");
    }
}
