use std::collections::HashMap;
use std::sync::LazyLock;

use ego_tree::{NodeId, NodeRef};
use regex::Regex;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html, Selector};

use crate::embed::{placeholder, slot_prefix, EmbedSlot, EmbedTag};

/// A tag opener or a character reference that is not backslash-escaped.
static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\\])(?:<[A-Za-z/!?]|&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);)")
        .expect("valid regex")
});

/// True when `content` has to go through the HTML parser. Text without tags
/// or character references, which includes Markdown this crate produced, is
/// taken as written.
pub(crate) fn contains_markup(content: &str) -> bool {
    MARKUP_RE.is_match(content)
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text children are serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "noscript", "xmp", "noembed", "noframes", "plaintext",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TextRun {
    Plain(String),
    Code(String),
}

#[derive(Debug, Clone)]
enum Replacement {
    Embed(usize),
    Text(Vec<TextRun>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHtml {
    pub html: String,
    pub slots: Vec<EmbedSlot>,
}

/// One rewriting pass. Passes take the document by value and hand it back,
/// so a chain of them composes without shared mutable state.
pub trait Rewriter {
    fn rewrite(&self, doc: FeedDocument) -> FeedDocument;
}

/// Parsed feed HTML plus the edits the rewriters have recorded against it.
///
/// The parse tree itself is never mutated. Rewriters register attribute
/// overrides and node replacements by [`NodeId`], and [`FeedDocument::render`]
/// applies them while serializing.
pub struct FeedDocument {
    html: Html,
    attributes: HashMap<NodeId, Vec<(String, String)>>,
    replacements: HashMap<NodeId, Replacement>,
    embeds: Vec<EmbedTag>,
}

impl FeedDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_fragment(html),
            attributes: HashMap::new(),
            replacements: HashMap::new(),
            embeds: Vec::new(),
        }
    }

    pub fn embeds(&self) -> &[EmbedTag] {
        &self.embeds
    }

    pub(crate) fn select_ids(&self, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Ok(sel) => self.html.select(&sel).map(|el| el.id()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.html.tree.get(id)
    }

    pub(crate) fn text_node_ids(&self) -> Vec<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .filter(|node| node.value().is_text())
            .map(|node| node.id())
            .collect()
    }

    /// Attribute value as the rewriters currently see it, overrides included.
    pub(crate) fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        if let Some(value) = self
            .attributes
            .get(&id)
            .and_then(|attrs| attrs.iter().find(|(n, _)| n == name))
        {
            return Some(value.1.clone());
        }
        self.element(id)?.value().attr(name).map(str::to_string)
    }

    pub(crate) fn set_attribute(&mut self, id: NodeId, name: &str, value: String) {
        let attrs = self.attributes.entry(id).or_default();
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    /// Swaps the element for a bare paragraph holding the embed.
    pub(crate) fn replace_with_embed(&mut self, id: NodeId, embed: EmbedTag) {
        let index = self.embeds.len();
        self.embeds.push(embed);
        self.replacements.insert(id, Replacement::Embed(index));
    }

    pub(crate) fn replace_text(&mut self, id: NodeId, runs: Vec<TextRun>) {
        self.replacements.insert(id, Replacement::Text(runs));
    }

    /// True when the node or one of its ancestors has already been replaced.
    pub(crate) fn is_replaced(&self, id: NodeId) -> bool {
        if self.replacements.contains_key(&id) {
            return true;
        }
        self.node(id)
            .map(|node| {
                node.ancestors()
                    .any(|ancestor| self.replacements.contains_key(&ancestor.id()))
            })
            .unwrap_or(false)
    }

    pub fn render(&self) -> RenderedHtml {
        let nonce = self.slot_nonce();
        let mut out = String::new();
        for child in self.html.root_element().children() {
            self.write_node(child, nonce, &mut out);
        }
        let slots = self
            .embeds
            .iter()
            .enumerate()
            .map(|(index, tag)| EmbedSlot {
                token: placeholder(nonce, index),
                tag: tag.clone(),
            })
            .collect();
        RenderedHtml { html: out, slots }
    }

    /// Smallest nonce whose tokens cannot collide with anything that may reach
    /// the Markdown: text, attribute values, overrides and the embeds themselves.
    fn slot_nonce(&self) -> u32 {
        let mut haystack: String = self.html.root_element().text().collect();
        for node in self.html.tree.root().descendants() {
            if let Some(element) = node.value().as_element() {
                for (_, value) in element.attrs() {
                    haystack.push('\n');
                    haystack.push_str(value);
                }
            }
        }
        for (_, value) in self.attributes.values().flatten() {
            haystack.push('\n');
            haystack.push_str(value);
        }
        for embed in &self.embeds {
            haystack.push('\n');
            haystack.push_str(&embed.to_string());
        }
        (0..u32::MAX)
            .find(|nonce| !haystack.contains(&slot_prefix(*nonce)))
            .unwrap_or(u32::MAX)
    }

    fn write_node(&self, node: NodeRef<'_, Node>, nonce: u32, out: &mut String) {
        match node.value() {
            Node::Text(text) => {
                if let Some(Replacement::Text(runs)) = self.replacements.get(&node.id()) {
                    write_runs(runs, out);
                } else if parent_is_raw_text(node) {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            Node::Element(element) => self.write_element(node, element, nonce, out),
            Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
            _ => {
                for child in node.children() {
                    self.write_node(child, nonce, out);
                }
            }
        }
    }

    fn write_element(
        &self,
        node: NodeRef<'_, Node>,
        element: &Element,
        nonce: u32,
        out: &mut String,
    ) {
        if let Some(Replacement::Embed(index)) = self.replacements.get(&node.id()) {
            out.push_str("<p>");
            out.push_str(&placeholder(nonce, *index));
            out.push_str("</p>");
            return;
        }

        let name = element.name();
        let overrides = self.attributes.get(&node.id());
        out.push('<');
        out.push_str(name);
        for (attr, value) in element.attrs() {
            let overridden = overrides.is_some_and(|o| o.iter().any(|(n, _)| n == attr));
            if !overridden {
                write_attr(attr, value, out);
            }
        }
        for (attr, value) in overrides.into_iter().flatten() {
            write_attr(attr, value, out);
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }
        for child in node.children() {
            self.write_node(child, nonce, out);
        }
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

fn parent_is_raw_text(node: NodeRef<'_, Node>) -> bool {
    node.parent()
        .and_then(|parent| parent.value().as_element().map(|el| el.name().to_string()))
        .is_some_and(|name| RAW_TEXT_ELEMENTS.contains(&name.as_str()))
}

fn write_runs(runs: &[TextRun], out: &mut String) {
    for run in runs {
        match run {
            TextRun::Plain(text) => escape_text(text, out),
            TextRun::Code(text) => {
                out.push_str("<code>");
                escape_text(text, out);
                out.push_str("</code>");
            }
        }
    }
}

fn write_attr(name: &str, value: &str, out: &mut String) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_markup, FeedDocument, TextRun};
    use crate::embed::{placeholder, EmbedTag, VideoProvider};

    #[test]
    fn untouched_fragment_round_trips() {
        let doc = FeedDocument::parse(r#"<p class="x">a &amp; b</p><br><img src="i.png">"#);
        assert_eq!(
            doc.render().html,
            r#"<p class="x">a &amp; b</p><br><img src="i.png">"#
        );
    }

    #[test]
    fn markup_detection() {
        assert!(contains_markup("<p>Hello</p>"));
        assert!(contains_markup("a &amp; b"));
        assert!(contains_markup("x &#160; y"));
        assert!(!contains_markup("Hello **bold** and snake\\_case"));
        assert!(!contains_markup(r"escaped \<b\> and 1 < 2 & 3"));
        assert!(!contains_markup("[link](https://x.com/?a=1&b=2)"));
    }

    #[test]
    fn comments_are_dropped() {
        let doc = FeedDocument::parse("<p>keep<!-- drop --></p>");
        assert_eq!(doc.render().html, "<p>keep</p>");
    }

    #[test]
    fn attribute_override_replaces_original_value() {
        let mut doc = FeedDocument::parse(r#"<img src="old.png">"#);
        let id = doc.select_ids("img")[0];
        doc.set_attribute(id, "src", "https://x.com/new.png".into());
        assert_eq!(doc.attr(id, "src").as_deref(), Some("https://x.com/new.png"));
        assert_eq!(
            doc.render().html,
            r#"<img src="https://x.com/new.png">"#
        );
    }

    #[test]
    fn embed_replacement_renders_placeholder_paragraph() {
        let mut doc = FeedDocument::parse(r#"<div><iframe src="v" width="1"></iframe></div>"#);
        let id = doc.select_ids("iframe")[0];
        doc.replace_with_embed(
            id,
            EmbedTag::Video {
                provider: VideoProvider::YouTube,
                id: "abc".into(),
            },
        );
        let rendered = doc.render();
        assert_eq!(
            rendered.html,
            format!("<div><p>{}</p></div>", placeholder(0, 0))
        );
        assert_eq!(rendered.slots.len(), 1);
        assert_eq!(rendered.slots[0].token, placeholder(0, 0));
        assert!(doc.is_replaced(id));
    }

    #[test]
    fn slot_tokens_avoid_text_already_in_the_feed() {
        let forged = placeholder(0, 0);
        let html = format!(
            r#"<p>{forged}</p><img alt="x" src="{}"><iframe src="v"></iframe>"#,
            placeholder(1, 0)
        );
        let mut doc = FeedDocument::parse(&html);
        let id = doc.select_ids("iframe")[0];
        doc.replace_with_embed(
            id,
            EmbedTag::Video {
                provider: VideoProvider::YouTube,
                id: "abc".into(),
            },
        );
        let rendered = doc.render();
        assert_eq!(rendered.slots[0].token, placeholder(2, 0));
        assert_eq!(rendered.html.matches(&rendered.slots[0].token).count(), 1);
        assert!(rendered.html.contains(&forged));
    }

    #[test]
    fn text_replacement_wraps_code_runs() {
        let mut doc = FeedDocument::parse("<p>x</p>");
        let id = doc.text_node_ids()[0];
        doc.replace_text(
            id,
            vec![
                TextRun::Plain("a < ".into()),
                TextRun::Code("{{ b }}".into()),
            ],
        );
        assert_eq!(doc.render().html, "<p>a &lt; <code>{{ b }}</code></p>");
    }
}
