//! Rewriters for the rich publishing platform path.
//!
//! Each one walks the shared [`FeedDocument`], leaves anything it does not
//! recognise alone, and never fails the document as a whole.

use std::sync::LazyLock;

use ego_tree::NodeId;
use engine_logging::{engine_debug, engine_warn};
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::document::{FeedDocument, Rewriter, TextRun};
use crate::embed::{EmbedTag, SocialPlatform, VideoProvider};
use crate::fetch::RedirectResolver;

static MEDIA_REDIRECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"medium\.com/media/.+/href").expect("valid regex"));

static YOUTUBE_HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube(?:-nocookie)?\.com").expect("valid regex"));

static YOUTUBE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"embed(?:%2F|/)([A-Za-z0-9_-]{4,11})").expect("valid regex"));

static VIMEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"vimeo\.com(?:%2F|/)video(?:%2F|/)(\d+)").expect("valid regex")
});

static TWEET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/[^/]+/status(?:es)?/(\d+)")
        .expect("valid regex")
});

static TEMPLATE_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}").expect("valid regex"));

/// Ancestors under which text is shown verbatim and must not be touched.
const VERBATIM_ELEMENTS: &[&str] = &["pre", "code", "script", "style", "iframe", "textarea"];

/// Turns iframes that wrap a platform media redirect into gist embeds.
pub struct GistEmbedRewriter<'a> {
    resolver: &'a dyn RedirectResolver,
    gist_host: &'a str,
}

impl<'a> GistEmbedRewriter<'a> {
    pub fn new(resolver: &'a dyn RedirectResolver, gist_host: &'a str) -> Self {
        Self {
            resolver,
            gist_host,
        }
    }
}

impl Rewriter for GistEmbedRewriter<'_> {
    fn rewrite(&self, mut doc: FeedDocument) -> FeedDocument {
        for id in doc.select_ids("iframe") {
            if doc.is_replaced(id) {
                continue;
            }
            let Some(link) = media_redirect_link(&doc, id) else {
                continue;
            };
            let resolved = match self.resolver.resolve(&link) {
                Ok(url) => url,
                Err(err) => {
                    engine_warn!("could not resolve media redirect {link}: {err}");
                    continue;
                }
            };
            if !resolved.contains(self.gist_host) {
                engine_debug!("media redirect {link} resolved to non-gist {resolved}");
                continue;
            }
            doc.replace_with_embed(id, EmbedTag::Gist { url: resolved });
        }
        doc
    }
}

/// The single anchor inside the iframe, if it points at a media redirect.
///
/// HTML5 parsing keeps iframe content as raw text, so the markup is parsed
/// again on its own.
fn media_redirect_link(doc: &FeedDocument, id: NodeId) -> Option<String> {
    let iframe = doc.element(id)?;
    let inner: String = if iframe.children().any(|child| child.value().is_element()) {
        iframe.inner_html()
    } else {
        iframe.text().collect()
    };
    let fragment = Html::parse_fragment(&inner);
    let selector = Selector::parse("a").ok()?;
    let anchors: Vec<ElementRef<'_>> = fragment.select(&selector).collect();
    let [anchor] = anchors.as_slice() else {
        return None;
    };

    let text = anchor.text().collect::<String>().trim().to_string();
    if MEDIA_REDIRECT_RE.is_match(&text) {
        return Some(text);
    }
    anchor
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|href| MEDIA_REDIRECT_RE.is_match(href))
        .map(str::to_string)
}

/// Replaces video player iframes with video embeds.
#[derive(Debug, Default)]
pub struct VideoEmbedRewriter;

impl Rewriter for VideoEmbedRewriter {
    fn rewrite(&self, mut doc: FeedDocument) -> FeedDocument {
        for id in doc.select_ids("iframe") {
            if doc.is_replaced(id) {
                continue;
            }
            let Some(src) = doc.attr(id, "src") else {
                continue;
            };
            if let Some(embed) = video_embed(&src) {
                doc.replace_with_embed(id, embed);
            }
        }
        doc
    }
}

fn video_embed(src: &str) -> Option<EmbedTag> {
    if YOUTUBE_HOST_RE.is_match(src) {
        let id = YOUTUBE_ID_RE.captures(src)?.get(1)?.as_str();
        return Some(EmbedTag::Video {
            provider: VideoProvider::YouTube,
            id: id.to_string(),
        });
    }
    let id = VIMEO_ID_RE.captures(src)?.get(1)?.as_str();
    Some(EmbedTag::Video {
        provider: VideoProvider::Vimeo,
        id: id.to_string(),
    })
}

/// Replaces quoted social posts with post embeds.
///
/// A quoted post is a blockquote with exactly two paragraphs, the second one
/// carrying the status link as its first anchor.
#[derive(Debug, Default)]
pub struct SocialPostEmbedRewriter;

impl Rewriter for SocialPostEmbedRewriter {
    fn rewrite(&self, mut doc: FeedDocument) -> FeedDocument {
        for id in doc.select_ids("blockquote") {
            if doc.is_replaced(id) {
                continue;
            }
            if let Some(embed) = social_embed(&doc, id) {
                doc.replace_with_embed(id, embed);
            }
        }
        doc
    }
}

fn social_embed(doc: &FeedDocument, id: NodeId) -> Option<EmbedTag> {
    let blockquote = doc.element(id)?;
    let paragraphs: Vec<ElementRef<'_>> = blockquote
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "p")
        .collect();
    let [_, second] = paragraphs.as_slice() else {
        return None;
    };
    let selector = Selector::parse("a").ok()?;
    let href = second.select(&selector).next()?.value().attr("href")?;
    let status_id = TWEET_RE.captures(href.trim())?.get(1)?.as_str();
    Some(EmbedTag::Social {
        platform: SocialPlatform::Twitter,
        id: status_id.to_string(),
    })
}

/// Wraps `{{ ... }}` in inline code so it is not read as a template variable.
#[derive(Debug, Default)]
pub struct TemplateVariableEscaper;

impl Rewriter for TemplateVariableEscaper {
    fn rewrite(&self, mut doc: FeedDocument) -> FeedDocument {
        for id in doc.text_node_ids() {
            if doc.is_replaced(id) {
                continue;
            }
            if let Some(runs) = template_runs(&doc, id) {
                doc.replace_text(id, runs);
            }
        }
        doc
    }
}

fn template_runs(doc: &FeedDocument, id: NodeId) -> Option<Vec<TextRun>> {
    let node = doc.node(id)?;
    let Node::Text(text) = node.value() else {
        return None;
    };
    let verbatim = node
        .ancestors()
        .filter_map(|ancestor| ancestor.value().as_element())
        .any(|el| VERBATIM_ELEMENTS.contains(&el.name()));
    if verbatim || !TEMPLATE_VAR_RE.is_match(text) {
        return None;
    }
    Some(split_template_vars(text))
}

/// Same wrapping for content that never went through the HTML parser.
/// Variables already inside backticks are left alone.
pub(crate) fn escape_template_vars_in_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in TEMPLATE_VAR_RE.find_iter(text) {
        out.push_str(&text[last..found.start()]);
        let wrapped =
            text[..found.start()].ends_with('`') && text[found.end()..].starts_with('`');
        if wrapped {
            out.push_str(found.as_str());
        } else {
            out.push('`');
            out.push_str(found.as_str());
            out.push('`');
        }
        last = found.end();
    }
    out.push_str(&text[last..]);
    out
}

fn split_template_vars(text: &str) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut last = 0;
    for found in TEMPLATE_VAR_RE.find_iter(text) {
        if found.start() > last {
            runs.push(TextRun::Plain(text[last..found.start()].to_string()));
        }
        runs.push(TextRun::Code(found.as_str().to_string()));
        last = found.end();
    }
    if last < text.len() {
        runs.push(TextRun::Plain(text[last..].to_string()));
    }
    runs
}
