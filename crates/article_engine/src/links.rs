use std::collections::HashMap;

use ego_tree::NodeId;
use engine_logging::{engine_debug, engine_warn};
use url::Url;

use crate::document::{FeedDocument, Rewriter};
use crate::types::ArticleRef;

/// Finds articles that were imported earlier, keyed by their original source URL.
pub trait ArticleLookup: Send + Sync {
    fn find_by_source_url(&self, url: &str) -> Result<Option<ArticleRef>, LookupError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("article lookup unavailable: {0}")]
    Unavailable(String),
    #[error("article lookup timed out")]
    Timeout,
}

/// Makes image sources absolute: `/path` against the item URL, anything else
/// relative against the feed URL.
pub struct RelativeLinkResolver<'a> {
    feed_url: &'a str,
    feed_source_url: &'a str,
}

impl<'a> RelativeLinkResolver<'a> {
    pub fn new(feed_url: &'a str, feed_source_url: &'a str) -> Self {
        Self {
            feed_url,
            feed_source_url,
        }
    }
}

impl Rewriter for RelativeLinkResolver<'_> {
    fn rewrite(&self, mut doc: FeedDocument) -> FeedDocument {
        let feed_base = Url::parse(self.feed_url).ok();
        let source_base = Url::parse(self.feed_source_url).ok();

        for id in doc.select_ids("img") {
            let Some(path) = non_empty_attr(&doc, id, "src")
                .or_else(|| non_empty_attr(&doc, id, "data-src"))
            else {
                continue;
            };
            if is_absolute_url(&path) {
                continue;
            }
            let base = if path.starts_with('/') {
                source_base.as_ref()
            } else {
                feed_base.as_ref()
            };
            match resolve_url(&path, base) {
                Some(resolved) => doc.set_attribute(id, "src", resolved.into()),
                None => engine_debug!("leaving unresolvable image source {path:?}"),
            }
        }
        doc
    }
}

/// Points anchors at the local copy of content that was already imported.
pub struct ReferentialLinkResolver<'a> {
    lookup: &'a dyn ArticleLookup,
}

impl<'a> ReferentialLinkResolver<'a> {
    pub fn new(lookup: &'a dyn ArticleLookup) -> Self {
        Self { lookup }
    }
}

impl Rewriter for ReferentialLinkResolver<'_> {
    fn rewrite(&self, mut doc: FeedDocument) -> FeedDocument {
        let mut seen: HashMap<String, Option<String>> = HashMap::new();

        for id in doc.select_ids("a") {
            let Some(href) = non_empty_attr(&doc, id, "href") else {
                continue;
            };
            let target = seen
                .entry(href.clone())
                .or_insert_with(|| match self.lookup.find_by_source_url(&href) {
                    Ok(found) => found.map(|article| article.url),
                    Err(err) => {
                        engine_warn!("article lookup for {href} failed: {err}");
                        None
                    }
                })
                .clone();
            if let Some(url) = target {
                engine_debug!("rewriting referential link {href} -> {url}");
                doc.set_attribute(id, "href", url);
            }
        }
        doc
    }
}

fn non_empty_attr(doc: &FeedDocument, id: NodeId, name: &str) -> Option<String> {
    doc.attr(id, name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_absolute_url(reference: &str) -> bool {
    Url::parse(reference).is_ok()
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}
