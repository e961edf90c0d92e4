use engine_logging::engine_debug;
use url::Url;

use crate::document::{FeedDocument, Rewriter};
use crate::fetch::RedirectResolver;
use crate::links::{ArticleLookup, ReferentialLinkResolver, RelativeLinkResolver};
use crate::provider::{
    GistEmbedRewriter, SocialPostEmbedRewriter, TemplateVariableEscaper, VideoEmbedRewriter,
};
use crate::TransformContext;

/// Which family of rewriters a feed's content goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Generic,
    RichPlatform,
}

impl Provider {
    /// A feed is on the rich platform when its host is one of `rich_hosts` or a subdomain of one.
    pub fn detect<S: AsRef<str>>(feed_url: &str, rich_hosts: &[S]) -> Self {
        let host = Url::parse(feed_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase));
        match host {
            Some(host) if rich_hosts.iter().any(|p| host_matches(&host, p.as_ref())) => {
                Provider::RichPlatform
            }
            _ => Provider::Generic,
        }
    }
}

fn host_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.trim().trim_start_matches('.').to_ascii_lowercase();
    if pattern.is_empty() {
        return false;
    }
    host == pattern || host.ends_with(&format!(".{pattern}"))
}

/// Parses cleaned HTML and runs the rewriter chain that fits the feed.
pub struct ContentRouter<'a> {
    rich_hosts: &'a [String],
    gist_host: &'a str,
    resolver: &'a dyn RedirectResolver,
    lookup: Option<&'a dyn ArticleLookup>,
}

impl<'a> ContentRouter<'a> {
    pub fn new(
        rich_hosts: &'a [String],
        gist_host: &'a str,
        resolver: &'a dyn RedirectResolver,
        lookup: Option<&'a dyn ArticleLookup>,
    ) -> Self {
        Self {
            rich_hosts,
            gist_host,
            resolver,
            lookup,
        }
    }

    pub fn route(&self, cleaned_html: &str, ctx: &TransformContext) -> FeedDocument {
        let mut doc = FeedDocument::parse(cleaned_html);

        if ctx.resolve_referential_links {
            match self.lookup {
                Some(lookup) => doc = ReferentialLinkResolver::new(lookup).rewrite(doc),
                None => engine_debug!("referential links requested but no article lookup configured"),
            }
        }

        let provider = Provider::detect(&ctx.feed_url, self.rich_hosts);
        engine_debug!("routing {} as {provider:?}", ctx.feed_url);

        match provider {
            Provider::RichPlatform => {
                let gist = GistEmbedRewriter::new(self.resolver, self.gist_host);
                let chain: [&dyn Rewriter; 4] = [
                    &gist,
                    &VideoEmbedRewriter,
                    &SocialPostEmbedRewriter,
                    &TemplateVariableEscaper,
                ];
                chain.iter().fold(doc, |doc, pass| pass.rewrite(doc))
            }
            Provider::Generic => {
                RelativeLinkResolver::new(&ctx.feed_url, &ctx.feed_source_url).rewrite(doc)
            }
        }
    }
}
