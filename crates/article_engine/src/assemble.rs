use std::sync::Arc;

use engine_logging::{engine_debug, engine_warn};

use crate::clean::{AmmoniaCleaner, HtmlCleaner};
use crate::config::TransformerSettings;
use crate::convert::{
    apply_post_fixes, convert_rendered, ConvertError, Converter, Html2MdConverter,
};
use crate::document::contains_markup;
use crate::fetch::{RedirectResolver, ReqwestRedirectResolver};
use crate::frontmatter::{build_markdown_document, FrontMatter};
use crate::links::ArticleLookup;
use crate::provider::escape_template_vars_in_text;
use crate::router::{ContentRouter, Provider};
use crate::tags::extract_tags;
use crate::{AssembledDocument, EngineEvent, FeedItem, JobId, JobProgress, Stage, TransformContext};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Turns one feed item into an article document.
///
/// Holds no per-item state; one instance can serve any number of threads.
pub struct ArticleAssembler {
    settings: TransformerSettings,
    cleaner: Arc<dyn HtmlCleaner>,
    resolver: Arc<dyn RedirectResolver>,
    lookup: Option<Arc<dyn ArticleLookup>>,
    converter: Arc<dyn Converter>,
}

impl ArticleAssembler {
    pub fn new(settings: TransformerSettings) -> Self {
        let resolver = ReqwestRedirectResolver::new(settings.resolve.clone());
        Self {
            settings,
            cleaner: Arc::new(AmmoniaCleaner),
            resolver: Arc::new(resolver),
            lookup: None,
            converter: Arc::new(Html2MdConverter),
        }
    }

    pub fn with_cleaner(mut self, cleaner: Arc<dyn HtmlCleaner>) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_redirect_resolver(mut self, resolver: Arc<dyn RedirectResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_article_lookup(mut self, lookup: Arc<dyn ArticleLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    /// Never fails: a body that cannot be produced is left empty.
    pub fn assemble(&self, item: &FeedItem, ctx: &TransformContext) -> AssembledDocument {
        self.assemble_job(0, item, ctx, &NullSink)
    }

    pub fn assemble_job(
        &self,
        job_id: JobId,
        item: &FeedItem,
        ctx: &TransformContext,
        sink: &dyn ProgressSink,
    ) -> AssembledDocument {
        let progress = |stage| sink.emit(EngineEvent::Progress(JobProgress { job_id, stage }));

        let tags = extract_tags(&item.categories);
        let body = match self.body_markdown(item, ctx, &progress) {
            Ok(body) => body,
            Err(err) => {
                engine_warn!("dropping body of {:?}: {err}", item.title);
                String::new()
            }
        };

        progress(Stage::Assembling);
        let canonical_url = if ctx.mark_canonical {
            ctx.feed_source_url.as_str()
        } else {
            ""
        };
        let document = build_markdown_document(
            &FrontMatter {
                title: &item.title,
                date: item.published_at,
                tags: &tags,
                canonical_url,
            },
            &body,
        );
        progress(Stage::Done);
        AssembledDocument::new(document)
    }

    fn body_markdown(
        &self,
        item: &FeedItem,
        ctx: &TransformContext,
        progress: &dyn Fn(Stage),
    ) -> Result<String, ConvertError> {
        let Some(raw) = item.raw_content.as_deref().filter(|c| !c.trim().is_empty()) else {
            engine_debug!("item {:?} has no content", item.title);
            return Ok(String::new());
        };

        if !contains_markup(raw) {
            return Ok(self.plain_text_body(raw, ctx, progress));
        }

        progress(Stage::Cleaning);
        let cleaned = self.cleaner.clean_html(raw);

        progress(Stage::Routing);
        let router = ContentRouter::new(
            &self.settings.rich_platform_hosts,
            &self.settings.gist_host,
            self.resolver.as_ref(),
            self.lookup.as_deref(),
        );
        let rendered = router.route(&cleaned, ctx).render();

        progress(Stage::Converting);
        convert_rendered(self.converter.as_ref(), &rendered)
    }

    /// Content with no tags or character references is already Markdown as far
    /// as the body is concerned, so it only gets the fix-ups.
    fn plain_text_body(
        &self,
        raw: &str,
        ctx: &TransformContext,
        progress: &dyn Fn(Stage),
    ) -> String {
        progress(Stage::Routing);
        let text = match Provider::detect(&ctx.feed_url, &self.settings.rich_platform_hosts) {
            Provider::RichPlatform => escape_template_vars_in_text(raw),
            Provider::Generic => raw.to_string(),
        };
        engine_debug!("item content has no markup, skipping conversion");

        progress(Stage::Converting);
        apply_post_fixes(&text).trim().to_string()
    }
}

impl Default for ArticleAssembler {
    fn default() -> Self {
        Self::new(TransformerSettings::default())
    }
}
