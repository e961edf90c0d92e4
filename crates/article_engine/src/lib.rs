//! Article engine: turns syndication feed items into Markdown articles with front matter.
mod assemble;
mod clean;
mod config;
mod convert;
mod document;
mod embed;
mod engine;
mod fetch;
mod frontmatter;
mod links;
mod provider;
mod router;
mod tags;
mod types;

pub use assemble::{ArticleAssembler, ProgressSink};
pub use clean::{AmmoniaCleaner, HtmlCleaner};
pub use config::{SettingsError, TransformerSettings};
pub use convert::{apply_post_fixes, ConvertError, Converter, Html2MdConverter};
pub use document::{FeedDocument, RenderedHtml, Rewriter};
pub use embed::{EmbedSlot, EmbedTag, SocialPlatform, VideoProvider};
pub use engine::ImportHandle;
pub use fetch::{RedirectResolver, ReqwestRedirectResolver, ResolveSettings};
pub use frontmatter::{build_markdown_document, FrontMatter};
pub use links::{ArticleLookup, LookupError, ReferentialLinkResolver, RelativeLinkResolver};
pub use provider::{
    GistEmbedRewriter, SocialPostEmbedRewriter, TemplateVariableEscaper, VideoEmbedRewriter,
};
pub use router::{ContentRouter, Provider};
pub use tags::{extract_tags, MAX_TAGS, MAX_TAG_LEN};
pub use types::{
    ArticleRef, AssembledDocument, EngineEvent, FailureKind, FeedItem, JobId, JobProgress,
    ResolveError, Stage, TransformContext,
};
