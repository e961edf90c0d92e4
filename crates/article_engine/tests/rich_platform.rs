use std::sync::{Arc, Mutex};

use article_engine::{
    ArticleAssembler, FailureKind, FeedItem, HtmlCleaner, RedirectResolver, ResolveError,
    TransformContext,
};
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

const FEED_URL: &str = "https://medium.com/feed/@someone";
const ITEM_URL: &str = "https://medium.com/@someone/a-post-123";

struct PassThrough;

impl HtmlCleaner for PassThrough {
    fn clean_html(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// Answers every lookup with the same result and remembers what it was asked.
struct StubResolver {
    answer: Result<String, ResolveError>,
    asked: Mutex<Vec<String>>,
}

impl StubResolver {
    fn new(answer: Result<String, ResolveError>) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
        }
    }
}

impl RedirectResolver for StubResolver {
    fn resolve(&self, url: &str) -> Result<String, ResolveError> {
        self.asked.lock().unwrap().push(url.to_string());
        self.answer.clone()
    }
}

fn assembler(resolver: Arc<StubResolver>) -> ArticleAssembler {
    ArticleAssembler::default()
        .with_cleaner(Arc::new(PassThrough))
        .with_redirect_resolver(resolver)
}

fn rich_item(content: &str) -> FeedItem {
    FeedItem::new("Rich", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        .with_content(content)
        .with_categories(["Programming"])
}

fn ctx() -> TransformContext {
    TransformContext::new(FEED_URL, ITEM_URL)
}

const GIST_IFRAME: &str = r#"<iframe src="https://medium.com/media/abc123" width="0" height="0"><a href="https://medium.com/media/abc123/href">https://medium.com/media/abc123/href</a></iframe>"#;

const VIDEO_IFRAME: &str = r#"<iframe src="https://cdn.embedly.com/widgets/media.html?src=https%3A%2F%2Fwww.youtube.com%2Fembed%2Fabc_2345678%3Ffeature%3Doembed" width="640" height="480"></iframe>"#;

#[test]
fn video_iframe_becomes_literal_embed() {
    let resolver = Arc::new(StubResolver::new(Ok("https://unused.example".into())));
    let doc = assembler(resolver.clone()).assemble(&rich_item(VIDEO_IFRAME), &ctx());
    assert_eq!(doc.body(), "{% youtube abc_2345678 %}");
    assert!(resolver.asked.lock().unwrap().is_empty());
}

#[test]
fn media_redirect_iframe_becomes_gist_embed() {
    let resolver = Arc::new(StubResolver::new(Ok(
        "https://gist.github.com/someone/abc123".into()
    )));
    let content = format!("<p>Code below</p>{GIST_IFRAME}");
    let doc = assembler(resolver.clone()).assemble(&rich_item(&content), &ctx());
    assert_eq!(
        doc.body(),
        "Code below\n\n{% gist https://gist.github.com/someone/abc123 %}"
    );
    assert_eq!(
        *resolver.asked.lock().unwrap(),
        vec!["https://medium.com/media/abc123/href".to_string()]
    );
}

#[test]
fn failed_gist_resolution_keeps_other_embeds() {
    engine_logging::initialize_for_tests();
    let resolver = Arc::new(StubResolver::new(Err(ResolveError {
        kind: FailureKind::Timeout,
        message: "operation timed out".into(),
    })));
    let content = format!("{GIST_IFRAME}{VIDEO_IFRAME}");
    let doc = assembler(resolver).assemble(&rich_item(&content), &ctx());
    assert!(doc.body().contains("{% youtube abc_2345678 %}"));
    assert!(!doc.body().contains("{% gist"));
}

#[test]
fn quoted_tweet_becomes_social_embed() {
    let content = r#"<p>Look at this:</p><blockquote><p>Shipping today!</p><p>— Someone (@someone) <a href="https://twitter.com/someone/status/1234567890">March 1, 2024</a></p></blockquote>"#;
    let resolver = Arc::new(StubResolver::new(Ok(String::new())));
    let doc = assembler(resolver).assemble(&rich_item(content), &ctx());
    assert_eq!(doc.body(), "Look at this:\n\n{% twitter 1234567890 %}");
}

#[test]
fn template_variables_are_wrapped_in_inline_code() {
    let resolver = Arc::new(StubResolver::new(Ok(String::new())));
    let doc = assembler(resolver).assemble(
        &rich_item("<p>Render {{ name }} here</p>"),
        &ctx(),
    );
    assert_eq!(doc.body(), "Render `{{ name }}` here");
}

#[test]
fn generic_feed_skips_template_escaping() {
    let resolver = Arc::new(StubResolver::new(Ok(String::new())));
    let doc = assembler(resolver).assemble(
        &rich_item("<p>Render {{ name }} here</p>"),
        &TransformContext::new("https://blog.example/feed", "https://blog.example/post"),
    );
    assert!(!doc.body().contains('`'));
    assert!(doc.body().contains("{{ name }}"));
}

#[test]
fn front_matter_is_unaffected_by_body_rewrites() {
    let resolver = Arc::new(StubResolver::new(Ok(String::new())));
    let doc = assembler(resolver).assemble(&rich_item(VIDEO_IFRAME), &ctx().mark_canonical(true));
    assert_eq!(
        doc.as_str(),
        format!(
            "---\ntitle: \"Rich\"\npublished: false\ndate: 2024-03-01T12:00:00Z\ntags: Programming\ncanonical_url: {ITEM_URL}\n---\n\n{{% youtube abc_2345678 %}}"
        )
    );
}

/// Default cleaner and converter; only the network is stubbed.
fn sanitizing_assembler(resolver: Arc<StubResolver>) -> ArticleAssembler {
    ArticleAssembler::default().with_redirect_resolver(resolver)
}

#[test]
fn sanitized_gist_iframe_becomes_gist_embed() {
    let resolver = Arc::new(StubResolver::new(Ok("https://gist.github.com/a/b_c".into())));
    let doc = sanitizing_assembler(resolver.clone()).assemble(&rich_item(GIST_IFRAME), &ctx());
    assert_eq!(doc.body(), "{% gist https://gist.github.com/a/b_c %}");
    assert_eq!(
        *resolver.asked.lock().unwrap(),
        vec!["https://medium.com/media/abc123/href".to_string()]
    );
}

#[test]
fn sanitized_content_keeps_gist_and_video_embeds() {
    let resolver = Arc::new(StubResolver::new(Ok(
        "https://gist.github.com/someone/abc123".into()
    )));
    let content = format!("<p>Code below</p>{GIST_IFRAME}<script>alert(1)</script>{VIDEO_IFRAME}");
    let doc = sanitizing_assembler(resolver).assemble(&rich_item(&content), &ctx());
    let body = doc.body();
    assert!(body.starts_with("Code below"), "body: {body}");
    assert!(body.contains("{% gist https://gist.github.com/someone/abc123 %}"), "body: {body}");
    assert!(body.contains("{% youtube abc_2345678 %}"), "body: {body}");
    assert!(!body.contains("alert"), "body: {body}");
}

#[test]
fn slot_shaped_text_in_the_feed_is_not_an_embed() {
    let resolver = Arc::new(StubResolver::new(Ok(String::new())));
    let forged = "FEEDEMBED0SLOT0TOLSDEBMEDEEF";
    let content = format!("<p>{forged}</p>{VIDEO_IFRAME}");
    let doc = sanitizing_assembler(resolver).assemble(&rich_item(&content), &ctx());
    let body = doc.body();
    assert_eq!(body.matches("{% youtube abc_2345678 %}").count(), 1, "body: {body}");
    assert!(body.contains(forged), "body: {body}");
}
