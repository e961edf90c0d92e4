use ammonia::Builder;

/// Strips disallowed tags and attributes from third-party HTML.
pub trait HtmlCleaner: Send + Sync {
    fn clean_html(&self, raw: &str) -> String;
}

/// Ammonia's default allow-list, widened so embeds and lazy images survive
/// until the provider rewriters have seen them.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmmoniaCleaner;

impl HtmlCleaner for AmmoniaCleaner {
    fn clean_html(&self, raw: &str) -> String {
        let mut builder = Builder::default();
        builder
            .add_tags(&["iframe"])
            .add_tag_attributes(
                "iframe",
                &["src", "width", "height", "frameborder", "allowfullscreen"],
            )
            .add_tag_attributes("img", &["data-src"])
            .link_rel(None);
        builder.clean(raw).to_string()
    }
}
