//! Embed markers recorded by the provider rewriters.
//!
//! Rewriters never put template text into the parse tree. They register an
//! [`EmbedTag`] and leave a placeholder token; the token is swapped for the
//! `{% ... %}` form once Markdown conversion is finished, so the converter
//! never gets a chance to escape it. Tokens carry a per-document nonce that
//! occurs nowhere in the feed content.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoProvider {
    YouTube,
    Vimeo,
}

impl VideoProvider {
    pub fn tag_name(self) -> &'static str {
        match self {
            VideoProvider::YouTube => "youtube",
            VideoProvider::Vimeo => "vimeo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialPlatform {
    Twitter,
}

impl SocialPlatform {
    pub fn tag_name(self) -> &'static str {
        match self {
            SocialPlatform::Twitter => "twitter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedTag {
    Gist { url: String },
    Video { provider: VideoProvider, id: String },
    Social { platform: SocialPlatform, id: String },
}

impl fmt::Display for EmbedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedTag::Gist { url } => write!(f, "{{% gist {url} %}}"),
            EmbedTag::Video { provider, id } => write!(f, "{{% {} {id} %}}", provider.tag_name()),
            EmbedTag::Social { platform, id } => {
                write!(f, "{{% {} {id} %}}", platform.tag_name())
            }
        }
    }
}

const SLOT_PREFIX: &str = "FEEDEMBED";
const SLOT_MID: &str = "SLOT";
const SLOT_SUFFIX: &str = "TOLSDEBMEDEEF";

/// An embed together with the token standing in for it until conversion is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedSlot {
    pub token: String,
    pub tag: EmbedTag,
}

/// Every token rendered with `nonce` starts with this.
pub(crate) fn slot_prefix(nonce: u32) -> String {
    format!("{SLOT_PREFIX}{nonce}{SLOT_MID}")
}

/// Alphanumeric token for the embed at `index`.
pub(crate) fn placeholder(nonce: u32, index: usize) -> String {
    format!("{}{index}{SLOT_SUFFIX}", slot_prefix(nonce))
}

/// Replaces every slot token with its embed tag.
///
/// Tokens must not occur in the document text or in any tag; the renderer
/// picks a nonce that guarantees it.
pub(crate) fn substitute_placeholders(markdown: &str, slots: &[EmbedSlot]) -> String {
    let mut output = markdown.to_string();
    for slot in slots {
        output = output.replace(&slot.token, &slot.tag.to_string());
    }
    output
}
