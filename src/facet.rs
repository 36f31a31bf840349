use crate::Error;
use async_trait::async_trait;
use derive_more::{Display, From, FromStr, Into};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// `@` followed by a handle, or `#` followed by a tag. Matches never overlap.
static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w.-]+|#\w+").expect("invalid token regex"));

/// A decentralized identifier, e.g. `did:plc:z72i7hdynmk6r22z27h6tvur`.
#[derive(
    Clone,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct Did(pub String);

impl Did {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Looks up the DID behind a handle.
///
/// [`Client`][`crate::Client`] implements this over the network. Any other implementation can be
/// passed to [`scan`], which makes the scanner testable without a server.
#[async_trait]
pub trait ResolveHandle {
    /// Resolves `handle` (without the leading `@`) to a DID.
    async fn resolve_handle(&self, handle: &str) -> Result<Did, Error>;
}

/// What a [`Token`] marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// `#tag`
    Tag,
    /// `@handle`
    Mention,
}

/// A hashtag or mention found in a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    /// Hashtag or mention.
    pub kind: TokenKind,
    /// The matched text, including the leading `#` or `@`.
    pub text: &'a str,
    /// Byte offset of the first byte of the match.
    pub start: usize,
    /// Byte offset one past the last byte of the match.
    pub end: usize,
}

impl<'a> Token<'a> {
    /// The matched text without its leading marker.
    #[must_use]
    pub fn body(&self) -> &'a str {
        &self.text[1..]
    }
}

/// Iterates over the hashtags and mentions in `text`, left to right.
pub fn tokenize(text: &str) -> impl Iterator<Item = Token<'_>> {
    TOKEN_REGEX.find_iter(text).map(|m| Token {
        kind: if m.as_str().starts_with('#') {
            TokenKind::Tag
        } else {
            TokenKind::Mention
        },
        text: m.as_str(),
        start: m.start(),
        end: m.end(),
    })
}

/// A half-open byte range `[byte_start, byte_end)` into the UTF-8 text of a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    /// Inclusive start.
    pub byte_start: usize,
    /// Exclusive end.
    pub byte_end: usize,
}

/// What a [`Facet`] says about its range of text.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "$type")]
pub enum Feature {
    /// A mention of another account.
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention {
        /// The mentioned account.
        did: Did,
    },
    /// A hashtag, stored without its `#`.
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag {
        /// Tag text.
        tag: String,
    },
}

/// Annotation of a range of post text.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Facet {
    /// The annotated bytes.
    pub index: ByteSlice,
    /// The annotation itself.
    pub features: Vec<Feature>,
}

impl Facet {
    fn new(token: &Token<'_>, feature: Feature) -> Facet {
        Facet {
            index: ByteSlice {
                byte_start: token.start,
                byte_end: token.end,
            },
            features: vec![feature],
        }
    }
}

/// Scans `text` for hashtags and mentions and returns their facets in text order.
///
/// Mentions are resolved one at a time, in order. A mention whose handle can't be resolved is
/// left as plain text; it never fails the scan.
#[tracing::instrument(skip(resolver))]
pub async fn scan<R>(text: &str, resolver: &R) -> Vec<Facet>
where
    R: ResolveHandle + ?Sized,
{
    let mut facets = Vec::new();
    if text.is_empty() {
        return facets;
    }

    for token in tokenize(text) {
        let feature = match token.kind {
            TokenKind::Tag => Feature::Tag {
                tag: token.body().to_owned(),
            },
            TokenKind::Mention => match resolver.resolve_handle(token.body()).await {
                Ok(did) if !did.0.is_empty() => Feature::Mention { did },
                Ok(_) => {
                    tracing::warn!(handle = token.body(), "empty DID, leaving mention as text");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(handle = token.body(), %err, "unresolved handle, leaving mention as text");
                    continue;
                }
            },
        };
        tracing::debug!(token = token.text, start = token.start, end = token.end, ?feature);
        facets.push(Facet::new(&token, feature));
    }
    facets
}
