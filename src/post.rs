use crate::client::xrpc_json;
use crate::{scan, Attachment, Blob, Did, Error, Facet, Session};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{self, Debug};

/// Most images a single post can embed. Extra images are dropped.
pub const MAX_IMAGES: usize = 4;

const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Where a created post lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PostRef {
    /// `at://` URI of the post record.
    pub uri: String,
    /// Content identifier of the post record.
    pub cid: String,
}

/// Describes a post's contents.
///
/// When you send a post with [`Session::create_post`], the `Post` must be mutable. This is
/// because its [`attachments`][`Post::attachments`] are marked as uploaded along the way, so a
/// retry after a failure doesn't upload them twice.
#[derive(Debug, Default)]
#[must_use]
pub struct Post {
    /// Post text. Hashtags and `@handle` mentions in it are turned into facets.
    pub text: String,
    /// Images, embedded in order. Only the first [`MAX_IMAGES`] are used.
    pub attachments: Vec<Attachment>,
}

impl Post {
    /// Returns true if the post has no content (no text or attachments).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.attachments.is_empty()
    }

    pub(crate) async fn send(&mut self, session: &Session) -> Result<PostRef, Error> {
        if self.is_empty() {
            return Err(Error::EmptyPost);
        }
        if self.attachments.len() > MAX_IMAGES {
            tracing::warn!(
                count = self.attachments.len(),
                "too many attachments, only the first {} are used",
                MAX_IMAGES
            );
        }
        let mut attachments = self
            .attachments
            .iter_mut()
            .take(MAX_IMAGES)
            .collect::<Vec<_>>();
        if attachments.iter().any(|attachment| attachment.is_failed()) {
            return Err(Error::FailedAttachment);
        }

        for attachment in &mut attachments {
            attachment.upload(session).await?;
        }
        let images = attachments
            .iter()
            .filter_map(|attachment| {
                let blob = attachment.blob()?.clone();
                Some((blob, attachment.alt_text.clone()))
            })
            .collect::<Vec<_>>();

        let facets = scan(&self.text, &session.client).await;
        let record = PostRecord::assemble(self.text.clone(), facets, images, Utc::now());
        tracing::debug!(?record);

        let post_ref: PostRef = xrpc_json(
            session
                .authed_post("com.atproto.repo.createRecord")
                .json(&CreateRecordRequest {
                    repo: &session.did,
                    collection: POST_COLLECTION,
                    record: &record,
                }),
        )
        .await?;
        tracing::info!(uri = %post_ref.uri, cid = %post_ref.cid);
        Ok(post_ref)
    }
}

/// An `app.bsky.feed.post` record, ready to be sent.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "$type", rename = "app.bsky.feed.post", rename_all = "camelCase")]
pub struct PostRecord {
    text: String,
    #[serde(serialize_with = "serialize_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    facets: Option<Vec<Facet>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embed: Option<Embed>,
}

impl PostRecord {
    /// Builds a post record.
    ///
    /// `facets` and `images` are left out of the record entirely when empty. Only the first
    /// [`MAX_IMAGES`] images are embedded; an image with empty alt text gets a positional caption
    /// ("Image 1", "Image 2", ...).
    pub fn assemble(
        text: impl Into<String>,
        facets: Vec<Facet>,
        images: impl IntoIterator<Item = (Blob, String)>,
        now: DateTime<Utc>,
    ) -> PostRecord {
        let mut images = images.into_iter().collect::<Vec<_>>();
        if images.len() > MAX_IMAGES {
            tracing::warn!(count = images.len(), "dropping images past the first {}", MAX_IMAGES);
            images.truncate(MAX_IMAGES);
        }

        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, (image, alt))| EmbedImage {
                image,
                alt: if alt.is_empty() {
                    format!("Image {}", i + 1)
                } else {
                    alt
                },
            })
            .collect::<Vec<_>>();

        PostRecord {
            text: text.into(),
            created_at: now,
            facets: (!facets.is_empty()).then_some(facets),
            embed: (!images.is_empty()).then_some(Embed::Images { images }),
        }
    }

    /// Post text, verbatim.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the record was assembled.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Facets, in text order; empty if the record has none.
    #[must_use]
    pub fn facets(&self) -> &[Facet] {
        self.facets.as_deref().unwrap_or_default()
    }

    /// Embedded images, if any.
    #[must_use]
    pub fn embed(&self) -> Option<&Embed> {
        self.embed.as_ref()
    }
}

impl Debug for PostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::to_value(self).map_err(|_| fmt::Error)?)
    }
}

/// Media embedded in a post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "$type")]
pub enum Embed {
    /// Up to [`MAX_IMAGES`] images.
    #[serde(rename = "app.bsky.embed.images")]
    Images {
        /// The images, in display order.
        images: Vec<EmbedImage>,
    },
}

/// One embedded image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    /// The uploaded image.
    pub image: Blob,
    /// Alt text.
    pub alt: String,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a Did,
    collection: &'a str,
    record: &'a PostRecord,
}

fn serialize_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .serialize(serializer)
}
