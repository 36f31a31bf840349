use crate::{Error, Session};
use bytes::Bytes;
use imagesize::ImageType;
use serde::{Deserialize, Serialize};

/// Images wider or taller than this are downscaled before upload (with the `resize` feature).
pub const MAX_IMAGE_DIMENSION: u32 = 2048;

#[cfg(feature = "resize")]
const JPEG_QUALITY: u8 = 85;

/// A content identifier link, `{"$link": "bafkrei..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct CidLink {
    /// The CID, as a string.
    #[serde(rename = "$link")]
    pub link: String,
}

/// Reference to uploaded binary content, as returned by the server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "$type", rename = "blob", rename_all = "camelCase")]
pub struct Blob {
    /// Content identifier of the uploaded bytes.
    #[serde(rename = "ref")]
    pub reference: CidLink,
    /// Content type the blob was uploaded with.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// An image attached to a [`Post`][`crate::Post`].
#[derive(Debug)]
pub struct Attachment {
    /// Alt text. When empty, a positional caption ("Image 1") is used instead.
    pub alt_text: String,
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    New { content: Bytes, mime_type: String },
    Uploaded(Blob),
    Failed,
}

impl Attachment {
    /// Create an `Attachment` from a buffer.
    ///
    /// The content type is detected from the image header; anything other than JPEG, PNG, GIF,
    /// or WebP is rejected with [`Error::UnsupportedMedia`].
    pub fn new(content: impl Into<Bytes>, alt_text: String) -> Result<Attachment, Error> {
        let content: Bytes = content.into();
        let mime_type = sniff_mime_type(&content)?.to_owned();
        Ok(Attachment {
            alt_text,
            inner: Inner::New { content, mime_type },
        })
    }

    /// Create an `Attachment` from a file on disk.
    #[cfg(feature = "fs")]
    pub async fn new_from_file(
        path: impl AsRef<std::path::Path>,
        alt_text: String,
    ) -> Result<Attachment, Error> {
        let content = tokio::fs::read(path).await?;
        Attachment::new(content, alt_text)
    }

    /// Not uploaded yet.
    pub fn is_new(&self) -> bool {
        matches!(self.inner, Inner::New { .. })
    }

    /// Uploaded; [`Attachment::blob`] returns its reference.
    pub fn is_uploaded(&self) -> bool {
        matches!(self.inner, Inner::Uploaded(_))
    }

    /// An upload was attempted and failed. Failed attachments can't be posted.
    pub fn is_failed(&self) -> bool {
        matches!(self.inner, Inner::Failed)
    }

    /// The content type detected for a new attachment, or the one it was uploaded with.
    pub fn mime_type(&self) -> Option<&str> {
        match &self.inner {
            Inner::New { mime_type, .. } => Some(mime_type),
            Inner::Uploaded(blob) => Some(&blob.mime_type),
            Inner::Failed => None,
        }
    }

    /// The uploaded blob, once the attachment has been uploaded.
    pub fn blob(&self) -> Option<&Blob> {
        match &self.inner {
            Inner::Uploaded(blob) => Some(blob),
            _ => None,
        }
    }

    #[tracing::instrument(skip(self, session), fields(alt_text = %self.alt_text))]
    pub(crate) async fn upload(&mut self, session: &Session) -> Result<(), Error> {
        let (content, mime_type) = match std::mem::replace(&mut self.inner, Inner::Failed) {
            Inner::New { content, mime_type } => (content, mime_type),
            uploaded @ Inner::Uploaded(_) => {
                self.inner = uploaded;
                return Ok(());
            }
            Inner::Failed => return Err(Error::FailedAttachment),
        };

        #[cfg(feature = "resize")]
        let (content, mime_type) = match downscale_blocking(content.clone()).await? {
            Some(jpeg) => (jpeg, "image/jpeg".to_owned()),
            None => (content, mime_type),
        };

        let blob = session.upload_blob(content, &mime_type).await?;
        tracing::info!(cid = %blob.reference.link, size = blob.size);
        self.inner = Inner::Uploaded(blob);
        Ok(())
    }
}

fn sniff_mime_type(content: &[u8]) -> Result<&'static str, Error> {
    match imagesize::image_type(content) {
        Ok(ImageType::Jpeg) => Ok("image/jpeg"),
        Ok(ImageType::Png) => Ok("image/png"),
        Ok(ImageType::Gif) => Ok("image/gif"),
        Ok(ImageType::Webp) => Ok("image/webp"),
        Ok(other) => Err(Error::UnsupportedMedia(format!(
            "{:?} images are not accepted",
            other
        ))),
        Err(err) => Err(Error::UnsupportedMedia(format!(
            "not a recognized image ({:?})",
            err
        ))),
    }
}

#[cfg(feature = "resize")]
async fn downscale_blocking(content: Bytes) -> Result<Option<Bytes>, Error> {
    tokio::task::spawn_blocking(move || downscale(&content))
        .await
        .map_err(|err| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?
}

/// Re-encodes `content` as a JPEG no larger than [`MAX_IMAGE_DIMENSION`] on either side,
/// keeping its aspect ratio. Returns `None` if the image is already small enough.
#[cfg(feature = "resize")]
fn downscale(content: &[u8]) -> Result<Option<Bytes>, Error> {
    use image::{DynamicImage, GenericImageView, ImageOutputFormat};
    use std::io::Cursor;

    let max = MAX_IMAGE_DIMENSION as usize;
    match imagesize::blob_size(content) {
        Ok(size) if size.width <= max && size.height <= max => {
            tracing::debug!(width = size.width, height = size.height, "within limits");
            return Ok(None);
        }
        Ok(_) => {}
        Err(err) => {
            tracing::debug!(?err, "could not read image size, uploading as-is");
            return Ok(None);
        }
    }

    let original = image::load_from_memory(content)?;
    let resized = original.thumbnail(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION);
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(resized.to_rgb8())
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    tracing::info!(
        from = ?original.dimensions(),
        to = ?resized.dimensions(),
        size = buf.len(),
        "downscaled image"
    );
    Ok(Some(buf.into()))
}
