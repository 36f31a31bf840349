use crate::client::xrpc_json;
use crate::{Blob, Client, Did, Error, Post, PostRef};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::fmt;

/// Logged-in session.
#[derive(Clone)]
pub struct Session {
    pub(crate) client: Client,
    pub(crate) access_jwt: String,
    pub(crate) did: Did,
    pub(crate) handle: String,
}

impl Session {
    /// Logs into Bluesky with a handle (or email) and password, returning a `Session`.
    ///
    /// Use an app password; securely storing it is an exercise left to the caller.
    pub async fn login(identifier: &str, password: &str) -> Result<Session, Error> {
        Client::new().login(identifier, password).await
    }

    /// The DID of the logged-in account.
    #[must_use]
    pub fn did(&self) -> &Did {
        &self.did
    }

    /// The handle of the logged-in account.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// The client this session sends requests with.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Create a post.
    ///
    /// Uploads the post's new attachments, turns hashtags and resolvable mentions into facets,
    /// and publishes the record to the account's repository.
    #[tracing::instrument(skip(self, post), fields(did = %self.did))]
    pub async fn create_post(&self, post: &mut Post) -> Result<PostRef, Error> {
        post.send(self).await
    }

    /// Upload binary content, returning a [`Blob`] that can be embedded in a record.
    #[tracing::instrument(skip(self, content))]
    pub async fn upload_blob(
        &self,
        content: impl Into<Bytes>,
        mime_type: &str,
    ) -> Result<Blob, Error> {
        let content: Bytes = content.into();
        tracing::debug!(size = content.len());
        let UploadBlobResponse { blob } = xrpc_json(
            self.authed_post("com.atproto.repo.uploadBlob")
                .header(CONTENT_TYPE, mime_type)
                .body(content),
        )
        .await?;
        Ok(blob)
    }

    pub(crate) fn authed_post(&self, method: &str) -> RequestBuilder {
        self.client.post(method).bearer_auth(&self.access_jwt)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client", &self.client)
            .field("did", &self.did)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct UploadBlobResponse {
    blob: Blob,
}
