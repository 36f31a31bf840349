use crate::{Did, Error, ResolveHandle, Session};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Domain appended to handles written without one, e.g. `@alice`.
pub const DEFAULT_HANDLE_DOMAIN: &str = "bsky.social";

macro_rules! request_impl {
    ($($f:ident),* $(,)*) => {
        $(
            #[inline]
            pub(crate) fn $f(&self, method: &str) -> RequestBuilder {
                tracing::info!(method, concat!("Client::", stringify!($f)));
                self.client.$f(format!("{}{}", self.base_url, method))
            }
        )*
    };
}

/// HTTP client.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) base_url: Cow<'static, str>,
    pub(crate) default_domain: Cow<'static, str>,
    pub(crate) client: reqwest::Client,
}

impl Client {
    /// Creates a new `Client` with the default base URL, `https://bsky.social/xrpc/`. Use
    /// [`Client::with_base_url`] to talk to another PDS.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // tested to not panic
    pub fn new() -> Client {
        const USER_AGENT: &str = concat!("skypost/", env!("CARGO_PKG_VERSION"));

        Client {
            base_url: Cow::Borrowed("https://bsky.social/xrpc/"),
            default_domain: Cow::Borrowed(DEFAULT_HANDLE_DOMAIN),
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap(),
        }
    }

    /// Creates a new `Client` with a custom XRPC base URL, e.g. `https://pds.example/xrpc/`.
    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Client {
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = Cow::Owned(base_url);
        self
    }

    /// Sets the domain appended to bare handles before they are resolved.
    #[must_use]
    pub fn with_default_domain(mut self, domain: String) -> Client {
        self.default_domain = Cow::Owned(domain.trim_start_matches('.').to_owned());
        self
    }

    /// Logs into Bluesky with a handle (or email) and password, returning a [`Session`].
    ///
    /// Use an app password; securely storing it is an exercise left to the caller.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(self, identifier: &str, password: &str) -> Result<Session, Error> {
        let CreateSessionResponse {
            access_jwt,
            did,
            handle,
        } = xrpc_json(
            self.post("com.atproto.server.createSession")
                .json(&CreateSessionRequest {
                    identifier,
                    password,
                }),
        )
        .await?;
        tracing::info!(%did, %handle, "logged in");

        Ok(Session {
            client: self,
            access_jwt,
            did,
            handle,
        })
    }

    request_impl!(get, post);
}

impl Default for Client {
    fn default() -> Client {
        Client::new()
    }
}

#[async_trait]
impl ResolveHandle for Client {
    #[tracing::instrument(skip(self))]
    async fn resolve_handle(&self, handle: &str) -> Result<Did, Error> {
        let handle = normalize_handle(handle, &self.default_domain);
        let ResolveHandleResponse { did } = xrpc_json(
            self.get("com.atproto.identity.resolveHandle")
                .query(&[("handle", handle.as_ref())]),
        )
        .await?;
        if did.0.is_empty() {
            return Err(Error::EmptyIdentifier(handle.into_owned()));
        }
        tracing::debug!(%did);
        Ok(did)
    }
}

/// Appends `.{default_domain}` to handles that contain no `.`.
pub(crate) fn normalize_handle<'a>(handle: &'a str, default_domain: &str) -> Cow<'a, str> {
    if handle.contains('.') {
        Cow::Borrowed(handle)
    } else {
        Cow::Owned(format!("{}.{}", handle, default_domain))
    }
}

/// Sends an XRPC request and decodes its JSON response.
pub(crate) async fn xrpc_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Error> {
    Ok(check_status(request.send().await?).await?.json().await?)
}

/// Turns a failure status into [`Error::Xrpc`], keeping the server's error name and message.
pub(crate) async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    let (error, message) = match serde_json::from_str::<XrpcErrorBody>(&body) {
        Ok(XrpcErrorBody { error, message }) => (error, message.unwrap_or_default()),
        Err(_) => (
            status.canonical_reason().unwrap_or("Unknown").to_owned(),
            body,
        ),
    };
    tracing::debug!(%status, %error, %message, "xrpc error");
    Err(Error::Xrpc {
        status,
        error,
        message,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    access_jwt: String,
    did: Did,
    handle: String,
}

#[derive(Deserialize)]
struct ResolveHandleResponse {
    did: Did,
}

#[derive(Deserialize)]
struct XrpcErrorBody {
    error: String,
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{normalize_handle, Client};

    #[test]
    fn client_new_doesnt_panic() {
        drop(Client::new());
    }

    #[test]
    fn test_with_base_url() {
        let client = Client::new().with_base_url("https://pds.example/xrpc".into());
        assert_eq!(client.base_url, "https://pds.example/xrpc/");
        let client = Client::new().with_base_url("https://pds.example/xrpc/".into());
        assert_eq!(client.base_url, "https://pds.example/xrpc/");
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("alice", "bsky.social"), "alice.bsky.social");
        assert_eq!(
            normalize_handle("alice.example.com", "bsky.social"),
            "alice.example.com"
        );

        let client = Client::new().with_default_domain(".example".into());
        assert_eq!(normalize_handle("bob", &client.default_domain), "bob.example");
    }
}
