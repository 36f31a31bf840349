//! skypost is a small library for posting to [Bluesky](https://bsky.app) over the AT Protocol's
//! XRPC API, with hashtags and mentions turned into rich-text facets and up to four images
//! attached.
//!
//! ```no_run
//! use skypost::{Attachment, Post, Session};
//!
//! # async fn f() -> Result<(), Box<dyn std::error::Error>> {
//! // Log in with an app password
//! let session = Session::login("alice.bsky.social", "abcd-efgh-ijkl-mnop").await?;
//!
//! // Describe a post
//! let mut post = Post {
//!     text: "hello from #skypost, cc @bob".into(),
//!     attachments: vec![Attachment::new_from_file("cat.jpg", "a cat".into()).await?],
//! };
//!
//! // `#skypost` becomes a tag facet; `@bob` is resolved as bob.bsky.social
//! let created = session.create_post(&mut post).await?;
//! println!("{}", created.uri);
//! # Ok(())
//! # }
//! ```
//!
//! The scanner and record assembly are usable on their own, without a network connection; see
//! [`scan`] and [`PostRecord::assemble`].

#![deny(elided_lifetimes_in_paths)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::missing_errors_doc)]

mod attachment;
mod client;
mod error;
mod facet;
mod post;
mod session;

pub use crate::attachment::{Attachment, Blob, CidLink, MAX_IMAGE_DIMENSION};
pub use crate::client::{Client, DEFAULT_HANDLE_DOMAIN};
pub use crate::error::Error;
pub use crate::facet::{
    scan, tokenize, ByteSlice, Did, Facet, Feature, ResolveHandle, Token, TokenKind,
};
pub use crate::post::{Embed, EmbedImage, Post, PostRecord, PostRef, MAX_IMAGES};
pub use crate::session::Session;
