//! skypost - post a message, with optional images, to Bluesky

#![deny(elided_lifetimes_in_paths)]
#![warn(clippy::pedantic)]

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Layer, Settings};
use skypost::{Attachment, Client, Post, MAX_IMAGES};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "skypost", version)]
#[command(about = "Post a message, with optional images, to Bluesky", long_about = None)]
struct Cli {
    /// Message to post (read from stdin if not provided)
    #[arg(short, long)]
    message: Option<String>,

    /// Images to attach, comma separated (at most 4)
    #[arg(short, long, value_delimiter = ',')]
    images: Vec<PathBuf>,

    /// Alt text for each image, in the same order as --images
    #[arg(long = "alt")]
    alt_texts: Vec<String>,

    /// Account handle or email
    #[arg(long, env = "BSKY_HANDLE")]
    handle: Option<String>,

    /// App password
    #[arg(long, env = "BSKY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// PDS to log in to [default: https://bsky.social]
    #[arg(long, env = "BSKY_PDS")]
    pds: Option<String>,

    /// Config file [default: ~/.config/skypost/config.toml]
    #[arg(short, long, env = "SKYPOST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print the created post as JSON
    #[arg(long)]
    json: bool,
}

/// Problems with how skypost was invoked, as opposed to failures while posting.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("no message given; use --message or pipe text on stdin")]
    NoMessage,

    #[error("no {0} configured; pass --{0}, set it in the environment, or add it to the config file")]
    MissingSetting(&'static str),
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.debug { "skypost=debug" } else { "warn" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(exit_code(&err));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let text = match cli.message {
        Some(message) => message,
        None => read_piped_stdin().await?,
    };
    if text.is_empty() {
        return Err(UsageError::NoMessage.into());
    }

    let flags = Layer {
        handle: cli.handle,
        password: cli.password,
        pds: cli.pds,
        default_domain: None,
    };
    let settings = Settings::try_from(flags.or(Layer::load(cli.config.as_deref())?))?;

    let mut client = Client::new().with_base_url(settings.xrpc_url);
    if let Some(domain) = settings.default_domain {
        client = client.with_default_domain(domain);
    }
    let session = client
        .login(&settings.handle, &settings.password)
        .await
        .context("failed to log in")?;

    if cli.images.len() > MAX_IMAGES {
        tracing::warn!(
            count = cli.images.len(),
            "only the first {} images are posted",
            MAX_IMAGES
        );
    }
    let mut attachments = Vec::new();
    for (i, path) in cli.images.iter().take(MAX_IMAGES).enumerate() {
        let alt_text = cli.alt_texts.get(i).cloned().unwrap_or_default();
        match Attachment::new_from_file(path, alt_text).await {
            Ok(attachment) => attachments.push(attachment),
            Err(err) => tracing::warn!(path = %path.display(), %err, "skipping image"),
        }
    }

    let mut post = Post { text, attachments };
    let created = session
        .create_post(&mut post)
        .await
        .context("failed to create post")?;

    if cli.json {
        println!("{}", serde_json::to_string(&created)?);
    } else {
        println!("{}", created.uri);
    }
    Ok(())
}

/// Reads the message from stdin, unless stdin is a terminal.
async fn read_piped_stdin() -> Result<String> {
    if std::io::stdin().is_terminal() {
        return Ok(String::new());
    }
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("failed to read message from stdin")?;
    Ok(text.trim().to_owned())
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<UsageError>().is_some() {
        3
    } else if err
        .downcast_ref::<skypost::Error>()
        .is_some_and(skypost::Error::is_unauthorized)
    {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::{exit_code, Cli, UsageError};
    use anyhow::Context;
    use clap::Parser;

    #[test]
    fn test_parse_images() {
        let cli = Cli::parse_from([
            "skypost", "-m", "hi", "-i", "a.jpg,b.png", "--alt", "first",
        ]);
        assert_eq!(cli.message.as_deref(), Some("hi"));
        assert_eq!(cli.images, ["a.jpg", "b.png"].map(std::path::PathBuf::from));
        assert_eq!(cli.alt_texts, ["first"]);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&UsageError::NoMessage.into()), 3);

        let unauthorized: Result<(), skypost::Error> = Err(skypost::Error::Xrpc {
            status: reqwest::StatusCode::UNAUTHORIZED,
            error: "AuthenticationRequired".into(),
            message: "Invalid identifier or password".into(),
        });
        assert_eq!(exit_code(&unauthorized.context("failed to log in").unwrap_err()), 2);

        let empty: anyhow::Result<()> = Err(skypost::Error::EmptyPost.into());
        assert_eq!(exit_code(&empty.unwrap_err()), 1);
    }
}
