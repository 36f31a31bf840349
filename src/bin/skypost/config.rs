//! Account and endpoint settings, gathered from flags, the environment, and a TOML file.

use crate::UsageError;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_PDS: &str = "https://bsky.social";

/// One layer of settings. Flags and environment variables form one layer, the config file
/// another; [`Layer::or`] stacks them.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Layer {
    pub handle: Option<String>,
    pub password: Option<String>,
    pub pds: Option<String>,
    pub default_domain: Option<String>,
}

impl Layer {
    /// Loads the config file at `explicit`, or the default one if it exists.
    ///
    /// A missing default file is an empty layer; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Layer> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("no config file");
                    return Ok(Layer::default());
                }
            },
        };
        Layer::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Layer> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let layer = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(layer)
    }

    /// Fills the unset values of `self` from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Layer) -> Layer {
        Layer {
            handle: self.handle.or(fallback.handle),
            password: self.password.or(fallback.password),
            pds: self.pds.or(fallback.pds),
            default_domain: self.default_domain.or(fallback.default_domain),
        }
    }
}

/// `$XDG_CONFIG_HOME/skypost/config.toml`, or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("skypost").join("config.toml"))
}

/// Everything needed to log in.
pub struct Settings {
    pub handle: String,
    pub password: String,
    pub xrpc_url: String,
    pub default_domain: Option<String>,
}

impl TryFrom<Layer> for Settings {
    type Error = UsageError;

    fn try_from(layer: Layer) -> Result<Settings, UsageError> {
        let non_empty = |value: Option<String>| value.filter(|value| !value.is_empty());
        Ok(Settings {
            handle: non_empty(layer.handle).ok_or(UsageError::MissingSetting("handle"))?,
            password: non_empty(layer.password).ok_or(UsageError::MissingSetting("password"))?,
            xrpc_url: xrpc_url(layer.pds.as_deref().unwrap_or(DEFAULT_PDS)),
            default_domain: non_empty(layer.default_domain),
        })
    }
}

/// Accepts either a PDS origin or its `/xrpc` endpoint.
fn xrpc_url(pds: &str) -> String {
    let pds = pds.trim_end_matches('/');
    if pds.ends_with("/xrpc") {
        pds.to_owned()
    } else {
        format!("{}/xrpc", pds)
    }
}

#[cfg(test)]
mod tests {
    use super::{xrpc_url, Layer, Settings};
    use crate::UsageError;
    use std::io::Write;

    fn layer(handle: Option<&str>, password: Option<&str>) -> Layer {
        Layer {
            handle: handle.map(Into::into),
            password: password.map(Into::into),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
handle = "alice.bsky.social"
password = "abcd-efgh-ijkl-mnop"
default_domain = "example.com"
"#
        )
        .unwrap();

        let layer = Layer::load(Some(file.path())).unwrap();
        assert_eq!(layer.handle.as_deref(), Some("alice.bsky.social"));
        assert_eq!(layer.password.as_deref(), Some("abcd-efgh-ijkl-mnop"));
        assert_eq!(layer.pds, None);
        assert_eq!(layer.default_domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_unknown_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"BLUESKY_HANDLE = "alice""#).unwrap();
        assert!(Layer::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Layer::load(Some(dir.path().join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn test_precedence() {
        let flags = layer(Some("flag.bsky.social"), None);
        let file = Layer {
            pds: Some("https://pds.example".into()),
            ..layer(Some("file.bsky.social"), Some("file-password"))
        };

        let settings = Settings::try_from(flags.or(file)).unwrap();
        assert_eq!(settings.handle, "flag.bsky.social");
        assert_eq!(settings.password, "file-password");
        assert_eq!(settings.xrpc_url, "https://pds.example/xrpc");
        assert_eq!(settings.default_domain, None);
    }

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(
            Settings::try_from(layer(None, Some("pw"))),
            Err(UsageError::MissingSetting("handle"))
        ));
        assert!(matches!(
            Settings::try_from(layer(Some("alice"), Some(""))),
            Err(UsageError::MissingSetting("password"))
        ));
    }

    #[test]
    fn test_xrpc_url() {
        assert_eq!(xrpc_url("https://bsky.social"), "https://bsky.social/xrpc");
        assert_eq!(xrpc_url("https://bsky.social/"), "https://bsky.social/xrpc");
        assert_eq!(xrpc_url("https://pds.example/xrpc/"), "https://pds.example/xrpc");
    }
}
