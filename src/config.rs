//! Configuration for the media center connection and the thumbnail cache.
//!
//! Configuration is read from a small TOML file. Every field has a default,
//! so an empty file (or no file at all) yields a configuration that talks to
//! `localhost:8080` without credentials:
//!
//! ```toml
//! host = "192.168.1.20"
//! port = 8080
//! username = "xbmc"
//! password = "secret"
//! cache_dir = "/var/cache/mcremote"
//! timeout_secs = 10
//!
//! [memory]
//! small = 256
//! medium = 64
//! big = 8
//! ```

use std::{fs, num::NonZeroUsize, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;
use veil::Redact;

use crate::{
    cache::Tier,
    error::{Error, Result},
};

/// Password for HTTP basic authentication against the media center.
#[derive(Clone, PartialEq, Eq, Deserialize, Redact)]
#[redact(all)]
pub struct Password(String);

impl Password {
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Number of decoded thumbnails kept in memory, per tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryCapacity {
    pub small: NonZeroUsize,
    pub medium: NonZeroUsize,
    pub big: NonZeroUsize,
}

impl MemoryCapacity {
    #[must_use]
    pub fn for_tier(&self, tier: Tier) -> NonZeroUsize {
        match tier {
            Tier::Small => self.small,
            Tier::Medium => self.medium,
            Tier::Big => self.big,
        }
    }
}

impl Default for MemoryCapacity {
    fn default() -> Self {
        Self {
            small: NonZeroUsize::new(256).unwrap_or(NonZeroUsize::MIN),
            medium: NonZeroUsize::new(64).unwrap_or(NonZeroUsize::MIN),
            big: NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,

    pub username: Option<String>,
    pub password: Option<Password>,

    pub cache_dir: PathBuf,
    pub memory: MemoryCapacity,

    pub timeout_secs: u64,

    #[serde(skip)]
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        let cache_dir = dirs_next::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(env!("CARGO_PKG_NAME"));

        Self {
            host: "localhost".to_owned(),
            port: 8080,

            username: None,
            password: None,

            cache_dir,
            memory: MemoryCapacity::default(),

            timeout_secs: 10,

            user_agent: Self::user_agent(),
        }
    }
}

impl Config {
    /// Maximum size of a configuration file in bytes.
    const MAX_FILE_SIZE: u64 = 16 * 1024;

    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is larger than 16 KiB, or
    /// does not contain valid configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: configuration files are small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::out_of_range(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// Base URL of the media center's HTTP API.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` and `port` do not form a valid URL.
    pub fn base_url(&self) -> Result<url::Url> {
        let url = format!("http://{}:{}/", self.host, self.port).parse::<url::Url>()?;
        Ok(url)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds a `User-Agent` in the form `name/version (Rust; os/version)`.
    fn user_agent() -> String {
        let app_name = env!("CARGO_PKG_NAME");
        let app_version = env!("CARGO_PKG_VERSION");

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");

        user_agent
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::invalid_argument("host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::invalid_argument("port must not be zero"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::invalid_argument("timeout_secs must not be zero"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::invalid_argument(
                "password is set but username is missing",
            ));
        }

        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = toml::from_str::<Self>(s)?;
        config.user_agent = Self::user_agent();
        config.validate()?;

        Ok(config)
    }
}
