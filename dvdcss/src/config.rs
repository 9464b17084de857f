use crate::crack::CancelToken;
use std::{path::PathBuf, str::FromStr, time::Duration};

/// How much a session reports through the [`log`] facade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent,
    #[default]
    Errors,
    Debug,
}

/// Key acquisition strategy, each one falls back to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrackingMode {
    /// Drive handshake with the player keys, then disc key brute force,
    /// then title key guessing.
    #[default]
    Key,
    /// Disc key brute force, then title key guessing.
    Disc,
    /// Title key guessing only.
    Title,
}

impl FromStr for CrackingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(Self::Key),
            "disc" => Ok(Self::Disc),
            "title" => Ok(Self::Title),
            x => Err(format!(
                "invalid cracking mode '{}', expected key, disc or title",
                x
            )),
        }
    }
}

/// Persistent title key cache location.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CacheSetting {
    #[default]
    Off,
    Dir(PathBuf),
}

/// Session configuration, consulted when a target is opened.
///
/// ```
/// use dvdcss::{CacheSetting, Config, CrackingMode};
/// use std::time::Duration;
///
/// let config = Config::builder()
///     .method(CrackingMode::Title)
///     .cache(CacheSetting::Dir("/tmp/dvdcss".into()))
///     .crack_timeout(Duration::from_secs(60))
///     .build();
///
/// assert_eq!(config.method, CrackingMode::Title);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub verbosity: Verbosity,
    pub method: CrackingMode,
    pub cache: CacheSetting,
    pub crack_timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.config.verbosity = verbosity;
        self
    }

    pub fn method(mut self, method: CrackingMode) -> Self {
        self.config.method = method;
        self
    }

    pub fn cache(mut self, cache: CacheSetting) -> Self {
        self.config.cache = cache;
        self
    }

    /// Give up the disc key brute force after `timeout` and fall back to
    /// title key guessing.
    pub fn crack_timeout(mut self, timeout: Duration) -> Self {
        self.config.crack_timeout = Some(timeout);
        self
    }

    /// Token used to abort the disc key brute force.
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.config.cancel = cancel;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
