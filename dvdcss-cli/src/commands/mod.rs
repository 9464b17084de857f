mod dump;
mod info;
mod keys;

pub use dump::Dump;
pub use info::Info;
pub use keys::Keys;

use anyhow::Result;
use clap::{ArgAction, ColorChoice, Parser, Subcommand, ValueEnum};
use dvdcss::{CacheSetting, CancelToken, Config, CrackingMode, Session, Verbosity};
use log::LevelFilter;
use std::{path::PathBuf, time::Duration};

/// Inspect, crack and descramble CSS protected DVD-Video discs, images and VIDEO_TS directories.
#[derive(Debug, Clone, Parser)]
#[command(version, author = "clitic <clitic21@gmail.com>", about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// When to output colored text.
    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Print debug messages, repeat for tracing.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Do not print error messages from the descrambling engine.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Off,
            (_, 0) => LevelFilter::Info,
            (_, 1) => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        match (self.quiet, self.verbose) {
            (true, _) => Verbosity::Silent,
            (_, 0) => Verbosity::Errors,
            _ => Verbosity::Debug,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Info(Info),
    Keys(Keys),
    Dump(Dump),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Method {
    /// Drive authentication, then disc key cracking, then title key guessing.
    Key,
    /// Disc key cracking, then title key guessing.
    Disc,
    /// Title key guessing only.
    Title,
}

impl From<Method> for CrackingMode {
    fn from(method: Method) -> Self {
        match method {
            Method::Key => Self::Key,
            Method::Disc => Self::Disc,
            Method::Title => Self::Title,
        }
    }
}

/// Options shared by every sub-command opening a target.
#[derive(Debug, Clone, clap::Args)]
pub struct Target {
    /// DVD device, disc image or directory holding VIDEO_TS files.
    #[arg(required = true)]
    pub input: PathBuf,

    /// Key acquisition method.
    #[arg(short, long, value_enum, default_value_t = Method::Key)]
    pub method: Method,

    /// Directory where recovered title keys are cached.
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Give up cracking the disc key after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl Target {
    /// Open the target, aborting the disc key search on ctrl+c.
    pub fn open(&self, verbosity: Verbosity) -> Result<(Session, CancelToken)> {
        let cancel = CancelToken::new();
        let handler = cancel.clone();
        ctrlc::set_handler(move || handler.cancel())?;

        let mut builder = Config::builder()
            .verbosity(verbosity)
            .method(self.method.into())
            .cancel_token(cancel.clone());

        if let Some(cache) = &self.cache {
            builder = builder.cache(CacheSetting::Dir(cache.to_owned()));
        }

        if let Some(timeout) = self.timeout {
            builder = builder.crack_timeout(Duration::from_secs(timeout));
        }

        let session = Session::open(&self.input, builder.build())?;
        Ok((session, cancel))
    }
}
