#![cfg_attr(docsrs, feature(doc_cfg))]

//! This crate contains a native CSS (Content Scramble System) descrambling engine for DVD-Video discs.
//! It reads raw 2048-byte sectors from a DVD drive, a disc image, an unpacked `VIDEO_TS` directory or any
//! seekable stream, acquires the title keys and descrambles the MPEG program stream sectors.
//!
//! Keys are acquired in order, each step falling back to the next:
//!
//! - **Drive handshake**: the disc key block is read through a [`Drive`](auth::Drive) and decrypted with
//!   the built-in player keys.
//! - **Disc key brute force**: the disc key hash is reversed in parallel with [rayon](https://docs.rs/rayon).
//! - **Title key guessing**: title keys are recovered from the scrambled sectors with a known plaintext attack.
//!
//! Recovered title keys can be persisted in a cache directory, keyed by the identity of the disc.
//!
//! # Example
//!
//! ```no_run
//! use dvdcss::{CacheSetting, Config, ReadFlag, SeekFlag, Session};
//!
//! let config = Config::builder()
//!     .cache(CacheSetting::Dir("keys".into()))
//!     .build();
//!
//! let mut session = Session::open("movie.iso", config)?;
//!
//! for file in session.layout()? {
//!     println!("{} at block {}", file.name, file.start);
//! }
//!
//! session.seek(0, SeekFlag::Key)?;
//! let plaintext = session.read(16, ReadFlag::Decrypt)?;
//! # Ok::<(), dvdcss::Error>(())
//! ```

#[macro_use]
mod macros;

pub mod auth;
pub mod cache;
pub mod crack;
pub mod css;
pub mod device;
pub mod layout;

mod config;
mod error;
mod handle;
mod session;

pub use config::{CacheSetting, Config, ConfigBuilder, CrackingMode, Verbosity};
pub use crack::CancelToken;
pub use css::Key;
pub use error::Error;
pub use handle::DvdCss;
pub use session::{ReadFlag, SeekFlag, Session};

/// Size of a logical block in bytes.
pub const BLOCK_SIZE: usize = 2048;

/// A `Result` alias where the `Err` case is `dvdcss::Error`.
pub type Result<T> = std::result::Result<T, Error>;
