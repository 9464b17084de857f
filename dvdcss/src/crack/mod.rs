//! Cryptanalytic key recovery, used when the drive handshake is not
//! available.
//!
//! - [`crack_disc_key`] reverses the disc-key hash stored in the disc-key
//!   block.
//! - [`crack_title_key`] guesses a title key from scrambled MPEG sectors with
//!   a known-plaintext attack.

mod disc;
mod title;

pub use disc::crack_disc_key;
pub use title::{
    READ_LIMIT, UNSCRAMBLED_LIMIT, attack_pattern, crack_title_key, recover_title_key,
};

use crate::{Error, Result};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Shared flag used to stop a running key search from another thread.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Cancellation token and optional deadline of one key search.
#[derive(Clone, Debug)]
pub(crate) struct Budget {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl Budget {
    pub(crate) fn new(cancel: CancelToken, timeout: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: timeout.map(|x| Instant::now() + x),
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled("cancelled by caller".to_owned()));
        }

        if self.deadline.is_some_and(|x| Instant::now() >= x) {
            return Err(Error::Cancelled("timed out".to_owned()));
        }

        Ok(())
    }
}
