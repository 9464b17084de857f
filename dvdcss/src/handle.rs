use crate::{
    Error, Result,
    config::Config,
    device::SectorSource,
    session::{ReadFlag, SeekFlag, Session},
};
use std::{
    io::{Read, Seek},
    path::Path,
};

/// A slot holding at most one open [`Session`].
///
/// Opening twice fails with [`Error::AlreadyOpen`], every other operation
/// fails with [`Error::NoSession`] until a target is opened, and closing an
/// empty slot is a no-op.
///
/// ```no_run
/// use dvdcss::{Config, DvdCss, ReadFlag, SeekFlag};
///
/// let mut dvd = DvdCss::new();
/// dvd.open("movie.iso", Config::default())?;
/// dvd.seek(0, SeekFlag::Key)?;
/// let data = dvd.read(16, ReadFlag::Decrypt)?;
/// assert!(dvd.close()?);
/// assert!(!dvd.close()?);
/// # Ok::<(), dvdcss::Error>(())
/// ```
#[derive(Default)]
pub struct DvdCss {
    session: Option<Session>,
}

impl DvdCss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open<T: AsRef<Path>>(&mut self, target: T, config: Config) -> Result<()> {
        self.ensure_closed()?;
        self.session = Some(Session::open(target, config)?);
        Ok(())
    }

    pub fn open_stream<S>(&mut self, stream: S, config: Config) -> Result<()>
    where
        S: Read + Seek + Send + 'static,
    {
        self.ensure_closed()?;
        self.session = Some(Session::open_stream(stream, config)?);
        Ok(())
    }

    pub fn open_source(&mut self, source: Box<dyn SectorSource>, config: Config) -> Result<()> {
        self.ensure_closed()?;
        self.session = Some(Session::open_source(source, config)?);
        Ok(())
    }

    fn ensure_closed(&self) -> Result<()> {
        match self.session {
            Some(_) => Err(Error::AlreadyOpen),
            None => Ok(()),
        }
    }

    /// Close the open session. Returns `false` when there was none.
    pub fn close(&mut self) -> Result<bool> {
        match self.session.take() {
            Some(session) => session.close().map(|_| true),
            None => Ok(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NoSession)
    }

    pub fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(Error::NoSession)
    }

    pub fn seek(&mut self, block: u32, flag: SeekFlag) -> Result<u32> {
        self.session_mut()?.seek(block, flag)
    }

    pub fn read(&mut self, count: u32, flag: ReadFlag) -> Result<Vec<u8>> {
        self.session_mut()?.read(count, flag)
    }

    /// Latest error message of the open session.
    pub fn error(&self) -> Result<Option<&str>> {
        Ok(self.session()?.error())
    }

    pub fn is_scrambled(&self) -> Result<bool> {
        Ok(self.session()?.is_scrambled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_session() {
        let mut dvd = DvdCss::new();
        assert!(matches!(dvd.seek(0, SeekFlag::Unset), Err(Error::NoSession)));
        assert!(matches!(dvd.read(1, ReadFlag::Unset), Err(Error::NoSession)));
        assert!(matches!(dvd.error(), Err(Error::NoSession)));
        assert!(matches!(dvd.is_scrambled(), Err(Error::NoSession)));
        assert!(!dvd.close().unwrap());
    }

    #[test]
    fn failed_open_leaves_no_session() {
        let mut dvd = DvdCss::new();
        assert!(matches!(
            dvd.open("/nonexistent/dvdcss/disc.iso", Config::default()),
            Err(Error::NotFound(_))
        ));
        assert!(!dvd.is_open());
    }
}
