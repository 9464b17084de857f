use super::{SectorSource, StreamSource, TargetKind};
use crate::{BLOCK_SIZE, Error, Result};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

/// Sector source over a block device or a disc image file.
pub struct FileSource {
    path: PathBuf,
    inner: StreamSource<File>,
}

impl FileSource {
    /// Open a disc image, its length must be a whole number of blocks.
    pub fn open_image<T: AsRef<Path>>(path: T) -> Result<Self> {
        let path = path.as_ref();
        let file = open(path)?;
        let len = file.metadata().map_err(|e| Error::from_open(&display(path), e))?.len();

        if len == 0 || len % BLOCK_SIZE as u64 != 0 {
            return Err(Error::NotADisc(format!(
                "{} is {} bytes, not a whole number of {} byte blocks",
                display(path),
                len,
                BLOCK_SIZE
            )));
        }

        Ok(Self {
            path: path.to_owned(),
            inner: StreamSource::with_kind(file, TargetKind::Image)?,
        })
    }

    /// Open a block or character device.
    pub fn open_device<T: AsRef<Path>>(path: T) -> Result<Self> {
        let path = path.as_ref();

        Ok(Self {
            path: path.to_owned(),
            inner: StreamSource::with_kind(open(path)?, TargetKind::Device)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SectorSource for FileSource {
    fn seek(&mut self, block: u32) -> Result<u32> {
        self.inner.seek(block)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    fn position(&self) -> u32 {
        self.inner.position()
    }

    fn block_count(&self) -> Option<u32> {
        self.inner.block_count()
    }

    fn kind(&self) -> TargetKind {
        self.inner.kind()
    }

    fn reopen(&mut self) -> Result<()> {
        let position = self.inner.position();
        self.inner = StreamSource::with_kind(open(&self.path)?, self.inner.kind())?;
        self.inner.seek(position).map(|_| ())
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::from_open(&display(path), e))
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
