//! Raw access to 2048-byte logical blocks.
//!
//! A [`SectorSource`] is anything that can seek to a block and read whole
//! blocks: a DVD drive or ISO image ([`FileSource`]), an unpacked VIDEO_TS
//! tree ([`DirectorySource`]) or a caller supplied stream
//! ([`StreamSource`]). [`Target::resolve`] picks the right one for a path.

mod directory;
mod file;
mod stream;

pub use directory::DirectorySource;
pub use file::FileSource;
pub use stream::StreamSource;

use crate::{BLOCK_SIZE, Error, Result, auth::Drive, layout::VideoFile};
use std::{
    fmt, fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

/// What kind of target a source reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Device,
    Image,
    Directory,
    Stream,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Device => "device",
            Self::Image => "image",
            Self::Directory => "directory",
            Self::Stream => "stream",
        })
    }
}

/// Block addressed access to a disc.
pub trait SectorSource: Send {
    /// Position at `block`, returning the new position.
    ///
    /// Seeking exactly to the end is allowed, seeking past it fails with
    /// [`Error::DeviceFailure`].
    fn seek(&mut self, block: u32) -> Result<u32>;

    /// Read `buf.len() / BLOCK_SIZE` whole blocks at the current position
    /// and return how many were read.
    ///
    /// A device which returns less data than requested yields
    /// [`Error::ShortRead`], partial blocks are never padded.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Current block position.
    fn position(&self) -> u32;

    /// Number of blocks, when the source knows it.
    fn block_count(&self) -> Option<u32>;

    fn kind(&self) -> TargetKind;

    /// Close and reopen the target at the same position, resetting a drive
    /// after a read error. Sources with nothing to reset do nothing.
    fn reopen(&mut self) -> Result<()> {
        Ok(())
    }

    /// Drive facility used for the authentication handshake.
    fn drive(&mut self) -> Option<&mut dyn Drive> {
        None
    }

    /// VIDEO_TS files, for sources which are laid out from them.
    fn video_files(&self) -> Option<&[VideoFile]> {
        None
    }
}

/// A resolved disc target path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Block or character device.
    Device(PathBuf),
    /// Regular file holding a disc image.
    Image(PathBuf),
    /// The VIDEO_TS directory of an unpacked disc.
    Directory(PathBuf),
}

impl Target {
    /// Classify `path`.
    ///
    /// Directories resolve to their `VIDEO_TS` sub directory when they have
    /// one, or to themselves when they hold VIDEO_TS files directly.
    pub fn resolve<T: AsRef<Path>>(path: T) -> Result<Self> {
        let path = path.as_ref();
        let metadata =
            fs::metadata(path).map_err(|e| Error::from_open(&path.to_string_lossy(), e))?;

        if metadata.is_dir() {
            return video_ts_dir(path)
                .map(Self::Directory)
                .ok_or_else(|| Error::NotADisc(path.to_string_lossy().into_owned()));
        }

        if metadata.is_file() {
            return Ok(Self::Image(path.to_owned()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;

            let file_type = metadata.file_type();

            if file_type.is_block_device() || file_type.is_char_device() {
                return Ok(Self::Device(path.to_owned()));
            }
        }

        Err(Error::NotADisc(path.to_string_lossy().into_owned()))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Device(x) | Self::Image(x) | Self::Directory(x) => x,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Device(_) => TargetKind::Device,
            Self::Image(_) => TargetKind::Image,
            Self::Directory(_) => TargetKind::Directory,
        }
    }

    /// Open a sector source for this target.
    pub fn open(&self) -> Result<Box<dyn SectorSource>> {
        Ok(match self {
            Self::Device(x) => Box::new(FileSource::open_device(x)?),
            Self::Image(x) => Box::new(FileSource::open_image(x)?),
            Self::Directory(x) => Box::new(DirectorySource::open(x)?),
        })
    }
}

fn video_ts_dir(path: &Path) -> Option<PathBuf> {
    let has_vmg = |dir: &Path| {
        fs::read_dir(dir).ok().is_some_and(|entries| {
            entries
                .flatten()
                .any(|x| x.file_name().eq_ignore_ascii_case("VIDEO_TS.IFO"))
        })
    };

    if has_vmg(path) {
        return Some(path.to_owned());
    }

    fs::read_dir(path)
        .ok()?
        .flatten()
        .map(|x| x.path())
        .find(|x| {
            x.is_dir()
                && x.file_name()
                    .is_some_and(|x| x.eq_ignore_ascii_case("VIDEO_TS"))
                && has_vmg(x)
        })
}

/// Number of whole blocks in `buf`, rejecting empty and unaligned buffers.
pub(crate) fn blocks_in(buf: &[u8]) -> Result<usize> {
    if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
        return Err(Error::InvalidArgument(format!(
            "buffer of {} bytes is not a whole number of {} byte blocks",
            buf.len(),
            BLOCK_SIZE
        )));
    }

    Ok(buf.len() / BLOCK_SIZE)
}

/// Read until `buf` is full or the reader is exhausted, returning the
/// number of bytes read.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

pub(crate) fn seek_past_end(block: u32, count: u32) -> Error {
    Error::DeviceFailure(format!(
        "cannot seek to block {}, the target has {} blocks",
        block, count
    ))
}
