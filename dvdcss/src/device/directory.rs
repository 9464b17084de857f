use super::{SectorSource, TargetKind, blocks_in, read_full, seek_past_end};
use crate::{
    BLOCK_SIZE, Error, Result,
    layout::{VideoFile, parse_name},
};
use std::{
    fs::{self, File},
    io::{Seek, SeekFrom},
    path::{Path, PathBuf},
};

/// Sector source over an unpacked VIDEO_TS directory.
///
/// The files are laid out back to back in on-disc order, block 0 being the
/// first block of `VIDEO_TS.IFO`.
pub struct DirectorySource {
    root: PathBuf,
    files: Vec<VideoFile>,
    paths: Vec<PathBuf>,
    total: u32,
    position: u32,
    current: Option<(usize, File)>,
}

impl DirectorySource {
    pub fn open<T: AsRef<Path>>(root: T) -> Result<Self> {
        let root = root.as_ref();
        let display = root.to_string_lossy().into_owned();
        let mut entries = Vec::new();

        for entry in fs::read_dir(root).map_err(|e| Error::from_open(&display, e))? {
            let entry = entry.map_err(|e| Error::from_open(&display, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let Some(rank) = parse_name(&name) else {
                continue;
            };

            let metadata = entry.metadata().map_err(|e| Error::from_open(&display, e))?;

            if !metadata.is_file() {
                continue;
            }

            if metadata.len() % BLOCK_SIZE as u64 != 0 {
                return Err(Error::NotADisc(format!(
                    "{} is {} bytes, not a whole number of {} byte blocks",
                    name,
                    metadata.len(),
                    BLOCK_SIZE
                )));
            }

            entries.push((rank, name, entry.path(), metadata.len() / BLOCK_SIZE as u64));
        }

        if entries.is_empty() {
            return Err(Error::NotADisc(format!("no VIDEO_TS files in {}", display)));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut files = Vec::with_capacity(entries.len());
        let mut paths = Vec::with_capacity(entries.len());
        let mut total = 0u32;

        for (_, name, path, blocks) in entries {
            let blocks = u32::try_from(blocks)
                .ok()
                .filter(|x| total.checked_add(*x).is_some())
                .ok_or_else(|| Error::NotADisc(format!("{} is too large", display)))?;

            files.push(VideoFile {
                name,
                start: total,
                blocks,
            });
            paths.push(path);
            total += blocks;
        }

        Ok(Self {
            root: root.to_owned(),
            files,
            paths,
            total,
            position: 0,
            current: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Index of the file holding `block`.
    fn file_at(&self, block: u32) -> Option<usize> {
        let index = self.files.partition_point(|x| x.start <= block);
        let index = index.checked_sub(1)?;
        (block < self.files[index].end()).then_some(index)
    }

    fn file(&mut self, index: usize) -> Result<&mut File> {
        if self.current.as_ref().is_none_or(|(x, _)| *x != index) {
            let path = &self.paths[index];
            let file = File::open(path).map_err(|e| {
                Error::DeviceFailure(format!("cannot open {}: {}", path.to_string_lossy(), e))
            })?;
            self.current = Some((index, file));
        }

        match &mut self.current {
            Some((_, file)) => Ok(file),
            None => Err(Error::DeviceFailure("no file opened".to_owned())),
        }
    }
}

impl SectorSource for DirectorySource {
    fn seek(&mut self, block: u32) -> Result<u32> {
        if block > self.total {
            return Err(seek_past_end(block, self.total));
        }

        self.position = block;
        Ok(block)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let expected = blocks_in(buf)?;
        let mut done = 0;

        while done < expected {
            // Empty files take no blocks, so the file at a position is unique.
            let Some(index) = self.file_at(self.position) else {
                break;
            };

            let offset = self.position - self.files[index].start;
            let count = (self.files[index].end() - self.position).min((expected - done) as u32);
            let chunk = &mut buf[done * BLOCK_SIZE..(done + count as usize) * BLOCK_SIZE];
            let position = self.position;

            let file = self.file(index)?;
            file.seek(SeekFrom::Start(u64::from(offset) * BLOCK_SIZE as u64))
                .map_err(|e| {
                    Error::DeviceFailure(format!("seek to block {} failed: {}", position, e))
                })?;
            let filled = read_full(file, chunk).map_err(|e| {
                Error::DeviceFailure(format!("read at block {} failed: {}", position, e))
            })?;

            let read = (filled / BLOCK_SIZE) as u32;
            self.position += read;
            done += read as usize;

            if read < count {
                break;
            }
        }

        if done < expected {
            return Err(Error::ShortRead {
                expected: expected as u32,
                actual: done as u32,
            });
        }

        Ok(done)
    }

    fn position(&self) -> u32 {
        self.position
    }

    fn block_count(&self) -> Option<u32> {
        Some(self.total)
    }

    fn kind(&self) -> TargetKind {
        TargetKind::Directory
    }

    fn video_files(&self) -> Option<&[VideoFile]> {
        Some(&self.files)
    }
}
