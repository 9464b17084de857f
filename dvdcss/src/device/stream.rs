use super::{SectorSource, TargetKind, blocks_in, read_full, seek_past_end};
use crate::{BLOCK_SIZE, Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Sector source over any seekable byte stream.
///
/// The stream length is measured once when the source is created, a
/// trailing partial block is not addressable.
pub struct StreamSource<S> {
    inner: S,
    kind: TargetKind,
    blocks: Option<u32>,
    position: u32,
}

impl<S: Read + Seek + Send> StreamSource<S> {
    pub fn new(inner: S) -> Result<Self> {
        Self::with_kind(inner, TargetKind::Stream)
    }

    pub(crate) fn with_kind(mut inner: S, kind: TargetKind) -> Result<Self> {
        let len = inner
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::DeviceFailure(format!("cannot measure {}: {}", kind, e)))?;
        inner
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::DeviceFailure(format!("cannot rewind {}: {}", kind, e)))?;

        // Devices may report a zero length.
        let blocks = match len / BLOCK_SIZE as u64 {
            0 if kind == TargetKind::Device => None,
            x => Some(u32::try_from(x).map_err(|_| {
                Error::NotADisc(format!("{} of {} bytes is too large", kind, len))
            })?),
        };

        Ok(Self {
            inner,
            kind,
            blocks,
            position: 0,
        })
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Seek + Send> SectorSource for StreamSource<S> {
    fn seek(&mut self, block: u32) -> Result<u32> {
        if let Some(count) = self.blocks.filter(|&x| block > x) {
            return Err(seek_past_end(block, count));
        }

        self.inner
            .seek(SeekFrom::Start(u64::from(block) * BLOCK_SIZE as u64))
            .map_err(|e| Error::DeviceFailure(format!("seek to block {} failed: {}", block, e)))?;
        self.position = block;
        Ok(block)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let expected = blocks_in(buf)?;
        let filled = read_full(&mut self.inner, buf).map_err(|e| {
            Error::DeviceFailure(format!("read at block {} failed: {}", self.position, e))
        })?;

        let actual = filled / BLOCK_SIZE;
        self.position += actual as u32;

        if actual < expected {
            // Keep the stream aligned with the block position.
            self.inner
                .seek(SeekFrom::Start(u64::from(self.position) * BLOCK_SIZE as u64))
                .map_err(|e| {
                    Error::DeviceFailure(format!(
                        "short read at block {}, realignment failed: {}",
                        self.position, e
                    ))
                })?;

            return Err(Error::ShortRead {
                expected: expected as u32,
                actual: actual as u32,
            });
        }

        Ok(actual)
    }

    fn position(&self) -> u32 {
        self.position
    }

    fn block_count(&self) -> Option<u32> {
        self.blocks
    }

    fn kind(&self) -> TargetKind {
        self.kind
    }
}
