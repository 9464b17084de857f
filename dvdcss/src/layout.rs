//! VIDEO_TS layout discovery.
//!
//! Title keys are bound to the start block of each title, so callers need to
//! know where the VOB files of a disc begin. Images and devices are read
//! through their ISO 9660 directory records, directory targets already know
//! their layout.

use crate::{BLOCK_SIZE, Error, Result, device::SectorSource};

const VOLUME_DESCRIPTOR_BLOCK: u32 = 16;
const ROOT_RECORD_OFFSET: usize = 156;
const MAX_DIRECTORY_BLOCKS: u32 = 64;

/// A file of the VIDEO_TS directory and the blocks it occupies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFile {
    pub name: String,
    pub start: u32,
    pub blocks: u32,
}

/// Role of a file inside a title set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileRole {
    Ifo,
    MenuVob,
    TitleVob(u8),
    Backup,
}

impl VideoFile {
    pub fn end(&self) -> u32 {
        self.start + self.blocks
    }

    /// Title set number (0 for the video manager) and role of the file.
    pub fn role(&self) -> Option<(u8, FileRole)> {
        parse_name(&self.name)
    }

    pub fn is_vob(&self) -> bool {
        matches!(
            self.role(),
            Some((_, FileRole::MenuVob | FileRole::TitleVob(_)))
        )
    }
}

/// Parse a VIDEO_TS file name, ignoring case and ISO 9660 version suffixes.
///
/// The result orders files as they are laid out on disc: the video manager
/// first, then each title set as IFO, menu VOB, title VOBs and BUP.
pub fn parse_name(name: &str) -> Option<(u8, FileRole)> {
    let name = name.split(';').next()?.to_ascii_uppercase();
    let (stem, ext) = name.split_once('.')?;

    if stem == "VIDEO_TS" {
        return match ext {
            "IFO" => Some((0, FileRole::Ifo)),
            "VOB" => Some((0, FileRole::MenuVob)),
            "BUP" => Some((0, FileRole::Backup)),
            _ => None,
        };
    }

    let rest = stem.strip_prefix("VTS_")?;
    let (set, part) = rest.split_once('_')?;

    if set.len() != 2 || part.len() != 1 {
        return None;
    }

    let set = set.parse::<u8>().ok().filter(|x| (1..=99).contains(x))?;
    let part = part.parse::<u8>().ok()?;

    match (ext, part) {
        ("IFO", 0) => Some((set, FileRole::Ifo)),
        ("BUP", 0) => Some((set, FileRole::Backup)),
        ("VOB", 0) => Some((set, FileRole::MenuVob)),
        ("VOB", x) => Some((set, FileRole::TitleVob(x))),
        _ => None,
    }
}

/// Start blocks at which a new title key takes effect: the menu VOB of
/// every title set and its first title VOB. Title VOBs 2..9 continue the
/// first one.
pub fn title_key_starts(files: &[VideoFile]) -> Vec<u32> {
    let mut starts = files
        .iter()
        .filter(|x| x.blocks > 0)
        .filter(|x| {
            matches!(
                x.role(),
                Some((_, FileRole::MenuVob | FileRole::TitleVob(1)))
            )
        })
        .map(|x| x.start)
        .collect::<Vec<_>>();

    starts.sort_unstable();
    starts.dedup();
    starts
}

/// List the VIDEO_TS files of a source, ordered by start block.
pub fn discover(source: &mut dyn SectorSource) -> Result<Vec<VideoFile>> {
    if let Some(files) = source.video_files() {
        return Ok(files.to_vec());
    }

    let descriptor = read_blocks(source, VOLUME_DESCRIPTOR_BLOCK, 1)?;

    if descriptor[0] != 1 || &descriptor[1..6] != b"CD001" {
        return Err(Error::NotADisc(
            "no ISO 9660 primary volume descriptor at block 16".to_owned(),
        ));
    }

    let root = parse_record(&descriptor[ROOT_RECORD_OFFSET..])
        .ok_or_else(|| Error::NotADisc("invalid ISO 9660 root directory record".to_owned()))?;
    let root = read_directory(source, root.extent, root.size)?;

    let video_ts = records(&root)
        .into_iter()
        .find(|x| x.is_dir && x.name.eq_ignore_ascii_case(b"VIDEO_TS"))
        .ok_or_else(|| Error::NotADisc("no VIDEO_TS directory on the disc".to_owned()))?;
    let video_ts = read_directory(source, video_ts.extent, video_ts.size)?;

    let mut files = records(&video_ts)
        .into_iter()
        .filter(|x| !x.is_dir)
        .filter_map(|x| {
            let name = String::from_utf8_lossy(x.name);
            let name = name.split(';').next().unwrap_or_default().to_owned();
            parse_name(&name)?;

            Some(VideoFile {
                name,
                start: x.extent,
                blocks: x.size.div_ceil(BLOCK_SIZE as u32),
            })
        })
        .collect::<Vec<_>>();

    files.sort_by_key(|x| x.start);
    Ok(files)
}

fn read_blocks(source: &mut dyn SectorSource, block: u32, count: u32) -> Result<Vec<u8>> {
    let mut buf = vec![0; count as usize * BLOCK_SIZE];
    source.seek(block)?;
    source.read(&mut buf)?;
    Ok(buf)
}

fn read_directory(source: &mut dyn SectorSource, extent: u32, size: u32) -> Result<Vec<u8>> {
    let blocks = size.div_ceil(BLOCK_SIZE as u32).clamp(1, MAX_DIRECTORY_BLOCKS);
    read_blocks(source, extent, blocks)
}

struct Record<'a> {
    extent: u32,
    size: u32,
    is_dir: bool,
    name: &'a [u8],
}

fn parse_record(data: &[u8]) -> Option<Record<'_>> {
    let len = *data.first()? as usize;

    if len < 34 || len > data.len() {
        return None;
    }

    let name_len = data[32] as usize;

    Some(Record {
        extent: u32::from_le_bytes(data[2..6].try_into().ok()?),
        size: u32::from_le_bytes(data[10..14].try_into().ok()?),
        is_dir: data[25] & 0x02 != 0,
        name: data.get(33..33 + name_len)?,
    })
}

/// Directory records of a directory extent. Records never cross a block
/// boundary, a zero length byte pads the rest of a block.
fn records(data: &[u8]) -> Vec<Record<'_>> {
    let mut records = Vec::new();

    for block in data.chunks(BLOCK_SIZE) {
        let mut offset = 0;

        while offset < block.len() && block[offset] != 0 {
            let Some(record) = parse_record(&block[offset..]) else {
                break;
            };

            offset += block[offset] as usize;

            // Skip the "." and ".." entries.
            if record.name != [0] && record.name != [1] {
                records.push(record);
            }
        }
    }

    records
}
