//! Title key bookkeeping: the per-session map and the persistent store.

use crate::{BLOCK_SIZE, Result, css::Key, device::SectorSource};
use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

const CACHEDIR_TAG: &str = "Signature: 8a477f597d28d172789f06886806bc55\r\n\
# This file is a cache directory tag created by dvdcss.\r\n\
# For information about cache directory tags, see:\r\n\
#   https://bford.info/cachedir/\r\n";

/// Title keys of a session ordered by the start block of their title.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TitleKeyMap(BTreeMap<u32, Key>);

impl TitleKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of the title starting exactly at `block`.
    pub fn get_title_key(&self, block: u32) -> Option<Key> {
        self.0.get(&block).copied()
    }

    /// Start block and key of the title containing `block`, that is the one
    /// with the greatest start not after it.
    pub fn title_for(&self, block: u32) -> Option<(u32, Key)> {
        self.0
            .range(..=block)
            .next_back()
            .map(|(start, key)| (*start, *key))
    }

    pub fn put_title_key(&mut self, block: u32, key: Key) {
        self.0.insert(block, key);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Key)> + '_ {
        self.0.iter().map(|(start, key)| (*start, *key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identity of a disc, used to name its cache directory.
///
/// Rendered as `label-date-digest`, where label and date come from the
/// ISO 9660 primary volume descriptor and digest is a short blake3 hash of
/// the sector they were read from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DiscId(String);

impl DiscId {
    /// Identity from the primary volume descriptor (block 16).
    pub fn from_volume_descriptor(sector: &[u8; BLOCK_SIZE]) -> Self {
        let label = sanitize(&sector[40..72]);
        let date = sanitize(&sector[813..829]);

        Self::new(
            if label.is_empty() { "UNLABELLED" } else { &label },
            if date.is_empty() { "0000000000000000" } else { &date },
            sector,
        )
    }

    /// Identity of a disc without a volume descriptor, from the first
    /// sector of `VIDEO_TS.IFO`.
    pub fn from_manager(sector: &[u8; BLOCK_SIZE]) -> Self {
        Self::new("VIDEO_TS", "0000000000000000", sector)
    }

    fn new(label: &str, date: &str, sector: &[u8; BLOCK_SIZE]) -> Self {
        let digest = blake3::hash(sector);
        Self(format!(
            "{}-{}-{}",
            label,
            date,
            hex::encode(&digest.as_bytes()[..8])
        ))
    }

    /// Read the identity of the disc behind `source`.
    pub fn read(source: &mut dyn SectorSource) -> Result<Self> {
        let mut sector = [0u8; BLOCK_SIZE];

        if source.video_files().is_none() {
            source.seek(16)?;
            source.read(&mut sector)?;

            if sector[0] == 1 && &sector[1..6] == b"CD001" {
                return Ok(Self::from_volume_descriptor(&sector));
            }
        }

        source.seek(0)?;
        source.read(&mut sector)?;
        Ok(Self::from_manager(&sector))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiscId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches([' ', '\0'])
        .chars()
        .map(|x| if x.is_ascii_alphanumeric() { x } else { '_' })
        .collect()
}

/// Title keys of one disc persisted under `<root>/<disc id>/`.
///
/// Each title is a file named by its start block in 10 hex digits, holding
/// the key as `xx:xx:xx:xx:xx\r\n`. Unreadable or malformed entries are
/// reported as errors, sessions treat them as missing.
#[derive(Clone, Debug)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn open<T: AsRef<Path>>(root: T, id: &DiscId) -> Result<Self> {
        let root = root.as_ref();
        let dir = root.join(id.as_str());
        fs::create_dir_all(&dir)?;

        let tag = root.join("CACHEDIR.TAG");

        if !tag.exists() {
            fs::write(&tag, CACHEDIR_TAG)?;
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, block: u32) -> PathBuf {
        self.dir.join(format!("{:010x}", block))
    }

    /// Key of the title at `block`, `None` when it was never stored.
    pub fn load(&self, block: u32) -> Result<Option<Key>> {
        match fs::read_to_string(self.path(block)) {
            Ok(content) => content.trim().parse().map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn store(&self, block: u32, key: &Key) -> Result<()> {
        fs::write(self.path(block), format!("{}\r\n", key))?;
        Ok(())
    }

    /// Every readable entry of the store.
    pub fn load_all(&self) -> TitleKeyMap {
        let mut map = TitleKeyMap::new();

        let Ok(entries) = fs::read_dir(&self.dir) else {
            return map;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name.len() != 10 {
                continue;
            }

            let Ok(block) = u32::from_str_radix(&name, 16) else {
                continue;
            };

            if let Ok(Some(key)) = self.load(block) {
                map.put_title_key(block, key);
            }
        }

        map
    }
}
