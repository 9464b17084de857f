#![allow(dead_code)]

use dvdcss::{
    BLOCK_SIZE, Error, Key, Result,
    auth::Drive,
    css::{PLAYER_KEYS, encrypt_key, scramble},
    device::{SectorSource, StreamSource, TargetKind},
};
use std::{
    collections::BTreeMap,
    fs,
    io::Cursor,
    path::PathBuf,
    sync::{Arc, LazyLock, Mutex},
};

pub static OUTPUT_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../target/dvdcss-tests");
    fs::create_dir_all(&dir).ok();
    dir
});

/// A fresh directory under the test output directory.
pub fn output_dir(name: &str) -> PathBuf {
    let dir = OUTPUT_DIR.join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub const TITLE_KEY: Key = Key([0x5f, 0x2a, 0x91, 0x07, 0xc4]);
pub const DISC_KEY: Key = Key([0x01, 0x23, 0x45, 0x67, 0x89]);
pub const BUS_KEY: Key = Key([0x10, 0x32, 0x54, 0x76, 0x98]);

/// A video pack whose payload repeats `pattern`, flagged as scrambled.
pub fn video_sector(pattern: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut sector = [0u8; BLOCK_SIZE];
    sector[..4].copy_from_slice(&[0x00, 0x00, 0x01, 0xba]);
    sector[4..14].copy_from_slice(&[0x44, 0, 4, 0, 4, 1, 1, 0x89, 0xc3, 0xf8]);
    sector[14..18].copy_from_slice(&[0x00, 0x00, 0x01, 0xe0]);
    sector[18..23].copy_from_slice(&[0x07, 0xec, 0x81 | 0x30, 0x80, 0x05]);

    for (i, byte) in sector.iter_mut().enumerate().skip(0x30) {
        *byte = pattern[(i - 0x30) % pattern.len()];
    }

    sector
}

/// Plaintext and scrambled sectors of a title.
pub fn title(blocks: usize, key: &Key) -> (Vec<u8>, Vec<u8>) {
    let mut plain = Vec::with_capacity(blocks * BLOCK_SIZE);
    let mut scrambled = Vec::with_capacity(blocks * BLOCK_SIZE);

    for i in 0..blocks {
        let pattern = [0x12, 0x34, 0x56 + i as u8];
        let mut sector = video_sector(&pattern);
        let mut crypted = sector;
        scramble(&mut crypted, key);

        sector[0x14] &= 0x8f;
        plain.extend_from_slice(&sector);
        scrambled.extend_from_slice(&crypted);
    }

    (plain, scrambled)
}

fn directory_record(name: &[u8], extent: u32, size: u32, dir: bool) -> Vec<u8> {
    let len = 33 + name.len() + (1 - name.len() % 2);
    let mut record = vec![0u8; len];
    record[0] = len as u8;
    record[2..6].copy_from_slice(&extent.to_le_bytes());
    record[6..10].copy_from_slice(&extent.to_be_bytes());
    record[10..14].copy_from_slice(&size.to_le_bytes());
    record[14..18].copy_from_slice(&size.to_be_bytes());
    record[25] = if dir { 2 } else { 0 };
    record[32] = name.len() as u8;
    record[33..33 + name.len()].copy_from_slice(name);
    record
}

fn directory(entries: &[Vec<u8>]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    let mut offset = 0;

    for entry in entries {
        block[offset..offset + entry.len()].copy_from_slice(entry);
        offset += entry.len();
    }

    block
}

/// Start block of the title VOB in [`iso_image`].
pub const ISO_TITLE_START: u32 = 22;

/// An ISO 9660 image with VIDEO_TS.IFO, VTS_01_0.IFO and VTS_01_1.VOB
/// holding `vob`.
pub fn iso_image(label: &str, vob: &[u8]) -> Vec<u8> {
    let vob_blocks = (vob.len() / BLOCK_SIZE) as u32;
    let mut image = vec![0u8; ISO_TITLE_START as usize * BLOCK_SIZE];

    let pvd = &mut image[16 * BLOCK_SIZE..17 * BLOCK_SIZE];
    pvd[0] = 1;
    pvd[1..6].copy_from_slice(b"CD001");
    pvd[6] = 1;
    pvd[40..72].fill(b' ');
    pvd[40..40 + label.len()].copy_from_slice(label.as_bytes());
    pvd[156..190].copy_from_slice(&directory_record(&[0], 18, BLOCK_SIZE as u32, true));
    pvd[813..829].copy_from_slice(b"2004061512000000");

    let terminator = &mut image[17 * BLOCK_SIZE..18 * BLOCK_SIZE];
    terminator[0] = 255;
    terminator[1..6].copy_from_slice(b"CD001");

    let root = directory(&[
        directory_record(&[0], 18, BLOCK_SIZE as u32, true),
        directory_record(&[1], 18, BLOCK_SIZE as u32, true),
        directory_record(b"VIDEO_TS", 19, BLOCK_SIZE as u32, true),
    ]);
    image[18 * BLOCK_SIZE..19 * BLOCK_SIZE].copy_from_slice(&root);

    let video_ts = directory(&[
        directory_record(&[0], 19, BLOCK_SIZE as u32, true),
        directory_record(&[1], 18, BLOCK_SIZE as u32, true),
        directory_record(b"VIDEO_TS.IFO;1", 20, BLOCK_SIZE as u32, false),
        directory_record(b"VTS_01_0.IFO;1", 21, BLOCK_SIZE as u32, false),
        directory_record(
            b"VTS_01_1.VOB;1",
            ISO_TITLE_START,
            vob_blocks * BLOCK_SIZE as u32,
            false,
        ),
    ]);
    image[19 * BLOCK_SIZE..20 * BLOCK_SIZE].copy_from_slice(&video_ts);

    image[20 * BLOCK_SIZE..20 * BLOCK_SIZE + 12].copy_from_slice(b"DVDVIDEO-VMG");
    image[21 * BLOCK_SIZE..21 * BLOCK_SIZE + 12].copy_from_slice(b"DVDVIDEO-VTS");
    image.extend_from_slice(vob);
    image
}

fn mask(bytes: &mut [u8], bus_key: &Key) {
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte ^= bus_key.0[4 - (i % 5)];
    }
}

/// A drive answering authentication requests for a disc protected by
/// [`DISC_KEY`].
pub struct MockDrive {
    /// Player key slot holding the disc key, none makes the player keys
    /// useless.
    pub player_slot: Option<(usize, usize)>,
    pub title_keys: BTreeMap<u32, Key>,
    /// Reject title key requests, as on a region mismatch.
    pub fail_title_keys: bool,
    pub asf: bool,
    pub copyright: bool,
    pub calls: Arc<Mutex<Vec<&'static str>>>,
}

impl MockDrive {
    pub fn new(player_slot: Option<(usize, usize)>) -> Self {
        Self {
            player_slot,
            title_keys: BTreeMap::new(),
            fail_title_keys: false,
            asf: true,
            copyright: true,
            calls: Arc::default(),
        }
    }

    fn call(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

impl Drive for MockDrive {
    fn report_agid(&mut self) -> Result<u32> {
        self.call("report_agid");
        Ok(1)
    }

    fn negotiate_bus_key(&mut self, _: u32) -> Result<Key> {
        self.call("negotiate_bus_key");
        Ok(BUS_KEY)
    }

    fn read_disc_key(&mut self, _: u32, block: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.call("read_disc_key");
        block.fill(0x5a);
        block[..5].copy_from_slice(&encrypt_key(0, &DISC_KEY, &DISC_KEY).0);

        if let Some((player, slot)) = self.player_slot {
            block[slot * 5..slot * 5 + 5]
                .copy_from_slice(&encrypt_key(0, &PLAYER_KEYS[player], &DISC_KEY).0);
        }

        mask(block, &BUS_KEY);
        Ok(())
    }

    fn read_title_key(&mut self, _: u32, block: u32) -> Result<Key> {
        self.call("read_title_key");

        if self.fail_title_keys {
            return Err(Error::DeviceFailure("title key request rejected".to_owned()));
        }

        let mut key = match self.title_keys.get(&block) {
            Some(key) => encrypt_key(0xff, &DISC_KEY, key),
            None => Key::ZERO,
        };
        mask(&mut key.0, &BUS_KEY);
        Ok(key)
    }

    fn report_asf(&mut self) -> Result<bool> {
        self.call("report_asf");
        Ok(self.asf)
    }

    fn invalidate_agid(&mut self, _: u32) -> Result<()> {
        self.call("invalidate_agid");
        Ok(())
    }

    fn read_copyright(&mut self) -> Result<bool> {
        self.call("read_copyright");
        Ok(self.copyright)
    }
}

/// An in-memory disc behind a [`MockDrive`].
pub struct DriveSource {
    inner: StreamSource<Cursor<Vec<u8>>>,
    drive: MockDrive,
}

impl DriveSource {
    pub fn new(data: Vec<u8>, drive: MockDrive) -> Self {
        Self {
            inner: StreamSource::new(Cursor::new(data)).unwrap(),
            drive,
        }
    }
}

impl SectorSource for DriveSource {
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
        TargetKind::Device
    }

    fn drive(&mut self) -> Option<&mut dyn Drive> {
        Some(&mut self.drive)
    }
}
