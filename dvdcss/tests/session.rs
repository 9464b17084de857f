mod common;

use common::{ISO_TITLE_START, TITLE_KEY, iso_image, output_dir, title};
use dvdcss::{
    BLOCK_SIZE, CacheSetting, Config, DvdCss, Error, Key, ReadFlag, SeekFlag, Session,
    auth::AuthState,
    cache::{DiscId, KeyStore},
    device::{StreamSource, TargetKind},
    layout::FileRole,
};
use std::{
    fs,
    io::{Cursor, Read, Seek, SeekFrom},
};

#[test]
fn missing_target() {
    let mut dvd = DvdCss::new();
    let result = dvd.open(output_dir("missing").join("disc.iso"), Config::default());

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(!dvd.is_open());
    assert!(matches!(dvd.read(1, ReadFlag::Unset), Err(Error::NoSession)));
}

#[test]
fn decrypt_image() {
    let (plain, scrambled) = title(16, &TITLE_KEY);
    let path = output_dir("decrypt-image").join("title.vob");
    fs::write(&path, &scrambled).unwrap();

    let mut session = Session::open(&path, Config::default()).unwrap();
    assert_eq!(session.kind(), TargetKind::Image);
    assert_eq!(session.block_count(), Some(16));
    assert!(session.is_scrambled());
    assert_eq!(session.auth_state(), AuthState::TitleKeyGuessing);
    assert_eq!(session.disc_key(), None);

    assert_eq!(session.seek(0, SeekFlag::Key).unwrap(), 0);
    assert_eq!(session.title_key(), Some(TITLE_KEY));
    assert_eq!(session.auth_state(), AuthState::TitleKeyKnown);

    let data = session.read(16, ReadFlag::Decrypt).unwrap();
    assert_eq!(data.len(), 16 * BLOCK_SIZE);
    assert_eq!(&data[..4], &[0x00, 0x00, 0x01, 0xba]);
    assert_eq!(data[0x14], 0x81);
    assert_eq!(data, plain);
    assert_eq!(session.position(), 16);
    assert_eq!(session.error(), None);

    session.seek(0, SeekFlag::Unset).unwrap();
    let raw = session.read(1, ReadFlag::Unset).unwrap();
    assert_eq!(raw, &scrambled[..BLOCK_SIZE]);

    session.close().unwrap();
}

#[test]
fn open_twice_and_close_twice() {
    let (_, scrambled) = title(4, &TITLE_KEY);
    let path = output_dir("open-twice").join("title.vob");
    fs::write(&path, &scrambled).unwrap();

    let mut dvd = DvdCss::new();
    dvd.open(&path, Config::default()).unwrap();
    assert!(matches!(dvd.open(&path, Config::default()), Err(Error::AlreadyOpen)));
    assert!(dvd.is_open());

    assert!(dvd.close().unwrap());
    assert!(!dvd.close().unwrap());
}

#[test]
fn invalid_reads_and_seeks() {
    let (_, scrambled) = title(4, &TITLE_KEY);
    let mut session = Session::open_stream(Cursor::new(scrambled), Config::default()).unwrap();
    assert_eq!(session.kind(), TargetKind::Stream);

    assert!(matches!(session.read(0, ReadFlag::Unset), Err(Error::InvalidArgument(_))));
    assert!(session.error().is_some());

    session.seek(1, SeekFlag::Unset).unwrap();
    assert_eq!(session.error(), None);

    let result = session.seek(100, SeekFlag::Unset);
    assert!(matches!(result, Err(Error::DeviceFailure(_))));
    assert!(session.error().is_some());
    assert!(matches!(session.close(), Err(Error::DeviceFailure(_))));
}

#[test]
fn fault_clears_on_success() {
    let (_, scrambled) = title(4, &TITLE_KEY);
    let mut session = Session::open_stream(Cursor::new(scrambled), Config::default()).unwrap();

    assert!(session.seek(100, SeekFlag::Unset).is_err());
    session.seek(0, SeekFlag::Unset).unwrap();
    session.close().unwrap();
}

#[test]
fn short_read_at_end() {
    let (_, scrambled) = title(4, &TITLE_KEY);
    let mut session = Session::open_stream(Cursor::new(scrambled), Config::default()).unwrap();

    session.seek(2, SeekFlag::Unset).unwrap();
    assert!(matches!(
        session.read(4, ReadFlag::Unset),
        Err(Error::ShortRead { expected: 4, actual: 2 })
    ));
}

#[test]
fn oversized_read() {
    let (_, scrambled) = title(4, &TITLE_KEY);
    let mut session = Session::open_stream(Cursor::new(scrambled), Config::default()).unwrap();

    assert!(matches!(
        session.read(u32::MAX, ReadFlag::Unset),
        Err(Error::ShortRead {
            expected: u32::MAX,
            actual: 4
        })
    ));
    assert_eq!(session.position(), 4);
    assert!(matches!(
        session.read(u32::MAX, ReadFlag::Decrypt),
        Err(Error::ShortRead {
            expected: u32::MAX,
            actual: 0
        })
    ));
}

#[test]
fn failed_title_key_keeps_position() {
    let (_, scrambled) = title(4, &TITLE_KEY);
    let image = iso_image("KEEP", &scrambled);
    let mut session = Session::open_stream(Cursor::new(image), Config::default()).unwrap();
    session.seek(ISO_TITLE_START + 1, SeekFlag::Unset).unwrap();

    assert!(matches!(session.title_key_at(20), Err(Error::InsufficientData(20))));
    assert_eq!(session.position(), ISO_TITLE_START + 1);

    assert!(matches!(session.seek(20, SeekFlag::Key), Err(Error::InsufficientData(20))));
    assert_eq!(session.position(), ISO_TITLE_START + 1);

    assert_eq!(session.title_key_at(ISO_TITLE_START).unwrap(), TITLE_KEY);
    assert_eq!(session.position(), ISO_TITLE_START + 1);
}

#[test]
fn title_key_on_non_mpeg_block() {
    let (_, scrambled) = title(4, &TITLE_KEY);
    let image = iso_image("NO_MPEG", &scrambled);
    let mut session = Session::open_stream(Cursor::new(image), Config::default()).unwrap();

    assert!(matches!(session.seek(20, SeekFlag::Key), Err(Error::InsufficientData(20))));
    assert!(session.error().is_some());
    assert_eq!(session.title_keys().get_title_key(20), None);
}

#[test]
fn layout_of_iso_image() {
    let (plain, scrambled) = title(8, &TITLE_KEY);
    let image = iso_image("MOVIE", &scrambled);
    let mut session = Session::open_stream(Cursor::new(image), Config::default()).unwrap();

    session.seek(3, SeekFlag::Unset).unwrap();
    let files = session.layout().unwrap();
    assert_eq!(session.position(), 3);

    let names = files.iter().map(|x| x.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["VIDEO_TS.IFO", "VTS_01_0.IFO", "VTS_01_1.VOB"]);
    assert_eq!(files[2].start, ISO_TITLE_START);
    assert_eq!(files[2].blocks, 8);
    assert_eq!(files[2].role(), Some((1, FileRole::TitleVob(1))));

    assert_eq!(session.title_key_at(ISO_TITLE_START).unwrap(), TITLE_KEY);
    assert_eq!(session.title_keys().len(), 1);

    let data = session
        .read_at(ISO_TITLE_START, 8, SeekFlag::Mpeg, ReadFlag::Decrypt)
        .unwrap();
    assert_eq!(data, plain);

    let id = session.disc_id().unwrap();
    assert!(id.as_str().starts_with("MOVIE-2004061512000000-"));
}

#[test]
fn unknown_key_leaves_data_scrambled() {
    let (_, scrambled) = title(2, &TITLE_KEY);
    let mut session =
        Session::open_stream(Cursor::new(scrambled.clone()), Config::default()).unwrap();

    let data = session.read(2, ReadFlag::Decrypt).unwrap();
    assert_eq!(data, scrambled);
    assert_eq!(session.title_key(), None);
}

#[test]
fn key_cache_round_trip() {
    let (plain, scrambled) = title(4, &TITLE_KEY);
    let image = iso_image("CACHED", &scrambled);
    let cache = output_dir("key-cache");
    let config = Config::builder()
        .cache(CacheSetting::Dir(cache.clone()))
        .build();

    let mut session = Session::open_stream(Cursor::new(image.clone()), config.clone()).unwrap();
    session.seek(ISO_TITLE_START, SeekFlag::Key).unwrap();

    let store = session.key_store().unwrap();
    assert!(store.dir().starts_with(&cache));
    assert_eq!(store.load(ISO_TITLE_START).unwrap(), Some(TITLE_KEY));
    assert_eq!(
        fs::read_to_string(store.dir().join("0000000016")).unwrap(),
        "5f:2a:91:07:c4\r\n"
    );
    assert!(cache.join("CACHEDIR.TAG").exists());
    session.close().unwrap();

    let mut session = Session::open_stream(Cursor::new(image), config).unwrap();
    let data = session
        .read_at(ISO_TITLE_START, 4, SeekFlag::Key, ReadFlag::Decrypt)
        .unwrap();
    assert_eq!(data, plain);
}

#[test]
fn cached_key_skips_cracking() {
    let (plain, scrambled) = title(4, &TITLE_KEY);
    let image = iso_image("STALE", &scrambled);
    let cache = output_dir("stale-cache");

    let id = DiscId::read(&mut StreamSource::new(Cursor::new(image.clone())).unwrap()).unwrap();
    let store = KeyStore::open(&cache, &id).unwrap();
    let wrong = Key([0x01, 0x02, 0x03, 0x04, 0x05]);
    store.store(ISO_TITLE_START, &wrong).unwrap();

    let config = Config::builder().cache(CacheSetting::Dir(cache)).build();
    let mut session = Session::open_stream(Cursor::new(image), config).unwrap();
    assert_eq!(session.disc_id(), Some(&id));

    session.seek(ISO_TITLE_START, SeekFlag::Key).unwrap();
    assert_eq!(session.title_key(), Some(wrong));

    let data = session.read(4, ReadFlag::Decrypt).unwrap();
    assert_ne!(data, plain);
}

#[test]
fn directory_target() {
    let (plain, scrambled) = title(6, &TITLE_KEY);
    let root = output_dir("directory-target");
    let video_ts = root.join("VIDEO_TS");
    fs::create_dir_all(&video_ts).unwrap();

    fs::write(video_ts.join("VTS_01_1.VOB"), &scrambled).unwrap();
    fs::write(video_ts.join("VTS_01_0.IFO"), vec![0u8; BLOCK_SIZE]).unwrap();
    fs::write(video_ts.join("VIDEO_TS.IFO"), vec![0u8; BLOCK_SIZE]).unwrap();
    fs::write(video_ts.join("README.TXT"), b"ignored").unwrap();

    let mut session = Session::open(&root, Config::default()).unwrap();
    assert_eq!(session.kind(), TargetKind::Directory);
    assert_eq!(session.block_count(), Some(8));

    let files = session.layout().unwrap();
    let vob = files.iter().find(|x| x.name == "VTS_01_1.VOB").unwrap();
    assert_eq!(vob.start, 2);
    assert!(session.disc_id().unwrap().as_str().starts_with("VIDEO_TS-"));

    let data = session.read_at(2, 6, SeekFlag::Key, ReadFlag::Decrypt).unwrap();
    assert_eq!(data, plain);
}

#[test]
fn io_adapters() {
    let (plain, scrambled) = title(3, &TITLE_KEY);
    let mut session = Session::open_stream(Cursor::new(scrambled), Config::default()).unwrap();
    session.seek(0, SeekFlag::Key).unwrap();

    let mut data = vec![0u8; 3 * BLOCK_SIZE];
    session.read_exact(&mut data).unwrap();
    assert_eq!(data, plain);
    assert_eq!(Read::read(&mut session, &mut data).unwrap(), 0);
    assert!(Read::read(&mut session, &mut [0u8; 16]).is_err());

    let offset = Seek::seek(&mut session, SeekFrom::Start(BLOCK_SIZE as u64)).unwrap();
    assert_eq!(offset, BLOCK_SIZE as u64);
    assert_eq!(session.position(), 1);
    assert!(Seek::seek(&mut session, SeekFrom::Current(1)).is_err());

    let offset = Seek::seek(&mut session, SeekFrom::End(-(BLOCK_SIZE as i64))).unwrap();
    assert_eq!(offset, 2 * BLOCK_SIZE as u64);
}
