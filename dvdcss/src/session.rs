use crate::{
    BLOCK_SIZE, Error, Result,
    auth::{self, AuthState},
    cache::{DiscId, KeyStore, TitleKeyMap},
    config::{CacheSetting, Config, CrackingMode},
    crack::crack_title_key,
    css::{Key, descramble_sector, is_scrambled},
    device::{SectorSource, StreamSource, Target, TargetKind},
    layout::{self, VideoFile},
};
use std::{
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

/// Title key handling of [`Session::seek`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeekFlag {
    /// Plain seek.
    #[default]
    Unset,
    /// The position is the start of an MPEG title, check its title key
    /// unless the cracking mode is [`CrackingMode::Title`].
    Mpeg,
    /// Always check (and derive when unknown) the title key at the
    /// position.
    Key,
}

/// Sector handling of [`Session::read`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadFlag {
    /// Raw sectors.
    #[default]
    Unset,
    /// Descramble sectors with the active title key.
    Decrypt,
}

/// An open disc.
///
/// # Example
///
/// ```no_run
/// use dvdcss::{Config, ReadFlag, SeekFlag, Session};
///
/// let mut session = Session::open("/dev/sr0", Config::default())?;
/// session.seek(4096, SeekFlag::Key)?;
/// let sectors = session.read(16, ReadFlag::Decrypt)?;
/// assert_eq!(sectors.len(), 16 * dvdcss::BLOCK_SIZE);
/// session.close()?;
/// # Ok::<(), dvdcss::Error>(())
/// ```
///
/// Sessions are [`Send`] but not shared, wrap them in a `Mutex` and use
/// [`Session::read_at`] to seek and read under one lock.
pub struct Session {
    source: Box<dyn SectorSource>,
    config: Config,
    state: AuthState,
    scrambled: bool,
    disc_key: Option<Key>,
    title_key: Option<Key>,
    titles: TitleKeyMap,
    disc_id: Option<DiscId>,
    store: Option<KeyStore>,
    last_error: Option<String>,
    fault: Option<String>,
}

impl Session {
    /// Open a device, disc image or VIDEO_TS directory.
    pub fn open<T: AsRef<Path>>(target: T, config: Config) -> Result<Self> {
        let target = Target::resolve(target)?;
        print_debug!(
            config.verbosity,
            "opening {} {}",
            target.kind(),
            target.path().to_string_lossy()
        );
        Self::open_source(target.open()?, config)
    }

    /// Open a disc image available as a seekable stream.
    pub fn open_stream<S>(stream: S, config: Config) -> Result<Self>
    where
        S: Read + Seek + Send + 'static,
    {
        Self::open_source(Box::new(StreamSource::new(stream)?), config)
    }

    /// Open any sector source, authenticating through its drive when it has
    /// one.
    pub fn open_source(mut source: Box<dyn SectorSource>, config: Config) -> Result<Self> {
        for file in source.video_files().unwrap_or_default() {
            print_debug!(
                config.verbosity,
                "{} at block {} ({} blocks)",
                file.name,
                file.start,
                file.blocks
            );
        }

        let scrambled = match source.drive().map(|x| x.read_copyright()) {
            Some(Ok(x)) => x,
            Some(Err(e)) => {
                print_error!(
                    config.verbosity,
                    "could not check whether the disc was scrambled: {}",
                    e
                );
                true
            }
            None => true,
        };

        let (state, disc_key) = if scrambled {
            auth::acquire_disc_key(source.drive(), &config)?
        } else {
            print_debug!(config.verbosity, "disc is unscrambled");
            (AuthState::Unauthenticated, None)
        };

        let disc_id = match DiscId::read(source.as_mut()) {
            Ok(x) => Some(x),
            Err(e) => {
                print_debug!(config.verbosity, "cannot identify disc: {}", e);
                None
            }
        };

        let store = match (&config.cache, &disc_id) {
            (CacheSetting::Dir(root), Some(id)) => match KeyStore::open(root, id) {
                Ok(x) => {
                    print_debug!(
                        config.verbosity,
                        "using key cache {}",
                        x.dir().to_string_lossy()
                    );
                    Some(x)
                }
                Err(e) => {
                    print_error!(config.verbosity, "key cache disabled: {}", e);
                    None
                }
            },
            _ => None,
        };

        source.seek(0)?;

        Ok(Self {
            source,
            config,
            state,
            scrambled,
            disc_key,
            title_key: None,
            titles: TitleKeyMap::new(),
            disc_id,
            store,
            last_error: None,
            fault: None,
        })
    }

    /// Close the session.
    ///
    /// A device fault left by the last operation is returned, the session is
    /// released either way.
    pub fn close(self) -> Result<()> {
        print_debug!(self.config.verbosity, "closing session");

        match self.fault {
            Some(fault) => Err(Error::DeviceFailure(fault)),
            None => Ok(()),
        }
    }

    /// Seek to `block`, checking the title key there as `flag` asks.
    pub fn seek(&mut self, block: u32, flag: SeekFlag) -> Result<u32> {
        self.last_error = None;
        let result = self.seek_inner(block, flag);
        self.track(result)
    }

    fn seek_inner(&mut self, block: u32, flag: SeekFlag) -> Result<u32> {
        let check = match flag {
            SeekFlag::Unset => false,
            SeekFlag::Mpeg => self.config.method != CrackingMode::Title,
            SeekFlag::Key => true,
        };

        if check {
            self.check_title(block)?;
        }

        self.source.seek(block)
    }

    /// Read `count` blocks, returning exactly `count * BLOCK_SIZE` bytes.
    pub fn read(&mut self, count: u32, flag: ReadFlag) -> Result<Vec<u8>> {
        self.last_error = None;
        let result = self.read_vec(count, flag);
        self.track(result)
    }

    fn read_vec(&mut self, count: u32, flag: ReadFlag) -> Result<Vec<u8>> {
        if count == 0 {
            return Err(Error::InvalidArgument(
                "the number of blocks to read must be positive".to_owned(),
            ));
        }

        // Never allocate for blocks past the end of the disc.
        let blocks = match self.source.block_count() {
            Some(total) => count.min(total.saturating_sub(self.source.position())),
            None => count,
        };

        if blocks == 0 {
            return Err(Error::ShortRead {
                expected: count,
                actual: 0,
            });
        }

        let too_large = || {
            Error::InvalidArgument(format!("cannot read {} blocks at once", blocks))
        };
        let len = (blocks as usize).checked_mul(BLOCK_SIZE).ok_or_else(too_large)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|_| too_large())?;
        buf.resize(len, 0);

        let read = self.read_inner(&mut buf, flag)?;

        if blocks < count {
            return Err(Error::ShortRead {
                expected: count,
                actual: read as u32,
            });
        }

        Ok(buf)
    }

    /// Read `buf.len() / BLOCK_SIZE` blocks into `buf`.
    pub fn read_into(&mut self, buf: &mut [u8], flag: ReadFlag) -> Result<usize> {
        self.last_error = None;
        let result = self.read_inner(buf, flag);
        self.track(result)
    }

    fn read_inner(&mut self, buf: &mut [u8], flag: ReadFlag) -> Result<usize> {
        let blocks = self.source.read(buf)?;

        if flag == ReadFlag::Decrypt {
            self.descramble(&mut buf[..blocks * BLOCK_SIZE]);
        }

        Ok(blocks)
    }

    /// Seek and read in one call.
    pub fn read_at(
        &mut self,
        block: u32,
        count: u32,
        seek_flag: SeekFlag,
        read_flag: ReadFlag,
    ) -> Result<Vec<u8>> {
        self.seek(block, seek_flag)?;
        self.read(count, read_flag)
    }

    /// Title key of the title starting at `block`, deriving it when it is
    /// not known yet, and make it the active one. Unscrambled discs always
    /// yield [`Key::ZERO`]. The position is left unchanged.
    pub fn title_key_at(&mut self, block: u32) -> Result<Key> {
        self.last_error = None;
        let result = self
            .check_title(block)
            .map(|_| self.titles.get_title_key(block).unwrap_or(Key::ZERO));
        self.track(result)
    }

    /// VIDEO_TS files of the disc, the position is left unchanged.
    pub fn layout(&mut self) -> Result<Vec<VideoFile>> {
        self.last_error = None;
        let position = self.source.position();
        let result = layout::discover(self.source.as_mut())
            .and_then(|files| self.source.seek(position).map(|_| files));

        if let Ok(files) = &result {
            print_debug!(self.config.verbosity, "found {} VIDEO_TS files", files.len());
        }

        self.track(result)
    }

    fn descramble(&self, buf: &mut [u8]) {
        match self.title_key.filter(|x| !x.is_zero()) {
            Some(key) => {
                for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
                    if let Ok(sector) = <&mut [u8; BLOCK_SIZE]>::try_from(chunk) {
                        descramble_sector(sector, &key);
                    }
                }
            }
            None => {
                if buf.chunks_exact(BLOCK_SIZE).any(is_scrambled) {
                    print_error!(
                        self.config.verbosity,
                        "no key but found encrypted block at block {}",
                        self.source.position()
                    );
                }
            }
        }
    }

    /// Make the key of the title starting at `block` the active one. The
    /// position is restored whether or not a key was found.
    fn check_title(&mut self, block: u32) -> Result<()> {
        let position = self.source.position();
        let result = self.find_title_key(block);
        let restored = self.source.seek(position);
        result.and(restored.map(|_| ()))
    }

    fn find_title_key(&mut self, block: u32) -> Result<()> {
        if !self.scrambled {
            return Ok(());
        }

        if let Some(key) = self.titles.get_title_key(block) {
            self.title_key = Some(key);
            return Ok(());
        }

        let key = match self.cached_title_key(block) {
            Some(key) => key,
            None => {
                let key = self.derive_title_key(block)?;

                if let Some(Err(e)) = self.store.as_ref().map(|x| x.store(block, &key)) {
                    print_error!(
                        self.config.verbosity,
                        "cannot cache key at block {}: {}",
                        block,
                        e
                    );
                }

                key
            }
        };

        if key.is_zero() {
            print_debug!(self.config.verbosity, "unencrypted title at block {}", block);
        } else {
            print_debug!(self.config.verbosity, "title key at block {}: {}", block, key);
        }

        self.titles.put_title_key(block, key);
        self.title_key = Some(key);
        self.state = AuthState::TitleKeyKnown;
        Ok(())
    }

    fn cached_title_key(&self, block: u32) -> Option<Key> {
        match self.store.as_ref()?.load(block) {
            Ok(Some(key)) => {
                print_debug!(
                    self.config.verbosity,
                    "key {} at block {} found in cache",
                    key,
                    block
                );
                Some(key)
            }
            Ok(None) => None,
            Err(e) => {
                print_debug!(
                    self.config.verbosity,
                    "ignoring cached key at block {}: {}",
                    block,
                    e
                );
                None
            }
        }
    }

    fn derive_title_key(&mut self, block: u32) -> Result<Key> {
        let verbosity = self.config.verbosity;

        if let (Some(disc_key), Some(drive)) = (self.disc_key, self.source.drive()) {
            match auth::read_title_key(drive, &disc_key, block, verbosity) {
                Ok(key) => return Ok(key),
                Err(e) => {
                    print_error!(
                        self.config.verbosity,
                        "cannot read title key from drive, falling back to cracking: {}",
                        e
                    );
                    self.reset()?;
                }
            }
        }

        if self.state != AuthState::TitleKeyKnown {
            self.state = AuthState::TitleKeyGuessing;
        }

        crack_title_key(self.source.as_mut(), block, self.config.verbosity)
    }

    /// Re-read the first block and redo the handshake after a failed title
    /// key request.
    fn reset(&mut self) -> Result<()> {
        let mut sector = [0u8; BLOCK_SIZE];
        self.source.seek(0)?;

        if let Err(e) = self.source.read(&mut sector) {
            print_debug!(self.config.verbosity, "reset read failed: {}", e);
        }

        if self.config.method == CrackingMode::Key {
            let (state, disc_key) = auth::acquire_disc_key(self.source.drive(), &self.config)?;

            if disc_key.is_some() {
                self.state = state;
                self.disc_key = disc_key;
            }
        }

        Ok(())
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.fault = None,
            Err(e) => {
                let message = e.to_string();
                print_error!(self.config.verbosity, "{}", message);

                if e.is_device_failure() {
                    self.fault = Some(message.clone());
                }

                self.last_error = Some(message);
            }
        }

        result
    }

    /// Latest error message, `None` when the last operation succeeded.
    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the disc is CSS protected. Targets without a drive are
    /// assumed to be.
    pub fn is_scrambled(&self) -> bool {
        self.scrambled
    }

    pub fn position(&self) -> u32 {
        self.source.position()
    }

    pub fn block_count(&self) -> Option<u32> {
        self.source.block_count()
    }

    pub fn kind(&self) -> TargetKind {
        self.source.kind()
    }

    pub fn auth_state(&self) -> AuthState {
        self.state
    }

    pub fn disc_key(&self) -> Option<Key> {
        self.disc_key
    }

    /// Key used by decrypting reads.
    pub fn title_key(&self) -> Option<Key> {
        self.title_key
    }

    pub fn title_keys(&self) -> &TitleKeyMap {
        &self.titles
    }

    pub fn disc_id(&self) -> Option<&DiscId> {
        self.disc_id.as_ref()
    }

    pub fn key_store(&self) -> Option<&KeyStore> {
        self.store.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Decrypting reads of whole blocks. The buffer must hold at least one
/// block, the end of the disc reads as end of file.
impl Read for Session {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut blocks = buf.len() / BLOCK_SIZE;

        if blocks == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "buffer is smaller than one block",
            ));
        }

        if let Some(count) = self.block_count() {
            blocks = blocks.min(count.saturating_sub(self.position()) as usize);
        }

        if blocks == 0 {
            return Ok(0);
        }

        let read = self.read_into(&mut buf[..blocks * BLOCK_SIZE], ReadFlag::Decrypt)?;
        Ok(read * BLOCK_SIZE)
    }
}

/// Block aligned seeks. Title keys are left untouched, position at title
/// starts with [`Session::seek`] and [`SeekFlag::Key`] to switch them.
impl Seek for Session {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let invalid =
            |message: &str| io::Error::new(io::ErrorKind::InvalidInput, message.to_owned());
        let block_size = BLOCK_SIZE as i128;

        let offset = match pos {
            SeekFrom::Start(x) => i128::from(x),
            SeekFrom::Current(x) => i128::from(self.position()) * block_size + i128::from(x),
            SeekFrom::End(x) => {
                let count = self.block_count().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Unsupported, "target length is unknown")
                })?;
                i128::from(count) * block_size + i128::from(x)
            }
        };

        if offset < 0 || offset % block_size != 0 {
            return Err(invalid("seek offset is not a non-negative multiple of the block size"));
        }

        let block =
            u32::try_from(offset / block_size).map_err(|_| invalid("seek offset is too large"))?;
        let block = Session::seek(self, block, SeekFlag::Unset)?;
        Ok(u64::from(block) * BLOCK_SIZE as u64)
    }
}
