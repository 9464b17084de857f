use super::Target;
use anyhow::{Result, bail};
use clap::Args;
use dvdcss::{BLOCK_SIZE, ReadFlag, SeekFlag, Session, Verbosity, layout};
use kdam::{BarExt, Column, RichProgress, term::Colorizer, tqdm};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

const CHUNK_BLOCKS: u32 = 512;

/// Write descrambled sectors of a target to a file.
#[derive(Debug, Clone, Args)]
pub struct Dump {
    #[command(flatten)]
    target: Target,

    /// Output file, sectors are written to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// First block to dump.
    #[arg(long, default_value_t = 0)]
    start: u32,

    /// Number of blocks to dump, defaults to the rest of the disc.
    #[arg(long)]
    count: Option<u32>,

    /// Write sectors as they are on disc, without descrambling.
    #[arg(long)]
    raw: bool,
}

impl Dump {
    pub fn execute(self, verbosity: Verbosity) -> Result<()> {
        let (mut session, cancel) = self.target.open(verbosity)?;

        let end = match (self.count, session.block_count()) {
            (Some(count), _) => self.start.saturating_add(count),
            (None, Some(total)) => total,
            (None, None) => bail!("the size of the target is unknown, pass --count."),
        };

        if end <= self.start {
            bail!("nothing to dump, block {} is past the end.", self.start);
        }

        let key_starts = if self.raw {
            Vec::new()
        } else {
            match session.layout() {
                Ok(files) => layout::title_key_starts(&files),
                Err(e) => {
                    log::warn!("cannot list VIDEO_TS files, using one title key: {}", e);
                    Vec::new()
                }
            }
        };

        let mut output: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };

        let mut pb = RichProgress::new(
            tqdm!(
                total = (end - self.start) as usize,
                unit = " blocks",
                dynamic_ncols = true
            ),
            vec![
                Column::Text("[bold blue]Dumping".to_owned()),
                Column::Animation,
                Column::Percentage(1),
                Column::Text("•".to_owned()),
                Column::CountTotal,
                Column::Text("•".to_owned()),
                Column::ElapsedTime,
                Column::Text("[cyan]>".to_owned()),
                Column::RemainingTime,
            ],
        );

        let mut decrypt = !self.raw && self.select_key(&mut session, &key_starts, &mut pb)?;
        let mut position = self.start;
        session.seek(position, SeekFlag::Unset)?;

        while position < end {
            if cancel.is_cancelled() {
                output.flush()?;
                bail!("interrupted at block {}.", position);
            }

            if !self.raw && key_starts.contains(&position) && position != self.start {
                decrypt = switch_key(&mut session, position, &mut pb)?;
            }

            // Never read across the start of the next title.
            let next_title = key_starts
                .iter()
                .copied()
                .find(|&x| x > position)
                .map_or(end, |x| x.min(end));
            let count = CHUNK_BLOCKS.min(next_title - position);

            let flag = if decrypt {
                ReadFlag::Decrypt
            } else {
                ReadFlag::Unset
            };
            let data = session.read(count, flag)?;
            output.write_all(&data)?;

            position += count;
            pb.update(count as usize)?;
        }

        output.flush()?;
        eprintln!();

        if let Some(path) = &self.output {
            pb.write(format!(
                "{} {} bytes to {}",
                "Dumped".colorize("bold green"),
                (end - self.start) as usize * BLOCK_SIZE,
                path.to_string_lossy()
            ))?;
        }

        session.close()?;
        Ok(())
    }

    /// Activate the key of the title holding the first block. Without a
    /// layout the first block is taken as a title start.
    fn select_key(
        &self,
        session: &mut Session,
        key_starts: &[u32],
        pb: &mut RichProgress,
    ) -> Result<bool> {
        if key_starts.is_empty() {
            return switch_key(session, self.start, pb);
        }

        match key_starts.iter().copied().filter(|&x| x <= self.start).max() {
            Some(title) => switch_key(session, title, pb),
            None => Ok(false),
        }
    }
}

/// Make the key of the title at `block` active. Returns false when it could
/// not be recovered, the title is then dumped as is.
fn switch_key(session: &mut Session, block: u32, pb: &mut RichProgress) -> Result<bool> {
    match session.title_key_at(block) {
        Ok(_) => Ok(true),
        Err(e) => {
            pb.write(format!(
                "{} no title key at block {}, dumping scrambled sectors ({})",
                "Warning".colorize("bold yellow"),
                block,
                e
            ))?;
            Ok(false)
        }
    }
}
