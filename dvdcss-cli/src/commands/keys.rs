use super::Target;
use anyhow::{Result, bail};
use clap::Args;
use dvdcss::{Verbosity, layout};
use kdam::term::Colorizer;
use serde::Serialize;

/// Recover the title keys of a target.
#[derive(Debug, Clone, Args)]
pub struct Keys {
    #[command(flatten)]
    target: Target,

    /// Start block of a title, can be repeated.
    /// Defaults to the start of every VOB file of the disc.
    #[arg(long = "sector", value_name = "BLOCK")]
    sectors: Vec<u32>,

    /// Print as json.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct TitleKey {
    start: u32,
    key: Option<String>,
    error: Option<String>,
}

impl Keys {
    pub fn execute(self, verbosity: Verbosity) -> Result<()> {
        let (mut session, cancel) = self.target.open(verbosity)?;

        let starts = if self.sectors.is_empty() {
            layout::title_key_starts(&session.layout()?)
        } else {
            self.sectors
        };

        if starts.is_empty() {
            bail!("no VOB files found, pass the title start blocks with --sector.");
        }

        let mut keys = Vec::with_capacity(starts.len());

        for start in starts {
            if cancel.is_cancelled() {
                bail!("interrupted.");
            }

            let key = session.title_key_at(start);

            if !self.json {
                match &key {
                    Ok(key) if key.is_zero() => println!(
                        "{:>10} {}",
                        start,
                        "unencrypted".colorize("green")
                    ),
                    Ok(key) => println!("{:>10} {}", start, key.to_string().colorize("cyan")),
                    Err(e) => println!("{:>10} {}", start, e.to_string().colorize("red")),
                }
            }

            keys.push(match key {
                Ok(key) => TitleKey {
                    start,
                    key: Some(key.to_string()),
                    error: None,
                },
                Err(e) => TitleKey {
                    start,
                    key: None,
                    error: Some(e.to_string()),
                },
            });
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&keys)?);
        }

        session.close()?;
        Ok(())
    }
}
