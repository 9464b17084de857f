use super::Target;
use anyhow::Result;
use clap::Args;
use dvdcss::{Session, Verbosity, layout::VideoFile};
use kdam::term::Colorizer;
use serde::Serialize;

/// Print what is known about a target and its VIDEO_TS files.
#[derive(Debug, Clone, Args)]
pub struct Info {
    #[command(flatten)]
    target: Target,

    /// Print as json.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary {
    kind: String,
    blocks: Option<u32>,
    scrambled: bool,
    auth_state: String,
    disc_key: Option<String>,
    disc_id: Option<String>,
    cache: Option<String>,
    files: Vec<File>,
}

#[derive(Serialize)]
struct File {
    name: String,
    start: u32,
    blocks: u32,
    vob: bool,
}

impl From<&VideoFile> for File {
    fn from(file: &VideoFile) -> Self {
        Self {
            name: file.name.clone(),
            start: file.start,
            blocks: file.blocks,
            vob: file.is_vob(),
        }
    }
}

impl Summary {
    fn new(session: &mut Session) -> Self {
        let files = match session.layout() {
            Ok(files) => files.iter().map(File::from).collect(),
            Err(e) => {
                log::warn!("cannot list VIDEO_TS files: {}", e);
                Vec::new()
            }
        };

        Self {
            kind: session.kind().to_string(),
            blocks: session.block_count(),
            scrambled: session.is_scrambled(),
            auth_state: session.auth_state().to_string(),
            disc_key: session.disc_key().map(|x| x.to_string()),
            disc_id: session.disc_id().map(|x| x.to_string()),
            cache: session
                .key_store()
                .map(|x| x.dir().to_string_lossy().into_owned()),
            files,
        }
    }

    fn print(&self) {
        let unknown = || "unknown".to_owned();
        let field = |name: &str, value: String| {
            println!("{:>12} {}", name.colorize("bold cyan"), value);
        };

        field("Target", self.kind.clone());
        field(
            "Blocks",
            self.blocks.map(|x| x.to_string()).unwrap_or_else(unknown),
        );
        field("Scrambled", self.scrambled.to_string());
        field("Auth", self.auth_state.clone());
        field("Disc key", self.disc_key.clone().unwrap_or_else(unknown));
        field("Disc id", self.disc_id.clone().unwrap_or_else(unknown));

        if let Some(cache) = &self.cache {
            field("Cache", cache.clone());
        }

        for file in &self.files {
            let name = match file.vob {
                true => file.name.colorize("green"),
                false => file.name.clone(),
            };
            println!("{:>12} {:>10} {:>10}", name, file.start, file.blocks);
        }
    }
}

impl Info {
    pub fn execute(self, verbosity: Verbosity) -> Result<()> {
        let (mut session, _) = self.target.open(verbosity)?;
        let summary = Summary::new(&mut session);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            summary.print();
        }

        session.close()?;
        Ok(())
    }
}
