mod commands;
mod logger;

use clap::{ColorChoice, Parser};
use commands::{Args, Commands};
use kdam::{term, term::Colorizer};
use logger::Logger;
use std::{
    io::{IsTerminal, stderr},
    process,
};

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let colors = match args.color {
        ColorChoice::Always => true,
        ColorChoice::Auto => stderr().is_terminal(),
        ColorChoice::Never => false,
    };
    term::init(colors);
    colored::control::set_override(colors);
    Logger::init(args.log_level());

    let verbosity = args.verbosity();

    match args.command {
        Commands::Info(args) => args.execute(verbosity)?,
        Commands::Keys(args) => args.execute(verbosity)?,
        Commands::Dump(args) => args.execute(verbosity)?,
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".colorize("bold red"), e);
        process::exit(1);
    }
}
