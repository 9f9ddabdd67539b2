use anyhow::{Context, Result};
use chrono::TimeZone;
use clap::Parser;
use log::info;
use std::fmt::Display;
use sugar_diary::config::{Args, Command, DiaryZone};
use sugar_diary::data_loading::load_records;
use sugar_diary::output;
use sugar_diary::pagination::PageRequest;
use sugar_diary::response::{records_response, rows_response};
use sugar_diary::store::MemoryStore;

fn run<Tz>(args: &Args, tz: &Tz) -> Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let records = load_records(&args.input_path, tz)
        .with_context(|| format!("Failed to load {}", args.input_path.display()))?;
    let store = MemoryStore::new(records);
    let page = PageRequest::from(args.page_number);

    match &args.command {
        Command::Rows { groupping } => {
            let response = rows_response(&store, *groupping, page, args.page_size, tz)?;
            output::emit(&response, args.debug, args.output.as_deref())?;
        }
        Command::Records => {
            let response = records_response(&store, page, args.page_size, tz);
            output::emit(&response, args.debug, args.output.as_deref())?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    match args.zone() {
        DiaryZone::Named(tz) => {
            info!("Loading {} in {}", args.input_path.display(), tz.name());
            run(&args, &tz)
        }
        DiaryZone::Fixed(offset) => {
            info!("Loading {} at UTC{}", args.input_path.display(), offset);
            run(&args, &offset)
        }
    }
}
