use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use orgdex::engine::{Cli, handle_run};

fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    handle_run(cli)?;
    log::debug!("total time: {:.2?}", start.elapsed());
    Ok(())
}
