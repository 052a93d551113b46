use anyhow::{Context, Result};
use c8vm::Options;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();

    let options = Options::parse();
    let rom = std::fs::read(&options.rom)
        .with_context(|| format!("Failed to read ROM file '{}'", options.rom.display()))?;
    log::info!("Playing ROM path: '{}'", options.rom.display());

    c8vm::run(&options, &rom)
}
