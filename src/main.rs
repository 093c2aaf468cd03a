use anyhow::Result;

fn main() -> Result<()> {
    playlog::logging::init_logging();

    // Delegate to the CLI runner in the library crate.
    playlog::cli::run()?;
    Ok(())
}
