//! Paths command handler.
//!
//! Displays the resolved directories in `key = value` format.

use anyhow::Result;

use crate::CliContext;

/// Render the directories rigging reads and writes.
pub fn render(ctx: &CliContext) -> String {
    let config = &ctx.config;
    format!(
        "temp_dir = {}\nconsole_dir = {}\nport_dir = {}\nlease_ttl_secs = {}\nkeep_console_files = {}",
        config.temp_dir().display(),
        config.console_dir().display(),
        config.port_dir().display(),
        config.lease_ttl.as_secs(),
        config.keep_console_files,
    )
}

/// Execute the paths command.
pub fn execute(ctx: &CliContext) -> Result<()> {
    println!("{}", render(ctx));
    Ok(())
}
