//! Configuration shared by every handler.

use rigging_core::RiggingConfig;

use crate::parser::Cli;

/// Everything a handler needs, resolved once from args and environment.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: RiggingConfig,
}

impl CliContext {
    /// Environment first, then command-line overrides.
    pub fn from_cli(cli: &Cli) -> Self {
        let mut config = RiggingConfig::from_env();
        if let Some(dir) = &cli.temp_dir {
            config.temp_dir.clone_from(dir);
        }
        Self { config }
    }

    pub const fn new(config: RiggingConfig) -> Self {
        Self { config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn test_temp_dir_flag_overrides_config() {
        let cli = Cli::parse_from(["rigging", "--temp-dir", "/tmp/rigging-cli-test", "paths"]);
        let ctx = CliContext::from_cli(&cli);
        assert_eq!(ctx.config.temp_dir(), Path::new("/tmp/rigging-cli-test"));
        assert_eq!(
            ctx.config.port_dir(),
            Path::new("/tmp/rigging-cli-test/port")
        );
    }
}
