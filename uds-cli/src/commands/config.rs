//! Config display command

use anyhow::Result;
use uds_core::IndexSessionConfig;

/// Print the effective configuration as TOML
pub fn run(config: &IndexSessionConfig) -> Result<()> {
    if let Some(path) = IndexSessionConfig::default_path() {
        println!("# user config: {}", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
