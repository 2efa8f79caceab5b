use anyhow::Context;
use engage_core::{config::Config, io, paths};
use std::path::Path;

/// Placeholder written when `--channel` is not given.
pub const PLACEHOLDER_CHANNEL: &str = "https://www.youtube.com/@your-channel";

pub fn run(home: &Path, channel: Option<&str>, force: bool) -> anyhow::Result<()> {
    println!("Initializing engagerunner in: {}", home.display());

    let cfg = Config::starter(channel.unwrap_or(PLACEHOLDER_CHANNEL));
    let data = cfg.to_yaml()?;
    let config_path = paths::config_path(home);

    if force {
        cfg.save(home)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("  written: {}", paths::CONFIG_FILE);
    } else if io::write_if_missing(&config_path, data.as_bytes())
        .with_context(|| format!("failed to write {}", config_path.display()))?
    {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {} (use --force to overwrite)", paths::CONFIG_FILE);
    }

    if channel.is_none() {
        println!();
        println!("Set profiles.main.channel and the bridge commands in config.yaml,");
        println!("then check it with `engagerunner config validate`.");
    }
    Ok(())
}

