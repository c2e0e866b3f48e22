//! Config file commands

use crate::config::Config;

pub fn cmd_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("✓ Config file created. Edit config.toml and run again.");
    } else {
        println!("config.toml already exists, leaving it untouched.");
    }
    Ok(())
}

pub fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    config.validate()?;

    println!("Configuration OK");
    println!("{:-<50}", "");
    println!("  Database:   {}", config.general.database_path);
    println!("  Port:       {}", config.server.port);
    println!("  Public URL: {}", config.server.public_base_url);
    println!("  Uploads:    {:?}", config.uploads.backend);
    println!(
        "  Mail:       {}",
        if config.mail.enabled { "enabled" } else { "log only" }
    );
    println!(
        "  Metrics:    {}",
        if config.observability.metrics_enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
