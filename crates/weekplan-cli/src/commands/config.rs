//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use weekplan_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, remote_url, api_key, sync_enabled, sync_interval_secs, \
                          propagation_queue, propagation_workers, request_timeout_secs, log_file";

/// Show current configuration
pub fn show(config: &Config, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "remote_url": config.remote_url,
                    "api_key_set": config.api_key.is_some(),
                    "sync_enabled": config.sync_enabled,
                    "sync_interval_secs": config.sync_interval_secs,
                    "propagation_queue": config.propagation_queue,
                    "propagation_workers": config.propagation_workers,
                    "request_timeout_secs": config.request_timeout_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!(
                "  remote_url:           {}",
                config.remote_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  api_key:              {}",
                if config.api_key.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!("  sync_enabled:         {}", config.sync_enabled);
            println!("  sync_interval_secs:   {}", config.sync_interval_secs);
            println!("  propagation_queue:    {}", config.propagation_queue);
            println!("  propagation_workers:  {}", config.propagation_workers);
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key == "api_key" { "(hidden)" } else { value.as_str() };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

/// Apply one `key = value` change
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "remote_url" => {
            config.remote_url = optional(value);
        }
        "api_key" => {
            config.api_key = optional(value);
        }
        "sync_enabled" => {
            config.sync_enabled = value
                .parse()
                .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
        }
        "sync_interval_secs" => {
            config.sync_interval_secs = value
                .parse()
                .context("Invalid value for sync_interval_secs. Use seconds, 0 to disable.")?;
        }
        "propagation_queue" => {
            config.propagation_queue = positive(key, value)?;
        }
        "propagation_workers" => {
            config.propagation_workers = positive(key, value)?;
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = positive(key, value)? as u64;
        }
        "log_file" => {
            config.log_file = optional(value).map(PathBuf::from);
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn positive(key: &str, value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => bail!("Invalid value for {}. Use a positive number.", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "remote_url", "https://tasks.example.com").unwrap();
        apply(&mut config, "sync_enabled", "true").unwrap();
        apply(&mut config, "sync_interval_secs", "0").unwrap();
        apply(&mut config, "propagation_workers", "2").unwrap();

        assert_eq!(config.remote_url.as_deref(), Some("https://tasks.example.com"));
        assert!(config.sync_enabled);
        assert_eq!(config.sync_interval(), None);
        assert_eq!(config.propagation_workers, 2);

        apply(&mut config, "remote_url", "none").unwrap();
        assert_eq!(config.remote_url, None);
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();

        assert!(apply(&mut config, "sync_enabled", "maybe").is_err());
        assert!(apply(&mut config, "propagation_queue", "0").is_err());
        assert!(apply(&mut config, "request_timeout_secs", "-1").is_err());
        assert!(apply(&mut config, "favorite_color", "blue").is_err());
    }

    #[test]
    fn test_set_writes_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data");
        std::fs::write(
            &config_path,
            format!("data_dir = {:?}\n", data_dir.display().to_string()),
        )
        .unwrap();
        let output = Output::new(OutputFormat::Quiet);

        set(
            "api_key".to_string(),
            "anon-key".to_string(),
            Some(&config_path),
            &output,
        )
        .unwrap();
        set(
            "sync_interval_secs".to_string(),
            "60".to_string(),
            Some(&config_path),
            &output,
        )
        .unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        let saved = Config::load_from_str(&content).unwrap();
        assert_eq!(saved.data_dir, data_dir);
        assert_eq!(saved.api_key.as_deref(), Some("anon-key"));
        assert_eq!(saved.sync_interval_secs, 60);
    }
}
