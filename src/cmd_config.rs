//! Config check subcommand.

use std::path::Path;

use netlens_config::{Config, ConfigValidator};

/// Print validation findings. Fails when the configuration has errors.
pub(crate) fn run_config_check(path: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        println!("Configuration: {}", path.display());
    } else {
        println!("Configuration: {} not found, using defaults", path.display());
    }

    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        println!("  warning  {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("  error    {}: {}", error.path, error.message);
    }

    if !result.is_valid() {
        return Err(format!("{} configuration error(s)", result.errors.len()).into());
    }
    println!(
        "OK (browser {}, model {})",
        config.browser.endpoint, config.provider.model
    );
    Ok(())
}
