use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use lockward_common::{LockwardConfig, LockwardConfigStore};
use tracing::*;

/// Loads the YAML config at `path`; `LOCKWARD_<SECTION>__<KEY>` variables override it.
pub fn load_config(path: &Path) -> Result<LockwardConfig> {
    let store: LockwardConfigStore = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix("LOCKWARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Could not load config")?
        .try_deserialize()
        .context("Could not parse config")?;

    let config = LockwardConfig { store };

    info!(
        "Using config: {path:?} (environment: {:?}, lockout store: {})",
        config.store.environment,
        if config.store.lockout.store.is_some() {
            "shared"
        } else {
            "local"
        },
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use lockward_common::SigningAlgorithm;

    use super::*;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("lockward-{}-{name}.yaml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_config() {
        let path = write_config(
            "load",
            r#"
environment: development
cache_signing:
  algorithm: sha512
  key_rotation_interval: 1h
lockout:
  max_attempts: 3
  window: 5m
"#,
        );
        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.store.cache_signing.algorithm, SigningAlgorithm::Sha512);
        assert_eq!(
            config.store.cache_signing.key_rotation_interval,
            Duration::from_secs(3600)
        );
        assert_eq!(config.store.lockout.max_attempts, 3);
        assert_eq!(config.store.lockout.window, Duration::from_secs(300));
        assert!(config.store.http.enable);
    }

    #[test]
    fn test_missing_config_fails() {
        assert!(load_config(Path::new("/nonexistent/lockward.yaml")).is_err());
    }
}
