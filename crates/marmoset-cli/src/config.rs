//! Configuration file parsing for marmoset.toml.

use marmoset_core::{ContextOptions, FrontendOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Options for every execution context the CLI creates
    #[serde(default)]
    pub context: ContextOptions,

    /// Options for frontend (compile-only) contexts
    #[serde(default)]
    pub frontend: FrontendOptions,

    /// Smoke suite settings
    #[serde(default)]
    pub smoke: SmokeConfig,
}

/// Smoke suite configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmokeConfig {
    /// Iterations per suite when `-n` is not given
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
        }
    }
}

fn default_iterations() -> usize {
    100
}

/// Load configuration from a file or search for default config files.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = path.map(PathBuf::from).or_else(find_config_file);

    match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            config.context.validate()?;
            config.frontend.validate()?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        Some(path) => Err(anyhow::anyhow!("Config file not found: {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Search for configuration file in the current directory and parent directories.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;

    const CONFIG_NAMES: &[&str] = &["marmoset.toml", ".marmosetrc.toml"];

    let mut dir = Some(cwd.as_path());
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.smoke.iterations, 100);
        assert_eq!(config.context, ContextOptions::default());
        assert_eq!(config.frontend.native_stack_size, 0);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[context]
heap_max_bytes = 67108864
native_stack_size = 524288
gc_incremental_enabled = true
gc_slice_time_budget = 10

[frontend]
native_stack_size = 262144

[smoke]
iterations = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.context.heap_max_bytes, 64 * 1024 * 1024);
        assert_eq!(config.context.native_stack_size, 512 * 1024);
        assert!(config.context.gc_incremental_enabled);
        assert_eq!(config.context.gc_slice_time_budget, Duration::from_millis(10));
        assert_eq!(config.frontend.native_stack_size, 256 * 1024);
        assert_eq!(config.smoke.iterations, 5);
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str("[smoke]\n").unwrap();
        assert_eq!(config.smoke.iterations, 100);
        assert_eq!(config.context.heap_max_bytes, 0);
    }

    #[test]
    fn test_missing_explicit_path() {
        let err = load_config(Some(Path::new("/nonexistent/marmoset.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marmoset.toml");
        std::fs::write(&path, "[smoke]\niterations = 3\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.smoke.iterations, 3);
    }

    #[test]
    fn test_load_rejects_invalid_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marmoset.toml");
        std::fs::write(&path, "[frontend]\nnative_stack_size = 8\n").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }
}
