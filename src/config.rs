use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default port for the query service
pub const DEFAULT_PORT: u16 = 7070;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultmapConfig {
    pub database: Option<String>,
    pub port: Option<u16>,
    pub stuck_threshold_minutes: Option<i64>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("vaultmap.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".vaultmap").join("vaultmap.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<VaultmapConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: VaultmapConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &VaultmapConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaultmap.toml");

        let config = VaultmapConfig {
            database: Some("data/edges.db".to_string()),
            port: Some(8080),
            stuck_threshold_minutes: Some(45),
        };
        write_config(&path, &config, false).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.database.as_deref(), Some("data/edges.db"));
        assert_eq!(loaded.port, Some(8080));
        assert_eq!(loaded.stuck_threshold_minutes, Some(45));
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaultmap.toml");

        write_config(&path, &VaultmapConfig::default(), false).unwrap();
        assert!(write_config(&path, &VaultmapConfig::default(), false).is_err());
        assert!(write_config(&path, &VaultmapConfig::default(), true).is_ok());
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(load_config(Some(&path)).unwrap().is_none());
    }

    #[test]
    fn test_ensure_db_dir_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("deep").join("vaultmap.db");

        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().exists());
        // Idempotent on an existing directory
        ensure_db_dir(&db).unwrap();
    }
}
