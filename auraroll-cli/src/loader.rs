use std::fs;
use std::path::{Path, PathBuf};

use auraroll_engine::{Catalog, CatalogError, CatalogLoader, ConfigError, EngineConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog in {path}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },
    #[error("malformed engine config in {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Loads the catalog and tuning from files, falling back to the built-in
/// table and default tuning for whichever path is absent.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    pub catalog: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

impl CatalogLoader for FileLoader {
    type Error = LoadError;

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        let Some(path) = self.catalog.as_deref() else {
            return Ok(auraroll_engine::builtin_catalog().clone());
        };
        let json = read(path)?;
        log::debug!("loading catalog from {}", path.display());
        Catalog::from_json(&json).map_err(|source| LoadError::Catalog {
            path: path.to_path_buf(),
            source,
        })
    }

    fn load_config(&self) -> Result<EngineConfig, Self::Error> {
        let Some(path) = self.config.as_deref() else {
            return Ok(EngineConfig::default());
        };
        let json = read(path)?;
        let config = EngineConfig::from_json(&json).map_err(|source| LoadError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(label: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "auraroll-loader-{label}-{}",
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_without_paths() {
        let loader = FileLoader::default();
        assert_eq!(loader.load_config().unwrap(), EngineConfig::default());
        assert_eq!(
            loader.load_catalog().unwrap().fingerprint(),
            auraroll_engine::builtin_catalog().fingerprint()
        );
    }

    #[test]
    fn reads_partial_config_files() {
        let path = temp_file("config.json", r#"{"batch_max_trials": 1000}"#);
        let loader = FileLoader {
            config: Some(path),
            ..FileLoader::default()
        };
        let config = loader.load_config().unwrap();
        assert_eq!(config.batch_max_trials, 1000);
        assert_eq!(config.slice_ms, EngineConfig::default_slice_ms());
    }

    #[test]
    fn rejects_invalid_config_values() {
        let path = temp_file("zero.json", r#"{"slice_ms": 0}"#);
        let loader = FileLoader {
            config: Some(path),
            ..FileLoader::default()
        };
        assert!(matches!(loader.load_config(), Err(LoadError::Config(_))));
    }

    #[test]
    fn reports_catalog_errors_with_path() {
        let path = temp_file("catalog.json", r#"{"default_context": "VOID"}"#);
        let loader = FileLoader {
            catalog: Some(path.clone()),
            ..FileLoader::default()
        };
        let err = loader.load_catalog().unwrap_err();
        assert!(err.to_string().contains(&path.display().to_string()));
        assert!(matches!(
            err,
            LoadError::Catalog {
                source: CatalogError::MissingDefault(_),
                ..
            }
        ));
    }

    #[test]
    fn missing_files_are_read_errors() {
        let loader = FileLoader {
            catalog: Some(PathBuf::from("/nonexistent/auraroll/catalog.json")),
            ..FileLoader::default()
        };
        assert!(matches!(loader.load_catalog(), Err(LoadError::Read { .. })));
    }
}
