use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::SettlerConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["swap-settler.toml", "config/swap-settler.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config value `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

/// 指定路径时只读取该文件；否则依次尝试默认路径，都不存在则返回默认配置。
pub fn load_config(path: Option<PathBuf>) -> Result<SettlerConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(SettlerConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<SettlerConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: SettlerConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn explicit_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[platform_fee]\nfee_bps = 30").expect("write");
        let config = load_config(Some(file.path().to_path_buf())).expect("load");
        assert_eq!(config.platform_fee.fee_bps, 30);
    }

    #[test]
    fn missing_explicit_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(Some(dir.path().join("absent.toml"))).expect("load");
        assert_eq!(config.platform_fee.fee_bps, 0);
    }

    #[test]
    fn malformed_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[platform_fee\nfee_bps = 30").expect("write");
        let err = load_config(Some(file.path().to_path_buf())).expect_err("parse");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
