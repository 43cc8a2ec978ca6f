use crate::error::{RaterError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 既定のサムネイルサイズ（正方形の一辺）
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 260;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// データセットベース（直下のフォルダがそれぞれデータセット）
    pub dataset_base_path: Option<PathBuf>,
    pub thumbnail_size: u32,
    /// 保存先（`load_from` で読み込んだ場合のみ設定）
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_base_path: None,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            source: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから読み込み（ファイルがなければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = match &self.source {
            Some(path) => path.clone(),
            None => Self::config_path()?,
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RaterError::Configuration("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("dataset-rater").join("config.json"))
    }

    pub fn dataset_base_path(&self) -> Option<&Path> {
        self.dataset_base_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn set_dataset_base_path(&mut self, path: PathBuf) -> Result<()> {
        self.dataset_base_path = Some(path);
        self.save()
    }

    /// データセット閲覧にはベースの設定が必須
    pub fn require_dataset_base(&self) -> Result<&Path> {
        self.dataset_base_path().ok_or_else(|| {
            RaterError::Configuration(
                "データセットベースが設定されていません。`dataset-rater config --set-dataset-base PATH` で設定してください".into(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.dataset_base_path(), None);
        assert_eq!(config.thumbnail_size, DEFAULT_THUMBNAIL_SIZE);
    }

    #[test]
    fn test_set_dataset_base_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::load_from(&path).unwrap();
        config.set_dataset_base_path(PathBuf::from("/datasets")).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.dataset_base_path(), Some(Path::new("/datasets")));
        assert_eq!(reloaded.require_dataset_base().unwrap(), Path::new("/datasets"));
    }

    #[test]
    fn test_require_dataset_base_missing() {
        let config = Config::default();
        let err = config.require_dataset_base().unwrap_err();
        assert!(matches!(err, RaterError::Configuration(_)));
    }

    #[test]
    fn test_empty_base_is_unset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"dataset_base_path": ""}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.dataset_base_path(), None);
        assert_eq!(config.thumbnail_size, DEFAULT_THUMBNAIL_SIZE);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(RaterError::JsonParse(_))));
    }
}
