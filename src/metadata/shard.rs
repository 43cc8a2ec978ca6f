use crate::error::{RaterError, Result};
use dataset_rater_common::Rating;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// レーティングシャード（相対パス → 1〜5、0は保存しない）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingShard {
    path: PathBuf,
    entries: BTreeMap<String, u8>,
}

impl RatingShard {
    pub fn empty(path: PathBuf) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
        }
    }

    /// シャードファイルを読み込み
    ///
    /// ファイルがない・壊れている場合は空として扱う。
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::empty(path.to_path_buf());
        }

        match read_entries(path) {
            Ok(entries) => Self {
                path: path.to_path_buf(),
                entries,
            },
            Err(err) => {
                log::warn!("{}", err);
                Self::empty(path.to_path_buf())
            }
        }
    }

    /// シャード全体を書き直す
    pub fn save(&self) -> Result<()> {
        let write_err = |source: std::io::Error| RaterError::MetadataWrite {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let file = File::create(&self.path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.entries)
            .map_err(|e| write_err(e.into()))?;
        writer.flush().map_err(write_err)?;

        log::debug!("wrote {} entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Rating {
        self.entries
            .get(key)
            .and_then(|&v| Rating::new(v).ok())
            .unwrap_or_default()
    }

    /// 0なら削除、それ以外は挿入・更新。変更があれば `true`
    pub fn set(&mut self, key: &str, rating: Rating) -> bool {
        if rating.is_rated() {
            self.entries.insert(key.to_string(), rating.value()) != Some(rating.value())
        } else {
            self.entries.remove(key).is_some()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// `keep` を満たさないキーを削除し、削除件数を返す
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| keep(key));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Rating)> {
        self.entries
            .iter()
            .filter_map(|(k, &v)| Rating::new(v).ok().map(|r| (k.as_str(), r)))
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, u8>> {
    let read_err = |reason: String| RaterError::MetadataRead {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path).map_err(|e| read_err(e.to_string()))?;
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| read_err(e.to_string()))?;

    // 範囲外・数値以外の値は読み飛ばす
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let rating = value.as_u64().filter(|v| (1..=u64::from(Rating::MAX)).contains(v))?;
            Some((key, rating as u8))
        })
        .collect())
}
