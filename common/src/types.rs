//! 画像データの型定義
//!
//! CLIと描画側で共有される型:
//! - Rating: 0〜5のレーティング（0 = 未評価）
//! - ImageDescriptor: スキャン・デコード済み画像1枚分のレコード

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// 0〜5のレーティング
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;
    pub const UNRATED: Rating = Rating(0);

    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::InvalidRating(value));
        }
        Ok(Rating(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_rated(self) -> bool {
        self.0 > 0
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// スキャン・デコード済みの画像
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    /// 画像ファイルの絶対パス
    pub path: PathBuf,
    /// 直接の親フォルダ
    pub folder: PathBuf,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// width × height
    pub resolution: u64,
    #[serde(default)]
    pub rating: Rating,
}

impl ImageDescriptor {
    /// デコード結果から生成（レーティングは未評価）
    pub fn new(path: PathBuf, width: u32, height: u32) -> Self {
        let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            path,
            folder,
            name,
            width,
            height,
            resolution: u64::from(width) * u64::from(height),
            rating: Rating::UNRATED,
        }
    }

    /// 長辺のピクセル数
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// データセットルートからの相対キー（区切りは常に `/`）
///
/// `path` が `root` 配下にない場合（`..` や `.` を含む場合も）は `None`。
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Option<Vec<String>>>()?;

    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
