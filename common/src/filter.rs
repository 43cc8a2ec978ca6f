//! フィルタ・ソートパイプライン
//!
//! フォルダ → サイズ → レーティングの順に絞り込み、最後に並べ替える。
//! 入力スライスは変更しない（描画リストは毎回新しく作る）。

use crate::error::{Error, Result};
use crate::types::{ImageDescriptor, Rating};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// 無制限、または明示的な集合（空集合も可）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection<T: Ord> {
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Selection<T> {
    pub fn only<I: IntoIterator<Item = T>>(items: I) -> Self {
        Selection::Only(items.into_iter().collect())
    }

    pub fn allows(&self, item: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.contains(item),
        }
    }
}

impl<T: Ord> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

/// サイズ条件（範囲と最小寸法は排他）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeFilter {
    #[default]
    Any,
    /// 長辺が `min..=max` に収まる
    Range { min: u32, max: u32 },
    /// 幅・高さがそれぞれ最小値以上
    MinDimensions { width: u32, height: u32 },
}

impl SizeFilter {
    pub fn matches(&self, image: &ImageDescriptor) -> bool {
        match *self {
            SizeFilter::Any => true,
            SizeFilter::Range { min, max } => {
                let longest = image.max_dimension();
                min <= longest && longest <= max
            }
            SizeFilter::MinDimensions { width, height } => {
                image.width >= width && image.height >= height
            }
        }
    }
}

/// サイズのプリセット
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizePreset {
    #[default]
    Any,
    /// 長辺 512px 以下
    Small,
    /// 長辺 512〜1024px
    Medium,
    /// 長辺 1024px 以上
    Large,
}

impl SizePreset {
    pub fn to_filter(self) -> SizeFilter {
        match self {
            SizePreset::Any => SizeFilter::Any,
            SizePreset::Small => SizeFilter::Range { min: 0, max: 512 },
            SizePreset::Medium => SizeFilter::Range { min: 512, max: 1024 },
            SizePreset::Large => SizeFilter::Range { min: 1024, max: 99_999 },
        }
    }
}

impl std::str::FromStr for SizePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "any" => Ok(SizePreset::Any),
            "small" | "s" => Ok(SizePreset::Small),
            "medium" | "m" => Ok(SizePreset::Medium),
            "large" | "l" => Ok(SizePreset::Large),
            _ => Err(Error::Parse(format!(
                "unknown size preset: {}. Use any, small, medium, or large",
                s
            ))),
        }
    }
}

/// 並べ替えキー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMode {
    NameAsc,
    NameDesc,
    ResolutionDesc,
    ResolutionAsc,
}

impl std::str::FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "name-asc" | "name" => Ok(SortMode::NameAsc),
            "name-desc" => Ok(SortMode::NameDesc),
            "resolution-desc" | "res-desc" => Ok(SortMode::ResolutionDesc),
            "resolution-asc" | "res-asc" => Ok(SortMode::ResolutionAsc),
            _ => Err(Error::Parse(format!(
                "unknown sort mode: {}. Use name-asc, name-desc, resolution-desc, or resolution-asc",
                s
            ))),
        }
    }
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortMode::NameAsc => write!(f, "name-asc"),
            SortMode::NameDesc => write!(f, "name-desc"),
            SortMode::ResolutionDesc => write!(f, "resolution-desc"),
            SortMode::ResolutionAsc => write!(f, "resolution-asc"),
        }
    }
}

/// 絞り込み条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub folders: Selection<PathBuf>,
    pub size: SizeFilter,
    pub ratings: Selection<Rating>,
}

impl FilterState {
    pub fn matches(&self, image: &ImageDescriptor) -> bool {
        self.folders.allows(&image.folder)
            && self.size.matches(image)
            && self.ratings.allows(&image.rating)
    }
}

/// フォルダ・サイズ・レーティングの順に絞り込む
pub fn apply_filters(images: &[ImageDescriptor], state: &FilterState) -> Vec<ImageDescriptor> {
    images
        .iter()
        .filter(|img| state.folders.allows(&img.folder))
        .filter(|img| state.size.matches(img))
        .filter(|img| state.ratings.allows(&img.rating))
        .cloned()
        .collect()
}

/// 安定ソートで並べ替える（同値は元の順序を保つ）
pub fn sort_descriptors(images: &mut [ImageDescriptor], mode: SortMode) {
    match mode {
        SortMode::NameAsc => images.sort_by(|a, b| a.name.cmp(&b.name)),
        SortMode::NameDesc => images.sort_by(|a, b| b.name.cmp(&a.name)),
        SortMode::ResolutionDesc => images.sort_by(|a, b| b.resolution.cmp(&a.resolution)),
        SortMode::ResolutionAsc => images.sort_by(|a, b| a.resolution.cmp(&b.resolution)),
    }
}

/// 描画リストを作成
///
/// `sort` が `None` の場合はスキャン順のまま。
pub fn render_list(
    images: &[ImageDescriptor],
    state: &FilterState,
    sort: Option<SortMode>,
) -> Vec<ImageDescriptor> {
    let mut list = apply_filters(images, state);
    if let Some(mode) = sort {
        sort_descriptors(&mut list, mode);
    }
    list
}
