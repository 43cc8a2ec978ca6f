//! サムネイルキャッシュ
//!
//! 絶対パスをキーに縮小画像をメモリ上に保持する。レーティングのバッジは
//! 表示のたびにコピーへ描き込み、キャッシュ本体には描かない。
//! データセットを開き直すと全体を破棄する（それ以外の追い出しはしない）。

use crate::error::{RaterError, Result};
use dataset_rater_common::{ImageDescriptor, Rating};
use image::{DynamicImage, ImageReader, Rgba, RgbaImage};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const BADGE_MARGIN: u32 = 6;
const BADGE_PIP: u32 = 10;
const BADGE_GAP: u32 = 4;
const BADGE_FILL: Rgba<u8> = Rgba([255, 215, 0, 255]);
const BADGE_OUTLINE: Rgba<u8> = Rgba([30, 30, 30, 255]);

/// 書き出し先のパス。データセット内のフォルダ構成をそのまま写し、
/// 元のファイル名に `.png` を付ける。
pub fn output_path(output: &Path, relative_key: &str) -> PathBuf {
    let mut target = output.to_path_buf();
    target.extend(relative_key.split('/'));
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".png");
    target.set_file_name(name);
    target
}

pub struct ThumbnailCache {
    size: u32,
    entries: HashMap<PathBuf, DynamicImage>,
}

impl ThumbnailCache {
    pub fn new(size: u32) -> Self {
        Self {
            size: size.max(1),
            entries: HashMap::new(),
        }
    }

    /// キャッシュ済みならそれを、なければデコードして縮小する
    pub fn get(&mut self, path: &Path) -> Result<&DynamicImage> {
        match self.entries.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(load_thumbnail(path, self.size)?)),
        }
    }

    /// 表示用の画像（レーティング > 0 ならバッジ付きのコピー）
    pub fn render(&mut self, image: &ImageDescriptor) -> Result<DynamicImage> {
        let base = self.get(&image.path)?;
        if !image.rating.is_rated() {
            return Ok(base.clone());
        }
        Ok(DynamicImage::ImageRgba8(draw_badge(base, image.rating)))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// アスペクト比を保ったまま正方形に収める（拡大はしない）
fn load_thumbnail(path: &Path, size: u32) -> Result<DynamicImage> {
    let image = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|source| RaterError::Decode {
            path: path.display().to_string(),
            source,
        })?;

    if image.width() <= size && image.height() <= size {
        return Ok(image);
    }
    Ok(image.thumbnail(size, size))
}

/// 左上にレーティング数の丸印を描く
fn draw_badge(base: &DynamicImage, rating: Rating) -> RgbaImage {
    let mut canvas = base.to_rgba8();
    let (width, height) = canvas.dimensions();

    for i in 0..u32::from(rating.value()) {
        let x0 = BADGE_MARGIN + i * (BADGE_PIP + BADGE_GAP);
        let y0 = BADGE_MARGIN;
        for y in y0..(y0 + BADGE_PIP).min(height) {
            for x in x0..(x0 + BADGE_PIP).min(width) {
                let edge = x == x0 || y == y0 || x == x0 + BADGE_PIP - 1 || y == y0 + BADGE_PIP - 1;
                let color = if edge { BADGE_OUTLINE } else { BADGE_FILL };
                canvas.put_pixel(x, y, color);
            }
        }
    }

    canvas
}
