use crate::error::{RaterError, Result};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// 対応拡張子（大文字小文字は区別しない）
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// データセット内の画像パスを列挙
///
/// 各フォルダ内は名前順、ファイルを先に記録してからサブフォルダへ降りる。
/// 読めないサブフォルダはスキップし、残りの結果を返す。
pub fn scan_images(root: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for entry in walk(root)? {
        if entry.file_type().is_file() && is_image_path(entry.path()) {
            images.push(entry.into_path());
        }
    }

    Ok(images)
}

/// ルートを含む全フォルダを同じ順序で列挙
pub fn scan_folders(root: &Path) -> Result<Vec<PathBuf>> {
    Ok(walk(root)?
        .filter(|entry| entry.file_type().is_dir())
        .map(DirEntry::into_path)
        .collect())
}

fn walk(root: &Path) -> Result<impl Iterator<Item = DirEntry>> {
    if !root.is_dir() {
        return Err(RaterError::FolderNotFound(root.display().to_string()));
    }

    let entries = WalkDir::new(root)
        .follow_links(true)
        .sort_by(files_first)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                log::warn!("{}", RaterError::Scan { path, reason: err.to_string() });
                None
            }
        });

    Ok(entries)
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    a_dir
        .cmp(&b_dir)
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Check if a path has a supported image extension
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
