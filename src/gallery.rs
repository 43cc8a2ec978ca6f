//! データセット閲覧の状態管理
//!
//! 描画側から呼ばれる操作（読み込み・絞り込み・並べ替え・レーティング）を
//! 1つのスレッドで扱う。バックグラウンドの読み込みは `DecodeWorker` が行い、
//! 結果は完了時に一度だけ受け取る。

use crate::config::Config;
use crate::decoder::{DecodeWorker, LoadedBatch};
use crate::error::{RaterError, Result};
use crate::metadata::MetadataStore;
use crate::thumbnail::ThumbnailCache;
use dataset_rater_common::{
    relative_key, render_list, FilterState, ImageDescriptor, Rating, Selection, SizeFilter,
    SizePreset, SortMode,
};
use image::DynamicImage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

/// 描画側への変更通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    Loading { root: PathBuf },
    Loaded { root: PathBuf, count: usize },
    ViewChanged { visible: usize },
    RatingsChanged { paths: Vec<PathBuf> },
}

pub struct Gallery {
    config: Config,
    root: Option<PathBuf>,
    store: Option<MetadataStore>,
    images: Vec<ImageDescriptor>,
    view: Vec<ImageDescriptor>,
    filter: FilterState,
    sort: Option<SortMode>,
    thumbnails: ThumbnailCache,
    worker: Option<DecodeWorker>,
    subscribers: Vec<Sender<GalleryEvent>>,
}

impl Gallery {
    pub fn new(config: Config) -> Self {
        let thumbnails = ThumbnailCache::new(config.thumbnail_size);
        Self {
            config,
            root: None,
            store: None,
            images: Vec::new(),
            view: Vec::new(),
            filter: FilterState::default(),
            sort: None,
            thumbnails,
            worker: None,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<GalleryEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: GalleryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // -----------------------------
    // 読み込み
    // -----------------------------

    /// データセットを開く
    ///
    /// 前回のワーカーをキャンセルして終了を待ってから、キャッシュを
    /// 初期化して新しいワーカーを起動する。
    pub fn load_dataset(&mut self, folder: &Path) -> Result<()> {
        let base = self.config.require_dataset_base()?.to_path_buf();
        if !folder.is_dir() {
            return Err(RaterError::FolderNotFound(folder.display().to_string()));
        }

        if let Some(mut previous) = self.worker.take() {
            log::debug!("cancelling load of {}", previous.root().display());
            previous.cancel_and_join();
        }

        self.store = Some(MetadataStore::open(folder, Some(&base)));
        self.images.clear();
        self.view.clear();
        self.thumbnails.clear();
        self.root = Some(folder.to_path_buf());

        log::info!("loading dataset {}", folder.display());
        self.worker = Some(DecodeWorker::spawn(folder.to_path_buf()));

        self.emit(GalleryEvent::Loading {
            root: folder.to_path_buf(),
        });
        self.emit(GalleryEvent::ViewChanged { visible: 0 });
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.worker.is_some()
    }

    /// 読み込み完了まで待つ。読み込み中でなければ現在の件数を返す
    pub fn wait_for_load(&mut self) -> Result<usize> {
        match self.worker.take() {
            Some(worker) => {
                let batch = worker.wait()?;
                self.finish_load(batch)
            }
            None => Ok(self.images.len()),
        }
    }

    /// 完了していれば結果を取り込む（ブロックしない）
    pub fn poll_load(&mut self) -> Result<bool> {
        let taken = match self.worker.as_mut() {
            Some(worker) => worker.try_take(),
            None => return Ok(false),
        };

        match taken {
            Ok(Some(batch)) => {
                self.worker = None;
                self.finish_load(batch)?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                self.worker = None;
                Err(err)
            }
        }
    }

    /// レーティングを付与し、孤立エントリを掃除して表示を更新
    fn finish_load(&mut self, batch: LoadedBatch) -> Result<usize> {
        let LoadedBatch { root, mut images } = batch;
        if self.root.as_deref() != Some(root.as_path()) {
            log::warn!("discarding stale batch for {}", root.display());
            return Ok(self.images.len());
        }
        let store = self.store.as_mut().ok_or(RaterError::NoDataset)?;

        let mut valid = HashSet::with_capacity(images.len());
        for image in &mut images {
            if let Some(key) = relative_key(&root, &image.path) {
                image.rating = store.get_rating(&key);
                valid.insert(key);
            }
        }
        let cleaned = store.clean_orphans(&valid);

        let count = images.len();
        self.images = images;
        log::info!("loaded {} images from {}", count, root.display());
        self.emit(GalleryEvent::Loaded { root, count });
        self.refresh();

        cleaned?;
        Ok(count)
    }

    // -----------------------------
    // 絞り込み・並べ替え
    // -----------------------------

    pub fn filter_by_folders(&mut self, folders: Selection<PathBuf>) {
        self.filter.folders = folders;
        self.refresh();
    }

    /// 長辺の範囲で絞り込む（最小寸法の条件は解除される）
    pub fn set_size_filter(&mut self, range: Option<(u32, u32)>) {
        self.filter.size = match range {
            Some((min, max)) => SizeFilter::Range { min, max },
            None => SizeFilter::Any,
        };
        self.refresh();
    }

    pub fn set_size_preset(&mut self, preset: SizePreset) {
        self.filter.size = preset.to_filter();
        self.refresh();
    }

    /// 最小寸法で絞り込む（長辺の範囲条件は解除される）
    pub fn set_min_dimensions(&mut self, width: u32, height: u32) {
        self.filter.size = SizeFilter::MinDimensions { width, height };
        self.refresh();
    }

    pub fn set_rating_filter(&mut self, ratings: Selection<Rating>) {
        self.filter.ratings = ratings;
        self.refresh();
    }

    pub fn sort_images(&mut self, mode: SortMode) {
        self.sort = Some(mode);
        self.refresh();
    }

    fn refresh(&mut self) {
        self.view = render_list(&self.images, &self.filter, self.sort);
        let visible = self.view.len();
        self.emit(GalleryEvent::ViewChanged { visible });
    }

    // -----------------------------
    // レーティング
    // -----------------------------

    /// 選択中の画像にレーティングを設定（1枚ごとにシャードを書き直す）
    pub fn set_rating_for_selection(&mut self, paths: &[PathBuf], rating: Rating) -> Result<()> {
        let root = self.root.clone().ok_or(RaterError::NoDataset)?;
        let store = self.store.as_mut().ok_or(RaterError::NoDataset)?;

        let mut changed = Vec::new();
        let mut result = Ok(());
        for path in paths {
            let Some(key) = relative_key(&root, path) else {
                log::warn!("{}", RaterError::OutsideDataset(path.display().to_string()));
                continue;
            };

            if let Err(err) = store.set_rating(&key, rating) {
                result = Err(err);
                break;
            }
            if let Some(image) = self.images.iter_mut().find(|d| &d.path == path) {
                image.rating = rating;
            }
            changed.push(path.clone());
        }

        if !changed.is_empty() {
            self.emit(GalleryEvent::RatingsChanged { paths: changed });
        }
        self.refresh();
        result
    }

    pub fn rating_of(&self, path: &Path) -> Rating {
        self.images
            .iter()
            .find(|d| d.path == path)
            .map(|d| d.rating)
            .unwrap_or_default()
    }

    // -----------------------------
    // 表示
    // -----------------------------

    /// 描画リスト
    pub fn view(&self) -> &[ImageDescriptor] {
        &self.view
    }

    pub fn images(&self) -> &[ImageDescriptor] {
        &self.images
    }

    /// バッジ付きサムネイル
    pub fn thumbnail(&mut self, image: &ImageDescriptor) -> Result<DynamicImage> {
        self.thumbnails.render(image)
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn store(&self) -> Option<&MetadataStore> {
        self.store.as_ref()
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort_mode(&self) -> Option<SortMode> {
        self.sort
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        RgbImage::from_pixel(width, height, Rgb([1, 2, 3]))
            .save(path)
            .unwrap();
    }

    fn config_with_base(base: &Path) -> Config {
        let mut config = Config::default();
        config.dataset_base_path = Some(base.to_path_buf());
        config
    }

    #[test]
    fn test_load_requires_dataset_base() {
        let dir = tempdir().unwrap();
        let mut gallery = Gallery::new(Config::default());
        let err = gallery.load_dataset(dir.path()).unwrap_err();
        assert!(matches!(err, RaterError::Configuration(_)));
        assert!(!gallery.is_loading());
    }

    #[test]
    fn test_load_missing_folder() {
        let dir = tempdir().unwrap();
        let mut gallery = Gallery::new(config_with_base(dir.path()));
        let err = gallery.load_dataset(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, RaterError::FolderNotFound(_)));
    }

    #[test]
    fn test_rating_edit_refreshes_view() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ds");
        write_png(&root.join("a.png"), 10, 10);
        write_png(&root.join("b.png"), 20, 20);

        let mut gallery = Gallery::new(config_with_base(dir.path()));
        gallery.load_dataset(&root).unwrap();
        assert_eq!(gallery.wait_for_load().unwrap(), 2);

        gallery.set_rating_filter(Selection::only([Rating::new(5).unwrap()]));
        assert!(gallery.view().is_empty());

        gallery
            .set_rating_for_selection(&[root.join("b.png")], Rating::new(5).unwrap())
            .unwrap();
        assert_eq!(gallery.view().len(), 1);
        assert_eq!(gallery.view()[0].name, "b.png");
        assert_eq!(gallery.rating_of(&root.join("b.png")), Rating::new(5).unwrap());
    }

    #[test]
    fn test_events_are_sent() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ds");
        write_png(&root.join("a.png"), 10, 10);

        let mut gallery = Gallery::new(config_with_base(dir.path()));
        let rx = gallery.subscribe();
        gallery.load_dataset(&root).unwrap();
        gallery.wait_for_load().unwrap();

        let events: Vec<GalleryEvent> = rx.try_iter().collect();
        assert_eq!(events[0], GalleryEvent::Loading { root: root.clone() });
        assert!(events.contains(&GalleryEvent::Loaded { root, count: 1 }));
        assert_eq!(events.last(), Some(&GalleryEvent::ViewChanged { visible: 1 }));
    }

    #[test]
    fn test_reload_clears_thumbnails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ds");
        write_png(&root.join("a.png"), 10, 10);

        let mut gallery = Gallery::new(config_with_base(dir.path()));
        gallery.load_dataset(&root).unwrap();
        gallery.wait_for_load().unwrap();

        let first = gallery.view()[0].clone();
        gallery.thumbnail(&first).unwrap();
        assert_eq!(gallery.thumbnails().len(), 1);

        gallery.load_dataset(&root).unwrap();
        assert!(gallery.thumbnails().is_empty());
        assert!(gallery.images().is_empty());
        gallery.wait_for_load().unwrap();
        assert_eq!(gallery.images().len(), 1);
    }

    #[test]
    fn test_failed_rating_write_leaves_descriptor_unchanged() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ds");
        write_png(&root.join("x.png"), 10, 10);
        write_png(&root.join("y.png"), 10, 10);

        let mut gallery = Gallery::new(config_with_base(dir.path()));
        gallery.load_dataset(&root).unwrap();
        gallery.wait_for_load().unwrap();
        let rx = gallery.subscribe();

        let shard_path = dir.path().join("_metadata/ds/ratings.json");
        std::fs::create_dir_all(&shard_path).unwrap();

        let err = gallery
            .set_rating_for_selection(&[root.join("x.png")], Rating::new(5).unwrap())
            .unwrap_err();
        assert!(matches!(err, RaterError::MetadataWrite { .. }));
        assert_eq!(gallery.rating_of(&root.join("x.png")), Rating::UNRATED);
        let events: Vec<GalleryEvent> = rx.try_iter().collect();
        assert!(!events
            .iter()
            .any(|e| matches!(e, GalleryEvent::RatingsChanged { .. })));

        std::fs::remove_dir(&shard_path).unwrap();
        gallery
            .set_rating_for_selection(&[root.join("y.png")], Rating::new(1).unwrap())
            .unwrap();
        let shard = crate::metadata::RatingShard::load(&shard_path);
        assert!(!shard.contains("x.png"));
        assert!(shard.contains("y.png"));
    }

    #[test]
    fn test_rating_without_dataset() {
        let mut gallery = Gallery::new(Config::default());
        let err = gallery
            .set_rating_for_selection(&[PathBuf::from("/x.png")], Rating::new(1).unwrap())
            .unwrap_err();
        assert!(matches!(err, RaterError::NoDataset));
    }
}
