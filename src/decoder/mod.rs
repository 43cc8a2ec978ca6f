//! バックグラウンド読み込み
//!
//! スキャン → デコードを別スレッドで実行し、完了したバッチを一度だけ受け渡す。
//! 途中経過は送らない。キャンセルされたワーカーは何も送らない。

use crate::error::{RaterError, Result};
use crate::scanner;
use dataset_rater_common::ImageDescriptor;
use image::ImageReader;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// 完了した読み込み結果
#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub root: PathBuf,
    pub images: Vec<ImageDescriptor>,
}

/// 1ファイルを開いて寸法を読み取る
pub fn decode_image(path: &Path) -> Result<ImageDescriptor> {
    let (width, height) = ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|source| RaterError::Decode {
            path: path.display().to_string(),
            source,
        })?;

    Ok(ImageDescriptor::new(path.to_path_buf(), width, height))
}

/// スキャン済みパスをデコード（失敗したファイルは黙ってスキップ）
///
/// キャンセル時は `None`。結果はスキャン順を保つ。
pub fn decode_all(paths: &[PathBuf], cancel: &AtomicBool) -> Option<Vec<ImageDescriptor>> {
    let images: Vec<ImageDescriptor> = paths
        .par_iter()
        .filter_map(|path| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            match decode_image(path) {
                Ok(image) => Some(image),
                Err(err) => {
                    log::debug!("skip {}: {}", path.display(), err);
                    None
                }
            }
        })
        .collect();

    if cancel.load(Ordering::Relaxed) {
        return None;
    }
    Some(images)
}

fn load_dataset(root: &Path, cancel: &AtomicBool) -> Option<LoadedBatch> {
    let paths = match scanner::scan_images(root) {
        Ok(paths) => paths,
        Err(err) => {
            log::warn!("{}", err);
            Vec::new()
        }
    };
    if cancel.load(Ordering::Relaxed) {
        return None;
    }

    let images = decode_all(&paths, cancel)?;
    log::info!(
        "decoded {} of {} files under {}",
        images.len(),
        paths.len(),
        root.display()
    );

    Some(LoadedBatch {
        root: root.to_path_buf(),
        images,
    })
}

/// 読み込みワーカー（同時に動くのは1つだけ）
pub struct DecodeWorker {
    root: PathBuf,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    rx: Receiver<LoadedBatch>,
}

impl DecodeWorker {
    pub fn spawn(root: PathBuf) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let worker_root = root.clone();
        let worker_cancel = Arc::clone(&cancel);
        let handle = std::thread::spawn(move || {
            if let Some(batch) = load_dataset(&worker_root, &worker_cancel) {
                let _ = tx.send(batch);
            }
        });

        Self {
            root,
            cancel,
            handle: Some(handle),
            rx,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// キャンセルを要求し、スレッドの終了を待つ
    pub fn cancel_and_join(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("decode worker for {} panicked", self.root.display());
            }
        }
    }

    /// 完了していれば結果を受け取る（ブロックしない）
    pub fn try_take(&mut self) -> Result<Option<LoadedBatch>> {
        match self.rx.try_recv() {
            Ok(batch) => {
                self.join()?;
                Ok(Some(batch))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// 完了まで待って結果を受け取る
    pub fn wait(mut self) -> Result<LoadedBatch> {
        match self.rx.recv() {
            Ok(batch) => {
                self.join()?;
                Ok(batch)
            }
            Err(_) => Err(self.disconnected()),
        }
    }

    fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| RaterError::WorkerPanicked),
            None => Ok(()),
        }
    }

    fn disconnected(&mut self) -> RaterError {
        if self.join().is_err() {
            return RaterError::WorkerPanicked;
        }
        RaterError::WorkerCancelled(self.root.display().to_string())
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.cancel_and_join();
    }
}
