//! レーティングメタデータ
//!
//! 画像の相対パスから担当シャードを決め、シャードを遅延読み込み・キャッシュする。
//! 変更は毎回シャード全体を書き直して即時に永続化する。

mod context;
mod shard;

pub use context::{DatasetContext, LOCAL_RATINGS_FILE, METADATA_DIR_NAME, ROOT_SHARD_FILE};
pub use shard::RatingShard;

use crate::error::Result;
use dataset_rater_common::Rating;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub struct MetadataStore {
    context: DatasetContext,
    /// シャードパス → 内容
    cache: HashMap<PathBuf, RatingShard>,
}

impl MetadataStore {
    pub fn new(context: DatasetContext) -> Self {
        if context.is_sharded() {
            if let Err(err) = std::fs::create_dir_all(&context.metadata_root) {
                // 書き込み時に再度作成を試みる
                log::warn!(
                    "cannot create {}: {}",
                    context.metadata_root.display(),
                    err
                );
            }
        }

        Self {
            context,
            cache: HashMap::new(),
        }
    }

    /// フォルダとベースから開く
    pub fn open(root: &Path, base: Option<&Path>) -> Self {
        Self::new(DatasetContext::new(root, base))
    }

    pub fn context(&self) -> &DatasetContext {
        &self.context
    }

    pub fn resolve_shard(&self, relative_path: &str) -> PathBuf {
        self.context.resolve_shard(relative_path)
    }

    fn shard_mut(&mut self, relative_path: &str) -> &mut RatingShard {
        let path = self.resolve_shard(relative_path);
        self.cache
            .entry(path)
            .or_insert_with_key(|path| RatingShard::load(path))
    }

    pub fn get_rating(&mut self, relative_path: &str) -> Rating {
        self.shard_mut(relative_path).get(relative_path)
    }

    /// レーティングを設定し、シャードを書き直す
    ///
    /// 書き込みに失敗した場合はキャッシュを元の値に戻す。
    pub fn set_rating(&mut self, relative_path: &str, rating: Rating) -> Result<()> {
        let shard = self.shard_mut(relative_path);
        let previous = shard.get(relative_path);
        shard.set(relative_path, rating);
        if let Err(err) = shard.save() {
            shard.set(relative_path, previous);
            return Err(err);
        }
        log::info!("rated {} = {} ({})", relative_path, rating, shard.path().display());
        Ok(())
    }

    /// キャッシュ済みシャードから、有効な集合にないキーを削除
    ///
    /// 変更のあったシャードのみ書き直す。削除件数を返す。
    pub fn clean_orphans(&mut self, valid_relative_paths: &HashSet<String>) -> Result<usize> {
        let mut removed = 0;

        for shard in self.cache.values_mut() {
            let count = shard.retain(|key| valid_relative_paths.contains(key));
            if count > 0 {
                shard.save()?;
                log::info!("removed {} orphan entries from {}", count, shard.path().display());
                removed += count;
            }
        }

        Ok(removed)
    }

    pub fn cached_shards(&self) -> impl Iterator<Item = &RatingShard> {
        self.cache.values()
    }

    pub fn is_cached(&self, shard_path: &Path) -> bool {
        self.cache.contains_key(shard_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rating(v: u8) -> Rating {
        Rating::new(v).unwrap()
    }

    #[test]
    fn test_get_rating_is_lazy() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        let root = base.join("ds");

        let mut store = MetadataStore::open(&root, Some(base));
        assert!(base.join("_metadata").join("ds").is_dir());
        assert_eq!(store.cached_shards().count(), 0);

        assert_eq!(store.get_rating("catA/x.png"), Rating::UNRATED);
        assert!(store.is_cached(&base.join("_metadata/ds/catA-ratings.json")));
        assert_eq!(store.cached_shards().count(), 1);
        // 読み込みだけではファイルは作られない
        assert!(!base.join("_metadata/ds/catA-ratings.json").exists());
    }

    #[test]
    fn test_set_rating_writes_through() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        let mut store = MetadataStore::open(&base.join("ds"), Some(base));

        store.set_rating("root.png", rating(4)).unwrap();
        let shard = RatingShard::load(&base.join("_metadata/ds/ratings.json"));
        assert_eq!(shard.get("root.png"), rating(4));

        store.set_rating("root.png", Rating::UNRATED).unwrap();
        let shard = RatingShard::load(&base.join("_metadata/ds/ratings.json"));
        assert!(!shard.contains("root.png"));
        assert_eq!(store.get_rating("root.png"), Rating::UNRATED);
    }

    #[test]
    fn test_failed_write_keeps_previous_rating() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        let shard_path = base.join("_metadata/ds/ratings.json");
        let mut store = MetadataStore::open(&base.join("ds"), Some(base));
        store.set_rating("x.png", rating(2)).unwrap();

        // シャードのパスをディレクトリで塞ぐ
        std::fs::remove_file(&shard_path).unwrap();
        std::fs::create_dir_all(&shard_path).unwrap();
        let err = store.set_rating("x.png", rating(5)).unwrap_err();
        assert!(matches!(err, crate::error::RaterError::MetadataWrite { .. }));
        assert_eq!(store.get_rating("x.png"), rating(2));

        // 後続の書き込みで失敗した値が保存されないこと
        std::fs::remove_dir(&shard_path).unwrap();
        store.set_rating("z.png", rating(1)).unwrap();

        let mut cold = MetadataStore::open(&base.join("ds"), Some(base));
        assert_eq!(cold.get_rating("x.png"), rating(2));
        assert_eq!(cold.get_rating("z.png"), rating(1));
    }

    #[test]
    fn test_local_fallback_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("loose");
        std::fs::create_dir_all(&root).unwrap();

        let mut store = MetadataStore::open(&root, None);
        store.set_rating("a/b/c.png", rating(1)).unwrap();
        store.set_rating("top.png", rating(2)).unwrap();

        let shard = RatingShard::load(&root.join(LOCAL_RATINGS_FILE));
        assert_eq!(shard.len(), 2);
        assert!(!dir.path().join(METADATA_DIR_NAME).exists());
    }

    #[test]
    fn test_clean_orphans_only_rewrites_changed_shards() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        let mut store = MetadataStore::open(&base.join("ds"), Some(base));

        store.set_rating("a.png", rating(5)).unwrap();
        store.set_rating("b.png", rating(3)).unwrap();
        store.set_rating("catA/c.png", rating(2)).unwrap();

        // 変更のないシャードは書き直されないことを確認するため削除しておく
        let cat_shard = base.join("_metadata/ds/catA-ratings.json");
        std::fs::remove_file(&cat_shard).unwrap();

        let valid: HashSet<String> = ["a.png", "catA/c.png"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.clean_orphans(&valid).unwrap(), 1);

        let root_shard: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(base.join("_metadata/ds/ratings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(root_shard, serde_json::json!({"a.png": 5}));
        assert!(!cat_shard.exists());
    }

    #[test]
    fn test_clean_orphans_ignores_uncached_shards() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        let meta = base.join("_metadata/ds");
        std::fs::create_dir_all(&meta).unwrap();
        std::fs::write(meta.join("catB-ratings.json"), r#"{"catB/gone.png": 3}"#).unwrap();

        let mut store = MetadataStore::open(&base.join("ds"), Some(base));
        assert_eq!(store.clean_orphans(&HashSet::new()).unwrap(), 0);
        assert!(RatingShard::load(&meta.join("catB-ratings.json")).contains("catB/gone.png"));
    }
}
