use std::path::{Component, Path, PathBuf};

/// メタデータ格納フォルダ名（データセットベース直下）
pub const METADATA_DIR_NAME: &str = "_metadata";
/// データセットルート用シャード
pub const ROOT_SHARD_FILE: &str = "ratings.json";
/// ベース外・未設定時の単一ファイル
pub const LOCAL_RATINGS_FILE: &str = ".ratings.json";

/// 開いたフォルダとデータセットベースから導かれる情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetContext {
    pub root: PathBuf,
    pub base: Option<PathBuf>,
    /// ベース配下の場合のみ
    pub dataset_name: Option<String>,
    pub metadata_root: PathBuf,
}

impl DatasetContext {
    /// `root` がベース配下なら `base/_metadata/<データセット名>`、
    /// それ以外はフォルダ自身にローカルファイルを置く。
    pub fn new(root: &Path, base: Option<&Path>) -> Self {
        let dataset_name = base.and_then(|base| dataset_name(root, base));

        let metadata_root = match (&dataset_name, base) {
            (Some(name), Some(base)) => base.join(METADATA_DIR_NAME).join(name),
            _ => root.to_path_buf(),
        };

        Self {
            root: root.to_path_buf(),
            base: base.map(Path::to_path_buf),
            dataset_name,
            metadata_root,
        }
    }

    pub fn is_sharded(&self) -> bool {
        self.dataset_name.is_some()
    }

    /// 相対パスに対応するシャードファイル（I/Oなし）
    ///
    /// ルート直下の画像はルートシャード、サブフォルダ配下の画像は
    /// 深さに関係なく第1階層フォルダのシャードを使う。
    pub fn resolve_shard(&self, relative_path: &str) -> PathBuf {
        if !self.is_sharded() {
            return self.metadata_root.join(LOCAL_RATINGS_FILE);
        }

        let mut segments = relative_path.split('/').filter(|s| !s.is_empty());
        let first = segments.next();
        match (first, segments.next()) {
            (Some(folder), Some(_)) => self.metadata_root.join(format!("{}-ratings.json", folder)),
            _ => self.metadata_root.join(ROOT_SHARD_FILE),
        }
    }
}

fn dataset_name(root: &Path, base: &Path) -> Option<String> {
    let relative = root.strip_prefix(base).ok()?;

    match relative.components().find(|c| matches!(c, Component::Normal(_))) {
        Some(Component::Normal(first)) => Some(first.to_string_lossy().to_string()),
        _ => root.file_name().map(|n| n.to_string_lossy().to_string()),
    }
}
