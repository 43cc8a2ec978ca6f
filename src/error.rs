use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaterError {
    #[error("設定エラー: {0}")]
    Configuration(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("フォルダを読み込めません: {path} ({reason})")]
    Scan { path: String, reason: String },

    #[error("画像読み込みエラー: {path} ({source})")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("メタデータ読み込みエラー: {path} ({reason})")]
    MetadataRead { path: String, reason: String },

    #[error("メタデータ書き込みエラー: {path} ({source})")]
    MetadataWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("データセットが開かれていません")]
    NoDataset,

    #[error("データセット外のパスです: {0}")]
    OutsideDataset(String),

    #[error(transparent)]
    Common(#[from] dataset_rater_common::Error),

    #[error("読み込みがキャンセルされました: {0}")]
    WorkerCancelled(String),

    #[error("読み込みスレッドが異常終了しました")]
    WorkerPanicked,

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RaterError>;
