//! 画像データセット閲覧・レーティング管理
//!
//! スキャン → デコード → レーティング付与 → 絞り込み・並べ替えまでを扱う。
//! 画面描画は呼び出し側に任せる。

pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod gallery;
pub mod metadata;
pub mod scanner;
pub mod thumbnail;

pub use dataset_rater_common as common;
