use clap::{Args, Parser, Subcommand};
use dataset_rater_common::{SizePreset, SortMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dataset-rater")]
#[command(about = "画像データセット閲覧・レーティング管理ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// データセットを読み込み、絞り込み・並べ替えた一覧を表示
    List {
        /// データセットフォルダ
        #[arg(required = true)]
        folder: PathBuf,

        #[command(flatten)]
        view: ViewArgs,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// フォルダ構成を表示
    Folders {
        /// データセットフォルダ
        #[arg(required = true)]
        folder: PathBuf,
    },

    /// 画像にレーティングを設定（0で解除）
    Rate {
        /// データセットフォルダ
        #[arg(required = true)]
        folder: PathBuf,

        /// 対象画像（フォルダからの相対パスまたは絶対パス）
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// レーティング (0-5)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=5))]
        rating: u8,
    },

    /// 一覧のサムネイル（バッジ付き）をPNGで書き出す
    Thumbnails {
        /// データセットフォルダ
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力ディレクトリ
        #[arg(short, long, required = true)]
        output: PathBuf,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// 設定を表示/編集
    Config {
        /// データセットベースを設定
        #[arg(long)]
        set_dataset_base: Option<PathBuf>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// 絞り込み・並べ替えの指定
#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// 表示するフォルダ（複数指定可、省略時はすべて）
    #[arg(long = "only-folder")]
    pub folders: Vec<PathBuf>,

    /// サイズ (any/small/medium/large)
    #[arg(long, conflicts_with_all = ["min_width", "min_height"])]
    pub size: Option<SizePreset>,

    /// 最小幅
    #[arg(long, requires = "min_height")]
    pub min_width: Option<u32>,

    /// 最小高さ
    #[arg(long, requires = "min_width")]
    pub min_height: Option<u32>,

    /// 表示するレーティング（複数指定可、0 = 未評価）
    #[arg(long = "rating", value_parser = clap::value_parser!(u8).range(0..=5))]
    pub ratings: Vec<u8>,

    /// 並べ替え (name-asc/name-desc/resolution-desc/resolution-asc)
    #[arg(long)]
    pub sort: Option<SortMode>,
}
