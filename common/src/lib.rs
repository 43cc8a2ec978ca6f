//! Dataset Rater Common Library
//!
//! CLIと描画側で共有される型と絞り込みロジック

pub mod error;
pub mod filter;
pub mod types;

pub use error::{Error, Result};
pub use filter::{
    apply_filters, render_list, sort_descriptors, FilterState, Selection, SizeFilter, SizePreset,
    SortMode,
};
pub use types::{relative_key, ImageDescriptor, Rating};
