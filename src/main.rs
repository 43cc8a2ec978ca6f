use anyhow::{Context, Result};
use clap::Parser;
use dataset_rater::common::{relative_key, Rating, Selection};
use dataset_rater::{cli, config, gallery, scanner, thumbnail};
use cli::{Cli, Commands, ViewArgs};
use config::Config;
use gallery::Gallery;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = Config::load()?;

    match cli.command {
        Commands::List { folder, view, json } => {
            let folder = canonical(&folder)?;
            let mut gallery = open_gallery(&mut config, &folder)?;
            apply_view(&mut gallery, &folder, &view);

            if json {
                println!("{}", serde_json::to_string_pretty(gallery.view())?);
                return Ok(());
            }

            for image in gallery.view() {
                let key = relative_key(&folder, &image.path).unwrap_or_else(|| image.name.clone());
                println!(
                    "{:<3} {:>5}x{:<5} {}",
                    stars(image.rating),
                    image.width,
                    image.height,
                    key
                );
            }
            println!("\n✔ {} / {}枚を表示", gallery.view().len(), gallery.images().len());
        }

        Commands::Folders { folder } => {
            let folder = canonical(&folder)?;
            for dir in scanner::scan_folders(&folder)? {
                match relative_key(&folder, &dir) {
                    Some(key) => {
                        let depth = key.matches('/').count() + 1;
                        let name = key.rsplit('/').next().unwrap_or(&key);
                        println!("{}{}", "  ".repeat(depth), name);
                    }
                    None => println!("{}", dir.display()),
                }
            }
        }

        Commands::Rate { folder, images, rating } => {
            let folder = canonical(&folder)?;
            let rating = Rating::new(rating)?;
            let mut gallery = open_gallery(&mut config, &folder)?;

            let targets: Vec<PathBuf> = images
                .iter()
                .map(|p| if p.is_absolute() { p.clone() } else { folder.join(p) })
                .collect();
            gallery
                .set_rating_for_selection(&targets, rating)
                .context("レーティングの保存に失敗しました")?;

            for target in &targets {
                println!("✔ {} → {}", target.display(), stars(gallery.rating_of(target)));
            }
        }

        Commands::Thumbnails { folder, output, view } => {
            let folder = canonical(&folder)?;
            let mut gallery = open_gallery(&mut config, &folder)?;
            apply_view(&mut gallery, &folder, &view);

            std::fs::create_dir_all(&output)
                .with_context(|| format!("create {}", output.display()))?;

            let images = gallery.view().to_vec();
            let mut written = 0;
            for image in &images {
                let key = relative_key(&folder, &image.path).unwrap_or_else(|| image.name.clone());
                let target = thumbnail::output_path(&output, &key);
                match gallery.thumbnail(image) {
                    Ok(thumb) => {
                        if let Some(parent) = target.parent() {
                            std::fs::create_dir_all(parent)
                                .with_context(|| format!("create {}", parent.display()))?;
                        }
                        thumb
                            .save(&target)
                            .with_context(|| format!("write {}", target.display()))?;
                        written += 1;
                    }
                    Err(err) => log::warn!("{}", err),
                }
            }
            println!("✔ {}枚のサムネイルを書き出しました: {}", written, output.display());
        }

        Commands::Config { set_dataset_base, show } => {
            if let Some(base) = set_dataset_base {
                let base = canonical(&base)?;
                config.set_dataset_base_path(base)?;
                println!("✔ データセットベースを設定しました");
            }

            if show {
                println!("設定:");
                println!(
                    "  データセットベース: {}",
                    config
                        .dataset_base_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "未設定".into())
                );
                println!("  サムネイルサイズ: {}px", config.thumbnail_size);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("フォルダが見つかりません: {}", path.display()))
}

/// データセットベースが未設定なら対話的に設定する
fn ensure_dataset_base(config: &mut Config) -> Result<()> {
    if config.dataset_base_path().is_some() {
        return Ok(());
    }

    println!("データセットベースが設定されていません。");
    let input: String = dialoguer::Input::new()
        .with_prompt("データセットベースのパス")
        .interact_text()?;
    let base = canonical(Path::new(input.trim()))?;
    config.set_dataset_base_path(base)?;
    Ok(())
}

fn open_gallery(config: &mut Config, folder: &Path) -> Result<Gallery> {
    ensure_dataset_base(config)?;

    let mut gallery = Gallery::new(config.clone());
    gallery.load_dataset(folder)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("読み込み中: {}", folder.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let count = gallery.wait_for_load();
    spinner.finish_and_clear();
    let count = count?;

    log::info!("{} images loaded", count);
    Ok(gallery)
}

fn apply_view(gallery: &mut Gallery, folder: &Path, view: &ViewArgs) {
    if !view.folders.is_empty() {
        let folders = view.folders.iter().map(|f| {
            if f.is_absolute() {
                f.clone()
            } else {
                folder.join(f)
            }
        });
        gallery.filter_by_folders(Selection::only(folders));
    }

    if let (Some(width), Some(height)) = (view.min_width, view.min_height) {
        gallery.set_min_dimensions(width, height);
    } else if let Some(preset) = view.size {
        gallery.set_size_preset(preset);
    }

    if !view.ratings.is_empty() {
        let ratings = view.ratings.iter().filter_map(|&r| Rating::new(r).ok());
        gallery.set_rating_filter(Selection::only(ratings));
    }

    if let Some(mode) = view.sort {
        gallery.sort_images(mode);
    }
}

fn stars(rating: Rating) -> String {
    if rating.is_rated() {
        format!("{}★", rating)
    } else {
        "-".to_string()
    }
}
