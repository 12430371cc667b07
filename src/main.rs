use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;

use legacy_converter::{
    catalog::{MemoryCatalog, ResourceCatalog, ResourceKind},
    containers::{ArchiveParser, ContainerKind, ConverterSettings, ExtractionTask},
    graphics::atlas::SpriteSaveOptions,
    media::MediaConverter,
    pipeline::TaskQueue,
    progress::write_progress,
    registry::{Edition, KnownResources},
};

const DEFAULT_CATALOG_NAME: &str = "catalog.json";

#[derive(Debug, Parser)]
#[command(
    name = "legacy_converter",
    version,
    about = "Convert legacy game archives into atlas sprites and media files",
    long_about = None
)]
struct Args {
    /// Game data folder holding the .lod/.pac/.snd/.vid/.dat archives
    #[arg(long)]
    source: PathBuf,
    /// Destination resource root
    #[arg(long)]
    dest: PathBuf,
    /// Known resources registry (JSON)
    #[arg(long)]
    registry: Option<PathBuf>,
    /// Resource kinds to extract, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    types: Vec<ResourceKind>,
    /// Re-extract resources already present in the catalog
    #[arg(long)]
    override_existing: bool,
    /// Keep extracted intermediate files
    #[arg(long)]
    keep_tmp: bool,
    /// Edition used to pick directive variants (sod or hota)
    #[arg(long, default_value = "sod")]
    edition: Edition,
    /// Worker threads for conversions (0 = one per core)
    #[arg(long, default_value_t = 0)]
    threads: usize,
    /// JSON progress file, rewritten as jobs complete
    #[arg(long)]
    progress: Option<PathBuf>,
    /// Catalog file (default: <dest>/catalog.json)
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Folder of music files to copy
    #[arg(long)]
    music_dir: Option<PathBuf>,
    /// Folder of loose .def/.bmp sprites to convert
    #[arg(long)]
    sprite_dir: Option<PathBuf>,
    /// Write one PNG per frame instead of an atlas
    #[arg(long)]
    split_png: bool,
    /// Optimise written PNGs with oxipng
    #[arg(long)]
    optimize_png: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let registry = match &args.registry {
        Some(path) => KnownResources::load(path)?,
        None => KnownResources::empty(),
    };

    let catalog_path = args
        .catalog
        .clone()
        .unwrap_or_else(|| args.dest.join(DEFAULT_CATALOG_NAME));
    let catalog = Arc::new(
        MemoryCatalog::load(&catalog_path)
            .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?,
    );

    let settings = ConverterSettings {
        required_kinds: if args.types.is_empty() {
            ResourceKind::ALL.into_iter().collect()
        } else {
            args.types.iter().copied().collect()
        },
        override_existing: args.override_existing,
        keep_tmp: args.keep_tmp,
        save_options: SpriteSaveOptions {
            split_into_png_files: args.split_png,
            optimize_png: args.optimize_png,
            ..SpriteSaveOptions::default()
        },
    };

    let tasks = collect_tasks(&args, catalog.clone())?;
    if tasks.is_empty() {
        log::warn!("No archives found in {}", args.source.display());
    }

    let parser = ArchiveParser::new(Arc::new(registry), settings, Arc::new(MediaConverter::new()));

    let estimate = parser.estimate_extract_count(&tasks);
    log::info!("{} resources to extract from {} archives", estimate, tasks.len());
    if let Some(path) = &args.progress {
        write_progress(path, 0, estimate, "extract", "scanning");
    }

    fs::create_dir_all(&args.dest)
        .with_context(|| format!("Failed to create {}", args.dest.display()))?;
    let mut queue = TaskQueue::new();
    parser.prepare_extract_tasks(&tasks, &mut queue);
    log::info!(
        "Queued {} conversions and {} postprocess jobs",
        queue.conversion_len(),
        queue.postprocess_len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build()
        .context("Failed to start worker pool")?;
    let progress = args.progress.as_deref();
    let report = pool.install(|| queue.run(progress));

    catalog
        .save(&catalog_path)
        .with_context(|| format!("Failed to save catalog {}", catalog_path.display()))?;
    log::info!(
        "Catalog holds {} resources, written to {}",
        catalog.len(),
        catalog_path.display()
    );
    if report.failed > 0 {
        log::warn!("{} jobs failed, see the log above", report.failed);
    }
    Ok(())
}

/// One task per recognised archive in the source folder, plus the optional directory tasks.
fn collect_tasks(args: &Args, catalog: Arc<MemoryCatalog>) -> Result<Vec<ExtractionTask>> {
    let catalog: Arc<dyn ResourceCatalog> = catalog;
    let task = |kind, root: &Path, filename: Option<PathBuf>| ExtractionTask {
        kind,
        source_root: root.to_path_buf(),
        source_filename: filename,
        destination_root: args.dest.clone(),
        catalog: Arc::clone(&catalog),
        edition: args.edition,
    };

    let mut archives = Vec::new();
    for entry in fs::read_dir(&args.source)
        .with_context(|| format!("Failed to read {}", args.source.display()))?
    {
        let path = entry?.path();
        let kind = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ContainerKind::from_archive_extension);
        if let (Some(kind), Some(name)) = (kind, path.file_name()) {
            archives.push((kind, PathBuf::from(name)));
        }
    }
    archives.sort_by(|a, b| a.1.cmp(&b.1));

    let mut tasks: Vec<ExtractionTask> = archives
        .into_iter()
        .map(|(kind, name)| task(kind, &args.source, Some(name)))
        .collect();
    if let Some(dir) = &args.music_dir {
        tasks.push(task(ContainerKind::MusicCopy, dir, None));
    }
    if let Some(dir) = &args.sprite_dir {
        tasks.push(task(ContainerKind::SpriteCopy, dir, None));
    }
    Ok(tasks)
}
