//! Archive extraction
//!
//! [`ArchiveParser`] walks a list of [`ExtractionTask`]s twice. The estimate pass only counts
//! the records that would be extracted. The execute pass writes raw records to disk,
//! registers them in the task's catalog and queues the heavy conversions on a [`TaskQueue`].

pub mod compression;

mod copy;
mod hdat;
mod lod;
mod snd;
mod vid;

use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::{self, BufReader, Read, Seek},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use thiserror::Error;

use crate::binary_utils::{read_bytes, seek_to, stream_len};
use crate::catalog::{ResourceCatalog, ResourceKind};
use crate::graphics::atlas::{load_sprite, save_sprite, SpriteSaveOptions};
use crate::graphics::legacy::load_sprite_legacy;
use crate::graphics::postprocess::{
    apply_directives, has_stage_directives, PostprocessContext, Stage,
};
use crate::media::MediaConverter;
use crate::pipeline::{JobId, TaskQueue};
use crate::registry::{Directives, Edition, KnownResources};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Lod,
    Snd,
    Vid,
    Hdat,
    /// Directory of music files copied as is.
    MusicCopy,
    /// Directory of loose `.def` / `.bmp` sprites.
    SpriteCopy,
}

impl ContainerKind {
    /// Archive kind for a file extension found in the game data folder.
    pub fn from_archive_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "lod" | "pac" => Some(ContainerKind::Lod),
            "snd" => Some(ContainerKind::Snd),
            "vid" => Some(ContainerKind::Vid),
            "dat" => Some(ContainerKind::Hdat),
            _ => None,
        }
    }
}

/// Resource kind of an embedded record, from its extension (with or without the dot).
pub fn guess_kind(extension: &str) -> Option<ResourceKind> {
    match extension.trim_start_matches('.') {
        "def" | "d32" | "pcx" | "p32" => Some(ResourceKind::Sprite),
        "wav" => Some(ResourceKind::Sound),
        "mp3" => Some(ResourceKind::Music),
        "bik" | "smk" => Some(ResourceKind::Video),
        _ => None,
    }
}

pub struct ExtractionTask {
    pub kind: ContainerKind,
    pub source_root: PathBuf,
    /// Archive file inside `source_root`; copy tasks read the whole directory instead.
    pub source_filename: Option<PathBuf>,
    pub destination_root: PathBuf,
    pub catalog: Arc<dyn ResourceCatalog>,
    pub edition: Edition,
}

impl ExtractionTask {
    fn source_path(&self) -> Option<PathBuf> {
        self.source_filename
            .as_ref()
            .map(|name| self.source_root.join(name))
    }

    fn describe(&self) -> String {
        match self.source_path() {
            Some(path) => path.display().to_string(),
            None => self.source_root.display().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub required_kinds: BTreeSet<ResourceKind>,
    pub override_existing: bool,
    /// Keep extracted intermediates after a successful conversion.
    pub keep_tmp: bool,
    pub save_options: SpriteSaveOptions,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            required_kinds: ResourceKind::ALL.into_iter().collect(),
            override_existing: false,
            keep_tmp: false,
            save_options: SpriteSaveOptions::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Inflate(#[from] compression::InflateError),
    #[error("record at {offset} with {length} bytes overruns the archive ({archive_len} bytes)")]
    OutOfBounds {
        offset: u64,
        length: u64,
        archive_len: u64,
    },
    #[error("task has no source archive")]
    MissingSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Done,
    /// Wrong signature, empty archive or kind not requested.
    NotApplicable,
}

/// Which pass a handler is running.
pub(crate) enum Pass<'a> {
    Estimate { count: &'a mut usize },
    Execute { queue: &'a mut TaskQueue },
}

impl Pass<'_> {
    fn is_estimate(&self) -> bool {
        matches!(self, Pass::Estimate { .. })
    }

    /// Counts a record in estimate mode. Returns true when the caller should stop there.
    fn count(&mut self) -> bool {
        match self {
            Pass::Estimate { count } => {
                **count += 1;
                true
            }
            Pass::Execute { .. } => false,
        }
    }
}

/// A sprite conversion queued by a handler.
pub(crate) struct SpriteJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub directives: Directives,
    pub remove_source: bool,
}

pub struct ArchiveParser {
    registry: Arc<KnownResources>,
    settings: ConverterSettings,
    media: Arc<MediaConverter>,
}

impl ArchiveParser {
    pub fn new(
        registry: Arc<KnownResources>,
        settings: ConverterSettings,
        media: Arc<MediaConverter>,
    ) -> Self {
        ArchiveParser {
            registry,
            settings,
            media,
        }
    }

    /// Counts the records the execute pass would extract. Nothing is written.
    pub fn estimate_extract_count(&self, tasks: &[ExtractionTask]) -> usize {
        let mut total = 0;
        for task in tasks {
            let mut count = 0;
            if let Err(e) = self.proceed(task, &mut Pass::Estimate { count: &mut count }) {
                log::debug!("Could not estimate {}: {}", task.describe(), e);
            }
            total += count;
        }
        total
    }

    /// Extracts every task, queueing conversions on `queue`. A failing task is logged and
    /// the remaining tasks still run.
    pub fn prepare_extract_tasks(&self, tasks: &[ExtractionTask], queue: &mut TaskQueue) {
        for task in tasks {
            match self.proceed(task, &mut Pass::Execute { queue: &mut *queue }) {
                Ok(HandlerOutcome::Done) => {}
                Ok(HandlerOutcome::NotApplicable) => {
                    log::debug!("Nothing to extract from {}", task.describe());
                }
                Err(e) => log::error!("Extraction of {} aborted: {}", task.describe(), e),
            }
        }
    }

    fn proceed(
        &self,
        task: &ExtractionTask,
        pass: &mut Pass<'_>,
    ) -> Result<HandlerOutcome, ArchiveError> {
        if !pass.is_estimate() {
            fs::create_dir_all(&task.destination_root)?;
        }

        match task.kind {
            ContainerKind::MusicCopy => return copy::copy_music(self, task, pass),
            ContainerKind::SpriteCopy => return copy::copy_sprites(self, task, pass),
            _ => {}
        }

        let path = task.source_path().ok_or(ArchiveError::MissingSource)?;
        let mut reader = BufReader::new(File::open(&path)?);
        if !pass.is_estimate() {
            log::info!("Extracting {}", path.display());
        }
        match task.kind {
            ContainerKind::Lod => lod::extract(self, task, &mut reader, pass),
            ContainerKind::Snd => snd::extract(self, task, &mut reader, pass),
            ContainerKind::Vid => vid::extract(self, task, &mut reader, pass),
            ContainerKind::Hdat => hdat::extract(self, task, &mut reader, pass),
            ContainerKind::MusicCopy | ContainerKind::SpriteCopy => {
                Ok(HandlerOutcome::NotApplicable)
            }
        }
    }

    fn is_required(&self, kind: ResourceKind) -> bool {
        self.settings.required_kinds.contains(&kind)
    }

    /// True when `id` of `kind` must not be extracted.
    fn need_skip(&self, task: &ExtractionTask, id: &str, kind: ResourceKind) -> bool {
        if !self.is_required(kind) {
            return true;
        }
        if !self.settings.override_existing && task.catalog.file_exists(kind, id) {
            log::debug!("Skipping {} '{}': already converted", kind, id);
            return true;
        }
        false
    }

    /// Skip check on both the legacy id and, if the registry remaps it, the canonical id.
    fn need_skip_known(&self, task: &ExtractionTask, legacy_id: &str, kind: ResourceKind) -> bool {
        if self.need_skip(task, legacy_id, kind) {
            return true;
        }
        self.registry
            .find(legacy_id)
            .is_some_and(|known| self.need_skip(task, &known.canonical_id, kind))
    }

    /// Queues the conversion of one sprite and, when the directives ask for it, a dependent
    /// postprocess job working on the written manifest.
    fn queue_sprite(&self, task: &ExtractionTask, queue: &mut TaskQueue, job: SpriteJob) -> JobId {
        let needs_postprocess = has_stage_directives(&job.directives, Stage::Postprocess);
        let directives = Arc::new(job.directives);
        let destination_root = task.destination_root.clone();
        let catalog = Arc::clone(&task.catalog);
        let save_options = self.settings.save_options;

        let conversion = {
            let directives = Arc::clone(&directives);
            let destination_root = destination_root.clone();
            let catalog = Arc::clone(&catalog);
            let source = job.source.clone();
            let destination = job.destination.clone();
            let remove_source = job.remove_source;
            move || -> anyhow::Result<()> {
                let sprite = load_sprite_legacy(&source)
                    .with_context(|| format!("Failed to decode {}", source.display()))?;
                let context = PostprocessContext {
                    sprite_path: &destination,
                    destination_root: &destination_root,
                    catalog: Some(catalog.as_ref()),
                    save_options,
                };
                let sprite = apply_directives(sprite, &directives, Stage::Conversion, &context)?;
                save_sprite(&sprite, &destination, &save_options)
                    .with_context(|| format!("Failed to write {}", destination.display()))?;
                if remove_source {
                    remove_intermediate(&source);
                }
                Ok(())
            }
        };
        let id = queue.push_conversion(job.source.display().to_string(), conversion);

        if needs_postprocess {
            let destination = job.destination;
            queue.push_postprocess(id, destination.display().to_string(), move || {
                let sprite = load_sprite(&destination)
                    .with_context(|| format!("Failed to reload {}", destination.display()))?;
                let context = PostprocessContext {
                    sprite_path: &destination,
                    destination_root: &destination_root,
                    catalog: Some(catalog.as_ref()),
                    save_options,
                };
                let sprite = apply_directives(sprite, &directives, Stage::Postprocess, &context)?;
                save_sprite(&sprite, &destination, &save_options)?;
                Ok(())
            });
        }
        id
    }
}

/// Reads the `length` bytes of a record at `offset`. Ranges running past the end of the
/// archive are refused before anything is allocated.
pub(crate) fn read_record<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, ArchiveError> {
    let archive_len = stream_len(reader)?;
    if offset.checked_add(length).map_or(true, |end| end > archive_len) {
        return Err(ArchiveError::OutOfBounds {
            offset,
            length,
            archive_len,
        });
    }
    seek_to(reader, offset)?;
    Ok(read_bytes(reader, length as usize)?)
}

pub(crate) fn remove_intermediate(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::debug!("Could not remove {}: {}", path.display(), e);
    }
}

/// Lowercased file stem and extension (without the dot) of a record name.
pub(crate) fn split_name(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_lowercase();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();
    (stem, extension)
}
