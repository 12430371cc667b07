//! Directory tasks: music copied as is, loose `.def`/`.bmp` sprites converted one by one.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::catalog::{ResourceKind, ResourceMedia};
use crate::graphics::atlas::make_json_filename;
use crate::registry::Directives;

use super::{
    split_name, ArchiveError, ArchiveParser, ExtractionTask, HandlerOutcome, Pass, SpriteJob,
};

/// Regular files of `dir`, sorted by name so ids and queue order are stable.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn lowercase_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase())
}

pub(super) fn copy_music(
    parser: &ArchiveParser,
    task: &ExtractionTask,
    pass: &mut Pass<'_>,
) -> Result<HandlerOutcome, ArchiveError> {
    const KIND: ResourceKind = ResourceKind::Music;
    if !parser.is_required(KIND) {
        return Ok(HandlerOutcome::NotApplicable);
    }

    let subfolder = KIND.default_subfolder();
    let destination_dir = task.destination_root.join(subfolder);
    if !pass.is_estimate() {
        fs::create_dir_all(&destination_dir)?;
    }

    for source in list_files(&task.source_root)? {
        let Some(filename) = lowercase_file_name(&source) else {
            continue;
        };
        let (id, _) = split_name(&filename);
        if parser.need_skip(task, &id, KIND) {
            continue;
        }
        if pass.count() {
            continue;
        }
        match fs::copy(&source, destination_dir.join(&filename)) {
            Ok(_) => task
                .catalog
                .register_resource(ResourceMedia::new(KIND, &id, subfolder, &filename)),
            Err(e) => log::warn!("Could not copy {}: {}", source.display(), e),
        }
    }
    Ok(HandlerOutcome::Done)
}

pub(super) fn copy_sprites(
    parser: &ArchiveParser,
    task: &ExtractionTask,
    pass: &mut Pass<'_>,
) -> Result<HandlerOutcome, ArchiveError> {
    const KIND: ResourceKind = ResourceKind::Sprite;
    if !parser.is_required(KIND) {
        return Ok(HandlerOutcome::NotApplicable);
    }

    for source in list_files(&task.source_root)? {
        let Some(filename) = lowercase_file_name(&source) else {
            continue;
        };
        let (id, extension) = split_name(&filename);
        if extension != "def" && extension != "bmp" {
            continue;
        }
        if parser.need_skip(task, &id, KIND) {
            continue;
        }
        if pass.count() {
            continue;
        }
        let Pass::Execute { queue } = pass else {
            continue;
        };

        let main_filename = make_json_filename(&id);
        parser.queue_sprite(
            task,
            queue,
            SpriteJob {
                source,
                destination: task.destination_root.join(&main_filename),
                directives: Directives::new(),
                remove_source: false,
            },
        );
        task.catalog
            .register_resource(ResourceMedia::new(KIND, &id, "", &main_filename));
    }
    Ok(HandlerOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, ResourceCatalog};
    use crate::containers::{ContainerKind, ConverterSettings};
    use crate::media::MediaConverter;
    use crate::pipeline::TaskQueue;
    use crate::registry::{Edition, KnownResources};
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn parser() -> ArchiveParser {
        ArchiveParser::new(
            Arc::new(KnownResources::empty()),
            ConverterSettings::default(),
            Arc::new(MediaConverter::disabled()),
        )
    }

    fn task(
        kind: ContainerKind,
        source: &Path,
        dest: &Path,
        catalog: Arc<MemoryCatalog>,
    ) -> ExtractionTask {
        ExtractionTask {
            kind,
            source_root: source.to_path_buf(),
            source_filename: None,
            destination_root: dest.to_path_buf(),
            catalog,
            edition: Edition::default(),
        }
    }

    #[test]
    fn music_is_copied_and_registered() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(source.path().join("Combat01.MP3"), b"ID3").unwrap();
        let catalog = Arc::new(MemoryCatalog::new());
        let task = task(ContainerKind::MusicCopy, source.path(), dest.path(), catalog.clone());

        let mut count = 0;
        copy_music(&parser(), &task, &mut Pass::Estimate { count: &mut count }).unwrap();
        assert_eq!(count, 1);
        assert!(catalog.is_empty());

        let mut queue = TaskQueue::new();
        copy_music(&parser(), &task, &mut Pass::Execute { queue: &mut queue }).unwrap();
        assert_eq!(fs::read(dest.path().join("music/combat01.mp3")).unwrap(), b"ID3");
        let media = catalog.get(ResourceKind::Music, "combat01").unwrap();
        assert_eq!(media.subdir, "music/");
    }

    #[test]
    fn loose_bitmaps_become_sprites() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]))
            .save(source.path().join("Banner.bmp"))
            .unwrap();
        fs::write(source.path().join("readme.txt"), b"not a sprite").unwrap();
        let catalog = Arc::new(MemoryCatalog::new());
        let task = task(ContainerKind::SpriteCopy, source.path(), dest.path(), catalog.clone());

        let mut queue = TaskQueue::new();
        copy_sprites(&parser(), &task, &mut Pass::Execute { queue: &mut queue }).unwrap();
        assert_eq!(queue.conversion_len(), 1);
        let report = queue.run(None);
        assert_eq!(report.failed, 0);

        let sprite =
            crate::graphics::atlas::load_sprite(&dest.path().join("banner.fh.json")).unwrap();
        let frame = &sprite.group(0).unwrap().frames[0];
        assert_eq!(frame.image.dimensions(), (3, 2));
        assert_eq!(*frame.image.get_pixel(2, 1), Rgba([10, 20, 30, 255]));
        assert!(catalog.file_exists(ResourceKind::Sprite, "banner"));
    }
}
