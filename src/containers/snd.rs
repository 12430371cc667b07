//! Sound archive (`.snd`): u32 record count, then 40-byte name, u32 offset and u32 size per
//! record. Payloads are WAV files of assorted encodings and get transcoded to PCM.

use std::{
    fs,
    io::{Read, Seek},
    sync::Arc,
};

use anyhow::Context;

use crate::binary_utils::{read_fixed_name, read_u32_le};
use crate::catalog::{ResourceKind, ResourceMedia};

use super::{
    read_record, remove_intermediate, ArchiveError, ArchiveParser, ExtractionTask,
    HandlerOutcome, Pass,
};

const NAME_WIDTH: usize = 40;

pub(super) fn extract<R: Read + Seek>(
    parser: &ArchiveParser,
    task: &ExtractionTask,
    reader: &mut R,
    pass: &mut Pass<'_>,
) -> Result<HandlerOutcome, ArchiveError> {
    const KIND: ResourceKind = ResourceKind::Sound;
    if !parser.is_required(KIND) {
        return Ok(HandlerOutcome::NotApplicable);
    }

    let count = read_u32_le(reader)?;
    let mut records = Vec::with_capacity(count.min(1 << 16) as usize);
    for _ in 0..count {
        let name = read_fixed_name(reader, NAME_WIDTH)?;
        let offset = read_u32_le(reader)?;
        let size = read_u32_le(reader)?;
        records.push((name, offset, size));
    }

    for (name, offset, size) in records {
        if parser.need_skip_known(task, &name, KIND) {
            continue;
        }
        if pass.count() {
            continue;
        }
        let Pass::Execute { queue } = pass else {
            continue;
        };

        let known = parser.registry.find(&name);
        let subfolder = known
            .map(|k| k.destination_subfolder.clone())
            .unwrap_or_else(|| KIND.default_subfolder().to_string());
        let canonical_id = known.map_or(name.as_str(), |k| k.canonical_id.as_str());
        let main_filename = format!("{}.wav", known.map_or(name.as_str(), |k| k.file_stem()));

        let tmp_path = task.destination_root.join(format!("tmp_{}.wav", name));
        let out_dir = task.destination_root.join(&subfolder);
        let out_path = out_dir.join(&main_filename);

        let written = read_record(reader, u64::from(offset), u64::from(size))
            .and_then(|data| Ok(fs::write(&tmp_path, data)?));
        if let Err(e) = written {
            log::warn!("Skipping {}: {}", name, e);
            remove_intermediate(&tmp_path);
            continue;
        }
        fs::create_dir_all(&out_dir)?;

        let media = Arc::clone(&parser.media);
        let catalog = Arc::clone(&task.catalog);
        let resource = ResourceMedia::new(KIND, canonical_id, &subfolder, &main_filename);
        let keep_tmp = parser.settings.keep_tmp;
        queue.push_conversion(tmp_path.display().to_string(), move || {
            let converted = media
                .prepare_wav(&tmp_path, &out_path)
                .with_context(|| format!("Failed to transcode {}", tmp_path.display()))?;
            if !converted {
                log::debug!("{} left unconverted", tmp_path.display());
                return Ok(());
            }
            catalog.register_resource(resource);
            if !keep_tmp {
                remove_intermediate(&tmp_path);
            }
            Ok(())
        });
    }
    Ok(HandlerOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, ResourceCatalog};
    use crate::containers::{ContainerKind, ConverterSettings};
    use crate::media::MediaConverter;
    use crate::pipeline::{RunReport, TaskQueue};
    use crate::registry::{Edition, KnownResources};
    use std::io::Cursor;
    use tempfile::TempDir;

    const REGISTRY: &str = r#"{"BUTTON": ["ui_click", "sfx/ui", "click"]}"#;

    fn snd_archive(records: &[(&str, &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(records.len() as u32).to_le_bytes());
        let mut offset = 4 + 48 * records.len();
        for (name, payload) in records {
            let mut field = [0u8; 40];
            field[..name.len()].copy_from_slice(name.as_bytes());
            data.extend_from_slice(&field);
            data.extend_from_slice(&(offset as u32).to_le_bytes());
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            offset += payload.len();
        }
        for (_, payload) in records {
            data.extend_from_slice(payload);
        }
        data
    }

    type Fixture = (TempDir, Arc<MemoryCatalog>, ExtractionTask, ArchiveParser);

    fn setup(media: MediaConverter) -> Fixture {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new());
        let task = ExtractionTask {
            kind: ContainerKind::Snd,
            source_root: dir.path().to_path_buf(),
            source_filename: None,
            destination_root: dir.path().to_path_buf(),
            catalog: catalog.clone(),
            edition: Edition::default(),
        };
        let parser = ArchiveParser::new(
            Arc::new(KnownResources::from_json_str(REGISTRY).unwrap()),
            ConverterSettings::default(),
            Arc::new(media),
        );
        (dir, catalog, task, parser)
    }

    fn execute(parser: &ArchiveParser, task: &ExtractionTask, archive: Vec<u8>) -> TaskQueue {
        let mut queue = TaskQueue::new();
        extract(
            parser,
            task,
            &mut Cursor::new(archive),
            &mut Pass::Execute { queue: &mut queue },
        )
        .unwrap();
        queue
    }

    #[test]
    fn sounds_land_in_tmp_files_until_transcoded() {
        let (dir, catalog, task, parser) = setup(MediaConverter::disabled());
        let archive = snd_archive(&[("BUTTON", b"RIFFclick"), ("horse00", b"RIFFneigh")]);

        let mut count = 0;
        let outcome = extract(
            &parser,
            &task,
            &mut Cursor::new(archive.clone()),
            &mut Pass::Estimate { count: &mut count },
        )
        .unwrap();
        assert_eq!(outcome, HandlerOutcome::Done);
        assert_eq!(count, 2);
        assert!(!dir.path().join("tmp_button.wav").exists());

        let queue = execute(&parser, &task, archive);
        assert_eq!(queue.conversion_len(), 2);
        assert_eq!(fs::read(dir.path().join("tmp_button.wav")).unwrap(), b"RIFFclick");
        assert_eq!(fs::read(dir.path().join("tmp_horse00.wav")).unwrap(), b"RIFFneigh");
        assert!(dir.path().join("sfx/ui").is_dir());

        // Nothing is registered while the transcoder is missing, so a later run retries.
        assert_eq!(queue.run(None).succeeded, 2);
        assert!(catalog.is_empty());
        assert!(dir.path().join("tmp_button.wav").exists());
    }

    #[cfg(unix)]
    #[test]
    fn transcoded_sounds_are_registered_under_the_remapped_name() {
        let (dir, catalog, task, parser) = setup(MediaConverter::with_binary("true"));
        let queue = execute(&parser, &task, snd_archive(&[("BUTTON", b"RIFFclick")]));
        assert_eq!(
            queue.run(None),
            RunReport {
                succeeded: 1,
                failed: 0,
                skipped: 0
            }
        );

        let media = catalog.get(ResourceKind::Sound, "ui_click").unwrap();
        assert_eq!(media.subdir, "sfx/ui/");
        assert_eq!(media.main_filename, "click.wav");
        assert!(!catalog.file_exists(ResourceKind::Sound, "button"));
        assert!(!dir.path().join("tmp_button.wav").exists());
    }

    #[test]
    fn canonical_id_in_catalog_skips_the_record() {
        let (dir, catalog, task, parser) = setup(MediaConverter::disabled());
        catalog.register_resource(ResourceMedia::new(
            ResourceKind::Sound,
            "ui_click",
            "sfx/ui",
            "click.wav",
        ));

        let queue = execute(&parser, &task, snd_archive(&[("BUTTON", b"RIFFclick")]));
        assert!(queue.is_empty());
        assert!(!dir.path().join("tmp_button.wav").exists());
    }

    #[test]
    fn overrunning_record_leaves_siblings_alone() {
        let (dir, _catalog, task, parser) = setup(MediaConverter::disabled());
        let mut archive = snd_archive(&[("broken", b"RIFF"), ("horse00", b"RIFFneigh")]);
        // Size field of the first record.
        archive[48..52].copy_from_slice(&10_000u32.to_le_bytes());

        let queue = execute(&parser, &task, archive);
        assert_eq!(queue.conversion_len(), 1);
        assert!(!dir.path().join("tmp_broken.wav").exists());
        assert_eq!(fs::read(dir.path().join("tmp_horse00.wav")).unwrap(), b"RIFFneigh");
    }
}
