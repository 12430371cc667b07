//! Video archive (`.vid`): u32 record count, then 40-byte name and u32 offset per record.
//! Sizes are implied: a record ends where the next-greater offset (or the file) ends.

use std::{
    collections::BTreeSet,
    fs,
    io::{Read, Seek},
    sync::Arc,
};

use anyhow::Context;

use crate::binary_utils::{read_fixed_name, read_u32_le, stream_len};
use crate::catalog::{ResourceKind, ResourceMedia};

use super::{
    read_record, remove_intermediate, split_name, ArchiveError, ArchiveParser, ExtractionTask,
    HandlerOutcome, Pass,
};

const NAME_WIDTH: usize = 40;
const TARGET_EXTENSION: &str = "webm";

pub(super) fn extract<R: Read + Seek>(
    parser: &ArchiveParser,
    task: &ExtractionTask,
    reader: &mut R,
    pass: &mut Pass<'_>,
) -> Result<HandlerOutcome, ArchiveError> {
    const KIND: ResourceKind = ResourceKind::Video;
    if !parser.is_required(KIND) {
        return Ok(HandlerOutcome::NotApplicable);
    }

    let count = read_u32_le(reader)?;
    let mut records = Vec::with_capacity(count.min(1 << 16) as usize);
    let mut offsets = BTreeSet::new();
    for _ in 0..count {
        let name = read_fixed_name(reader, NAME_WIDTH)?;
        let offset = u64::from(read_u32_le(reader)?);
        offsets.insert(offset);
        records.push((name, offset));
    }
    let file_len = stream_len(reader)?;
    offsets.insert(file_len);

    let subfolder = KIND.default_subfolder();
    let destination_dir = task.destination_root.join(subfolder);
    if !pass.is_estimate() {
        fs::create_dir_all(&destination_dir)?;
    }

    for (name, offset) in records {
        let (stem, _) = split_name(&name);
        if parser.need_skip(task, &stem, KIND) {
            continue;
        }
        if pass.count() {
            continue;
        }
        let Pass::Execute { queue } = pass else {
            continue;
        };

        let end = offsets
            .range(offset + 1..)
            .next()
            .copied()
            .unwrap_or(file_len);
        if end <= offset {
            log::warn!("Skipping {}: record starts past the end of the archive", name);
            continue;
        }

        let raw_path = destination_dir.join(&name);
        let main_filename = format!("{}.{}", stem, TARGET_EXTENSION);
        let out_path = destination_dir.join(&main_filename);

        let written = read_record(reader, offset, end - offset)
            .and_then(|data| Ok(fs::write(&raw_path, data)?));
        if let Err(e) = written {
            log::warn!("Skipping {}: {}", name, e);
            remove_intermediate(&raw_path);
            continue;
        }

        let media = Arc::clone(&parser.media);
        let catalog = Arc::clone(&task.catalog);
        let resource = ResourceMedia::new(KIND, &stem, subfolder, &main_filename);
        let keep_tmp = parser.settings.keep_tmp;
        queue.push_conversion(raw_path.display().to_string(), move || {
            let converted = media
                .prepare_video(&raw_path, &out_path)
                .with_context(|| format!("Failed to transcode {}", raw_path.display()))?;
            if !converted {
                log::debug!("{} left unconverted", raw_path.display());
                return Ok(());
            }
            catalog.register_resource(resource);
            if !keep_tmp {
                remove_intermediate(&raw_path);
            }
            Ok(())
        });
    }
    Ok(HandlerOutcome::Done)
}
