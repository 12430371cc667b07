//! Indexed-file archive (`.lod`, `.pac`).
//!
//! Header: 8 unknown bytes, u32 record count, 80 reserved bytes. Each record is a 16-byte
//! NUL-padded name followed by u32 offset, uncompressed size, unknown and compressed size.
//! A compressed size of zero means the payload is stored as is.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Seek, Write},
    path::Path,
};

use crate::binary_utils::{read_fixed_name, read_u32_le, skip};
use crate::catalog::{ResourceKind, ResourceMedia};
use crate::graphics::atlas::make_json_filename;

use super::compression::inflate_to_writer;
use super::{
    guess_kind, read_record, remove_intermediate, split_name, ArchiveError, ArchiveParser,
    ExtractionTask, HandlerOutcome, Pass, SpriteJob,
};

const NAME_WIDTH: usize = 16;
const HEADER_SKIP: i64 = 8;
const RESERVED_SKIP: i64 = 80;

/// Record whose sprite has an inconsistent frame boundary in every known release.
const BROKEN_RECORD: &str = "ovslot";

#[derive(Debug)]
struct RawRecord {
    filename: String,
    offset: u32,
    uncompressed_size: u32,
    compressed_size: u32,
}

fn read_records<R: Read + Seek>(reader: &mut R) -> Result<Vec<RawRecord>, ArchiveError> {
    skip(reader, HEADER_SKIP)?;
    let count = read_u32_le(reader)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    skip(reader, RESERVED_SKIP)?;

    let mut records = Vec::with_capacity(count.min(1 << 16) as usize);
    for _ in 0..count {
        let filename = read_fixed_name(reader, NAME_WIDTH)?;
        let offset = read_u32_le(reader)?;
        let uncompressed_size = read_u32_le(reader)?;
        let _unknown = read_u32_le(reader)?;
        let compressed_size = read_u32_le(reader)?;
        records.push(RawRecord {
            filename,
            offset,
            uncompressed_size,
            compressed_size,
        });
    }
    Ok(records)
}

/// Writes one record's payload to `path`, inflating it when it is compressed.
fn extract_record<R: Read + Seek>(
    reader: &mut R,
    record: &RawRecord,
    path: &Path,
) -> Result<(), ArchiveError> {
    let offset = u64::from(record.offset);
    if record.compressed_size > 0 {
        let packed = read_record(reader, offset, u64::from(record.compressed_size))?;
        let mut out = BufWriter::new(File::create(path)?);
        inflate_to_writer(&packed, &mut out)?;
        out.flush()?;
    } else {
        let data = read_record(reader, offset, u64::from(record.uncompressed_size))?;
        fs::write(path, data)?;
    }
    Ok(())
}

pub(super) fn extract<R: Read + Seek>(
    parser: &ArchiveParser,
    task: &ExtractionTask,
    reader: &mut R,
    pass: &mut Pass<'_>,
) -> Result<HandlerOutcome, ArchiveError> {
    let records = read_records(reader)?;
    if records.is_empty() {
        return Ok(HandlerOutcome::NotApplicable);
    }

    let tmp_dir = task.destination_root.join("tmp");
    if !pass.is_estimate() {
        fs::create_dir_all(&tmp_dir)?;
    }

    let mut extracted = Vec::new();
    for record in &records {
        let (stem, extension) = split_name(&record.filename);
        if stem == BROKEN_RECORD {
            log::debug!("Skipping known broken record {}", record.filename);
            continue;
        }
        let Some(kind) = guess_kind(&extension) else {
            log::debug!("Ignoring {}: unsupported type", record.filename);
            continue;
        };
        if parser.need_skip_known(task, &stem, kind) {
            continue;
        }
        if pass.count() {
            continue;
        }

        let tmp_path = tmp_dir.join(&record.filename);
        if let Err(e) = extract_record(reader, record, &tmp_path) {
            log::warn!("Skipping {}: {}", record.filename, e);
            remove_intermediate(&tmp_path);
            continue;
        }
        extracted.push((record.filename.clone(), stem, extension, kind));
    }

    let Pass::Execute { queue } = pass else {
        return Ok(HandlerOutcome::Done);
    };

    for (filename, stem, extension, kind) in extracted {
        let tmp_path = tmp_dir.join(&filename);
        let known = parser.registry.find(&stem);
        let subfolder = known
            .map(|k| k.destination_subfolder.clone())
            .unwrap_or_else(|| kind.default_subfolder().to_string());
        let canonical_id = known.map_or(stem.as_str(), |k| k.canonical_id.as_str());
        let file_stem = known.map_or(stem.as_str(), |k| k.file_stem());
        let destination_dir = task.destination_root.join(&subfolder);

        let main_filename = if kind == ResourceKind::Sprite {
            let main_filename = make_json_filename(file_stem);
            let directives = known
                .map(|k| k.directives_for(task.edition))
                .unwrap_or_default();
            parser.queue_sprite(
                task,
                queue,
                SpriteJob {
                    source: tmp_path,
                    destination: destination_dir.join(&main_filename),
                    directives,
                    remove_source: !parser.settings.keep_tmp,
                },
            );
            main_filename
        } else {
            let main_filename = if extension.is_empty() {
                file_stem.to_string()
            } else {
                format!("{}.{}", file_stem, extension)
            };
            let moved = fs::create_dir_all(&destination_dir)
                .and_then(|()| move_file(&tmp_path, &destination_dir.join(&main_filename)));
            if let Err(e) = moved {
                log::warn!("Could not place {}: {}", filename, e);
                continue;
            }
            main_filename
        };

        task.catalog.register_resource(ResourceMedia::new(
            kind,
            canonical_id,
            &subfolder,
            &main_filename,
        ));
    }
    Ok(HandlerOutcome::Done)
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}
