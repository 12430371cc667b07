//! Hierarchical-data archive (`.dat` with an `HDAT` signature).
//!
//! Every record carries two names, a list of Windows-1251 strings, an optional binary blob
//! and a list of integers. Each record is written out as a small JSON document.

use std::{
    fs::{self, File},
    io::{BufWriter, Read, Write},
};

use encoding_rs::WINDOWS_1251;
use serde::Serialize;

use crate::binary_utils::{read_bytes, read_u32_le, read_u8};
use crate::catalog::{ResourceKind, ResourceMedia};

use super::{ArchiveError, ArchiveParser, ExtractionTask, HandlerOutcome, Pass};

/// `HDAT` read as a little-endian u32.
const HDAT_MAGIC: u32 = 0x5441_4448;
const SUBFOLDER: &str = "json";

#[derive(Debug, Default, PartialEq)]
struct HdatRecord {
    name: String,
    secondary_name: String,
    strings: Vec<String>,
    data: Vec<u8>,
    int_params: Vec<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HdatDocument<'a> {
    strings: &'a [String],
    int_params: &'a [u32],
    bin_data: String,
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, ArchiveError> {
    let len = read_u32_le(reader)? as usize;
    let raw = read_bytes(reader, len)?;
    let (text, _, had_errors) = WINDOWS_1251.decode(&raw);
    if had_errors {
        log::debug!("Replaced undecodable bytes in HDAT string");
    }
    Ok(text.into_owned())
}

fn read_record<R: Read>(reader: &mut R) -> Result<HdatRecord, ArchiveError> {
    let name = read_string(reader)?;
    let secondary_name = read_string(reader)?;

    let string_count = read_u32_le(reader)?;
    let strings = (0..string_count)
        .map(|_| read_string(reader))
        .collect::<Result<Vec<_>, _>>()?;

    let data = if read_u8(reader)? != 0 {
        let size = read_u32_le(reader)? as usize;
        read_bytes(reader, size)?
    } else {
        Vec::new()
    };

    let int_count = read_u32_le(reader)?;
    let int_params = (0..int_count)
        .map(|_| read_u32_le(reader))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HdatRecord {
        name,
        secondary_name,
        strings,
        data,
        int_params,
    })
}

/// Reads the whole table. `None` when the signature does not match.
fn read_records<R: Read>(reader: &mut R) -> Result<Option<Vec<HdatRecord>>, ArchiveError> {
    if read_u32_le(reader)? != HDAT_MAGIC {
        return Ok(None);
    }
    let _unknown = read_u32_le(reader)?;
    let count = read_u32_le(reader)?;
    let mut records = Vec::with_capacity(count.min(1 << 12) as usize);
    for _ in 0..count {
        records.push(read_record(reader)?);
    }
    Ok(Some(records))
}

pub(super) fn extract<R: Read>(
    parser: &ArchiveParser,
    task: &ExtractionTask,
    reader: &mut R,
    pass: &mut Pass<'_>,
) -> Result<HandlerOutcome, ArchiveError> {
    const KIND: ResourceKind = ResourceKind::Other;
    if !parser.is_required(KIND) {
        return Ok(HandlerOutcome::NotApplicable);
    }
    let Some(records) = read_records(reader)? else {
        log::debug!("No HDAT signature in {}", task.describe());
        return Ok(HandlerOutcome::NotApplicable);
    };

    let destination_dir = task.destination_root.join(SUBFOLDER);
    if !pass.is_estimate() {
        fs::create_dir_all(&destination_dir)?;
    }

    for record in &records {
        let filename = format!("{}.json", record.name);
        let path = destination_dir.join(&filename);
        if path.exists() {
            log::debug!("Skipping {}: already exists", path.display());
            continue;
        }
        if pass.count() {
            continue;
        }
        log::debug!("Writing {} ({})", path.display(), record.secondary_name);

        let document = HdatDocument {
            strings: &record.strings,
            int_params: &record.int_params,
            bin_data: hex::encode(&record.data),
        };
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush()?;

        task.catalog.register_resource(ResourceMedia::new(
            KIND,
            &record.name,
            SUBFOLDER,
            &filename,
        ));
    }
    Ok(HandlerOutcome::Done)
}
