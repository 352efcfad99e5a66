use anyhow::{Context, Result};
use ingest::Document;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::OutputMetadata;

pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Zip every output file under its exact name, plus the run metadata
pub fn package_archive(files: &[Document], metadata: &OutputMetadata) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        writer
            .start_file(file.name.as_str(), options)
            .context(format!("Failed to add {} to archive", file.name))?;
        writer.write_all(file.content.as_bytes())?;
    }

    let metadata_json = serde_json::to_string_pretty(metadata)?;
    writer
        .start_file(METADATA_FILE_NAME, options)
        .context("Failed to add metadata to archive")?;
    writer.write_all(metadata_json.as_bytes())?;

    let cursor = writer.finish().context("Failed to finish archive")?;
    Ok(cursor.into_inner())
}
