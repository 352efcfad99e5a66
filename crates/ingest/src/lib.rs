pub mod document;
pub mod reader;

pub use document::Document;
pub use reader::FileReader;

use anyhow::Result;
use std::path::Path;

/// Read a single file, or every supported file of a directory, into a batch
pub async fn ingest_path(path: &Path) -> Result<Vec<Document>> {
    if path.is_dir() {
        ingest_directory(path).await
    } else {
        Ok(vec![ingest_file(path).await?])
    }
}

pub async fn ingest_file(file_path: &Path) -> Result<Document> {
    FileReader::read_file(file_path).await
}

pub async fn ingest_directory(dir_path: &Path) -> Result<Vec<Document>> {
    let documents = FileReader::read_directory(dir_path).await?;
    tracing::info!(dir = ?dir_path, documents = documents.len(), "Ingested directory");
    Ok(documents)
}
