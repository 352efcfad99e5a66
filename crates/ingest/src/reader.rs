use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::document::Document;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

pub struct FileReader;

impl FileReader {
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    /// Read one file; the document is named after the file name
    pub async fn read_file(path: &Path) -> Result<Document> {
        if !Self::is_supported(path) {
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            anyhow::bail!("Unsupported file format: {}", extension);
        }

        let content = fs::read_to_string(path)
            .await
            .context(format!("Failed to read file: {:?}", path))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context(format!("File has no name: {:?}", path))?;

        Ok(Document::new(name, content))
    }

    /// Read every supported file in a directory, ordered by name.
    /// Sub-directories and unsupported files are skipped.
    pub async fn read_directory(dir: &Path) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        let mut entries = fs::read_dir(dir)
            .await
            .context(format!("Failed to read directory: {:?}", dir))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.is_file() && Self::is_supported(&path) {
                documents.push(Self::read_file(&path).await?);
            } else {
                tracing::debug!(path = ?path, "Skipping unsupported entry");
            }
        }

        documents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "# B").unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join("nested.md")).unwrap();

        let docs = FileReader::read_directory(dir.path()).await.unwrap();

        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
        assert_eq!(docs[0].content, "alpha");
    }

    #[tokio::test]
    async fn test_read_file_rejects_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b").unwrap();

        assert!(FileReader::read_file(&path).await.is_err());
    }
}
