use serde::{Deserialize, Serialize};

/// A named concept and the documents it was found in.
///
/// `source_files` keeps first-seen order and never holds duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptRecord {
    pub name: String,
    pub description: String,
    pub source_files: Vec<String>,
}

impl ConceptRecord {
    pub fn new(name: impl Into<String>, description: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            source_files: vec![source.into()],
        }
    }

    /// Add source documents not already listed
    pub fn merge_sources<'a>(&mut self, sources: impl IntoIterator<Item = &'a String>) {
        for source in sources {
            if !self.source_files.contains(source) {
                self.source_files.push(source.clone());
            }
        }
    }
}

/// One item of the model's concept array. Profile-specific fields
/// (`level`, `type`, `prerequisites`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConcept {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub significance: Option<String>,
}

pub const NO_DESCRIPTION: &str = "No description";

impl RawConcept {
    pub fn into_record(self, source: &str) -> ConceptRecord {
        let description = [self.description, self.significance]
            .into_iter()
            .flatten()
            .find(|d| !d.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        ConceptRecord::new(self.name, description, source)
    }
}
