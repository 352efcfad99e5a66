use std::collections::HashMap;

use crate::schema::ConceptRecord;

/// Identity key of a concept name: lowercase, surrounding whitespace trimmed
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().trim().to_string()
}

/// Merges concept records that share a normalized name.
///
/// Output order is the first-seen order of each distinct name. Merging unions
/// the source files and keeps the longest description (ties keep the earlier one).
pub struct ConceptDeduplicator {
    /// Maps normalized name -> position in `concepts`
    positions: HashMap<String, usize>,
    concepts: Vec<ConceptRecord>,
}

impl ConceptDeduplicator {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            concepts: Vec::new(),
        }
    }

    pub fn add(&mut self, record: ConceptRecord) {
        let key = normalize_name(&record.name);

        match self.positions.get(&key) {
            Some(&position) => {
                let existing = &mut self.concepts[position];
                existing.merge_sources(&record.source_files);
                if record.description.chars().count() > existing.description.chars().count() {
                    existing.description = record.description;
                }
            }
            None => {
                let mut record = record;
                // Duplicate sources in a single record collapse too
                let sources = std::mem::take(&mut record.source_files);
                record.merge_sources(&sources);

                self.positions.insert(key, self.concepts.len());
                self.concepts.push(record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn into_concepts(self) -> Vec<ConceptRecord> {
        self.concepts
    }
}

impl Default for ConceptDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<ConceptRecord> for ConceptDeduplicator {
    fn extend<I: IntoIterator<Item = ConceptRecord>>(&mut self, records: I) {
        for record in records {
            self.add(record);
        }
    }
}

/// Deduplicate a flat list of concept records
pub fn deduplicate(records: impl IntoIterator<Item = ConceptRecord>) -> Vec<ConceptRecord> {
    let mut deduplicator = ConceptDeduplicator::new();
    deduplicator.extend(records);
    deduplicator.into_concepts()
}
