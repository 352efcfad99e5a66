use extract::ConceptRecord;
use ingest::Document;

/// Name of the generated index document; the zero prefix sorts it first in a folder
pub const INDEX_FILE_NAME: &str = "00-INDEX.md";

/// Render the concept index: every concept sorted by name with its description
/// and sources, then a per-source-file concept count.
pub fn generate_index(concepts: &[ConceptRecord]) -> Document {
    let mut content = format!(
        "# Concept Index\n\n\
         This knowledge graph contains {} interconnected concepts.\n\n\
         ## All Concepts\n\n",
        concepts.len()
    );

    let mut sorted: Vec<&ConceptRecord> = concepts.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    for concept in sorted {
        content.push_str(&format!(
            "### [[{}]]\n\n{}\n\n*Found in: {}*\n\n---\n\n",
            concept.name,
            concept.description,
            concept.source_files.join(", ")
        ));
    }

    content.push_str("\n## Source Files\n\n");

    for (file, count) in source_file_counts(concepts) {
        content.push_str(&format!("- **{}**: {} concepts\n", file, count));
    }

    tracing::debug!(concepts = concepts.len(), "Generated concept index");

    Document::new(INDEX_FILE_NAME, content)
}

/// Each distinct source file, in first-seen order, with the number of concepts found in it
pub fn source_file_counts(concepts: &[ConceptRecord]) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for file in concepts.iter().flat_map(|c| c.source_files.iter()) {
        if counts.iter().any(|(seen, _)| *seen == file.as_str()) {
            continue;
        }
        let count = concepts
            .iter()
            .filter(|c| c.source_files.contains(file))
            .count();
        counts.push((file.as_str(), count));
    }

    counts
}
