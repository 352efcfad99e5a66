pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use llm::{AnthropicClient, DocumentCallError, Generation, OllamaClient, TextGenerator};
pub use normalizer::{deduplicate, normalize_name, ConceptDeduplicator};
pub use prompt::UseCase;
pub use schema::{ConceptRecord, RawConcept};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use ingest::Document;
use std::sync::Arc;
use tokio::time::Instant;

/// Output budget for one extraction call
pub const EXTRACTION_MAX_TOKENS: u32 = 4000;

/// Remove a surrounding code fence (with or without a language tag) from a model response
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();

    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[start + 3..];
    let tag_len = after_fence
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after_fence.len());
    let body = &after_fence[tag_len..];

    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parse the model's JSON concept array into records sourced from `source`.
/// Unfenced text is parsed as-is first; the fenced block is the fallback.
pub fn parse_concepts(response: &str, source: &str) -> Result<Vec<ConceptRecord>> {
    let trimmed = response.trim();

    let direct = if trimmed.starts_with("```") {
        None
    } else {
        serde_json::from_str::<Vec<RawConcept>>(trimmed).ok()
    };

    let raw = match direct {
        Some(raw) => raw,
        None => serde_json::from_str::<Vec<RawConcept>>(strip_code_fences(trimmed))
            .context("Failed to parse concept array")?,
    };

    Ok(raw.into_iter().map(|concept| concept.into_record(source)).collect())
}

/// Extracts concept records from documents, one model call per document.
pub struct ConceptExtractor {
    llm: Arc<dyn TextGenerator>,
    use_case: UseCase,
    max_tokens: u32,
    concurrency: usize,
}

impl ConceptExtractor {
    pub fn new(llm: Arc<dyn TextGenerator>, use_case: UseCase) -> Self {
        Self {
            llm,
            use_case,
            max_tokens: EXTRACTION_MAX_TOKENS,
            concurrency: 1,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Number of documents whose model calls may be in flight at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Extract from every document. Records come back in document order,
    /// then in the order the model listed them.
    ///
    /// A malformed response drops that document's concepts; a transport
    /// failure aborts with the failing document's name.
    pub async fn extract_all(
        &self,
        documents: &[Document],
        deadline: Option<Instant>,
    ) -> Result<Vec<ConceptRecord>, DocumentCallError> {
        let calls: Vec<_> = documents
            .iter()
            .map(|document| self.extract_document(document, deadline))
            .collect();

        let per_document: Vec<Vec<ConceptRecord>> = stream::iter(calls)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(per_document.into_iter().flatten().collect())
    }

    /// Extract concepts from a single document
    pub async fn extract_document(
        &self,
        document: &Document,
        deadline: Option<Instant>,
    ) -> Result<Vec<ConceptRecord>, DocumentCallError> {
        tracing::info!(document = %document.name, "Extracting concepts");

        let prompt = self.use_case.extraction_prompt(&document.content);
        let call = self.llm.generate(self.use_case.system_prompt(), &prompt, self.max_tokens);

        let generation = match llm::within_deadline(deadline, call).await {
            Some(result) => result.map_err(|source| DocumentCallError {
                document: document.name.clone(),
                source,
            })?,
            None => {
                tracing::warn!(document = %document.name, "Run deadline reached before extraction finished");
                return Ok(Vec::new());
            }
        };

        let response = generation.into_text().unwrap_or_default();

        match parse_concepts(&response, &document.name) {
            Ok(concepts) => {
                tracing::debug!(document = %document.name, concepts = concepts.len(), "Parsed concepts");
                Ok(concepts)
            }
            Err(e) => {
                tracing::warn!(
                    document = %document.name,
                    error = %e,
                    response = %llm::preview(&response),
                    "Failed to parse concepts, skipping document"
                );
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Answers with a canned response chosen by a marker found in the prompt
    struct StubLlm {
        responses: HashMap<&'static str, Generation>,
    }

    #[async_trait]
    impl TextGenerator for StubLlm {
        async fn generate(&self, _system: &str, prompt: &str, _max_tokens: u32) -> Result<Generation> {
            for (marker, generation) in &self.responses {
                if prompt.contains(marker) {
                    return Ok(generation.clone());
                }
            }
            anyhow::bail!("connection refused")
        }
    }

    fn stub(responses: Vec<(&'static str, Generation)>) -> Arc<dyn TextGenerator> {
        Arc::new(StubLlm {
            responses: responses.into_iter().collect(),
        })
    }

    fn text(s: &str) -> Generation {
        Generation::Text(s.to_string())
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("[1]"), "[1]");
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fences("  ```JSON\n[1]```"), "[1]");
        assert_eq!(strip_code_fences("Here you go:\n```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```[1]```"), "[1]");
    }

    #[test]
    fn test_parse_concepts_fields() {
        let response = r#"```json
[
  {"name": "Neural Networks", "description": "A computing paradigm.", "significance": "Core"},
  {"name": "Backpropagation", "significance": "Trains networks"},
  {"name": "Gradient", "description": "", "level": "advanced"},
  {"name": "Loss", "type": "topic"}
]
```"#;

        let concepts = parse_concepts(response, "a.txt").unwrap();

        assert_eq!(concepts.len(), 4);
        assert_eq!(concepts[0].name, "Neural Networks");
        assert_eq!(concepts[0].description, "A computing paradigm.");
        assert_eq!(concepts[1].description, "Trains networks");
        assert_eq!(concepts[2].description, "No description");
        assert_eq!(concepts[3].description, "No description");
        assert!(concepts.iter().all(|c| c.source_files == vec!["a.txt"]));
    }

    #[test]
    fn test_parse_concepts_unfenced_with_fence_in_description() {
        let response = r#"[{"name":"Code Fence","description":"Wrap code in ``` markers"}]"#;

        let concepts = parse_concepts(response, "a.md").unwrap();

        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[0].description, "Wrap code in ``` markers");
    }

    #[test]
    fn test_parse_concepts_preamble_before_fence() {
        let response = "Here you go:\n```json\n[{\"name\": \"Alpha\"}]\n```";

        let concepts = parse_concepts(response, "a.md").unwrap();
        assert_eq!(concepts[0].name, "Alpha");
    }

    #[test]
    fn test_parse_concepts_keeps_name_verbatim() {
        let concepts = parse_concepts(r#"[{"name": "  spaced Name "}]"#, "a.txt").unwrap();
        assert_eq!(concepts[0].name, "  spaced Name ");
    }

    #[test]
    fn test_parse_concepts_rejects_malformed() {
        assert!(parse_concepts("not json", "a.txt").is_err());
        assert!(parse_concepts(r#"{"name": "x"}"#, "a.txt").is_err());
        assert!(parse_concepts(r#"[{"description": "no name"}]"#, "a.txt").is_err());
        assert!(parse_concepts("", "a.txt").is_err());
    }

    #[tokio::test]
    async fn test_malformed_document_contributes_nothing() {
        let llm = stub(vec![
            ("ALPHA", text(r#"[{"name": "Alpha", "description": "first"}]"#)),
            ("BRAVO", text("not json")),
            ("CHARLIE", text(r#"[{"name": "Charlie", "description": "third"}, {"name": "Delta"}]"#)),
        ]);
        let extractor = ConceptExtractor::new(llm, UseCase::ResearchLibrary);

        let documents = vec![
            Document::new("a.md", "ALPHA"),
            Document::new("b.md", "BRAVO"),
            Document::new("c.md", "CHARLIE"),
        ];

        let concepts = extractor.extract_all(&documents, None).await.unwrap();

        let names: Vec<&str> = concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Charlie", "Delta"]);
        assert_eq!(concepts[0].source_files, vec!["a.md"]);
        assert_eq!(concepts[2].source_files, vec!["c.md"]);
    }

    #[tokio::test]
    async fn test_non_text_response_contributes_nothing() {
        let llm = stub(vec![("ALPHA", Generation::NonText)]);
        let extractor = ConceptExtractor::new(llm, UseCase::ProjectDocs);

        let concepts = extractor
            .extract_all(&[Document::new("a.md", "ALPHA")], None)
            .await
            .unwrap();

        assert!(concepts.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_extraction_keeps_document_order() {
        let llm = stub(vec![
            ("ONE", text(r#"[{"name": "One"}]"#)),
            ("TWO", text(r#"[{"name": "Two"}]"#)),
            ("THREE", text(r#"[{"name": "Three"}]"#)),
        ]);
        let extractor = ConceptExtractor::new(llm, UseCase::CourseMaterial).with_concurrency(3);

        let documents = vec![
            Document::new("1.md", "ONE"),
            Document::new("2.md", "TWO"),
            Document::new("3.md", "THREE"),
        ];

        let concepts = extractor.extract_all(&documents, None).await.unwrap();
        let names: Vec<&str> = concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Two", "Three"]);
    }

    #[tokio::test]
    async fn test_transport_failure_names_document() {
        let llm = stub(vec![("ALPHA", text("[]"))]);
        let extractor = ConceptExtractor::new(llm, UseCase::MeetingNotes);

        let documents = vec![
            Document::new("a.md", "ALPHA"),
            Document::new("broken.md", "unreachable"),
        ];

        let err = extractor.extract_all(&documents, None).await.unwrap_err();
        assert_eq!(err.document, "broken.md");
        assert!(err.source.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_elapsed_deadline_yields_no_concepts() {
        struct SlowLlm;

        #[async_trait]
        impl TextGenerator for SlowLlm {
            async fn generate(&self, _: &str, _: &str, _: u32) -> Result<Generation> {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Ok(Generation::Text(r#"[{"name": "Late"}]"#.to_string()))
            }
        }

        let extractor = ConceptExtractor::new(Arc::new(SlowLlm), UseCase::ResearchLibrary);
        let concepts = extractor
            .extract_all(&[Document::new("a.md", "text")], Some(Instant::now()))
            .await
            .unwrap();

        assert!(concepts.is_empty());
    }
}
