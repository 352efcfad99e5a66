use extract::llm::{self, DocumentCallError, TextGenerator};
use extract::UseCase;
use futures::stream::{self, StreamExt, TryStreamExt};
use ingest::Document;
use std::sync::Arc;
use tokio::time::Instant;

/// Output budget for one linking call. A rewritten document can be as long
/// as the source plus the inserted markup.
pub const LINKING_MAX_TOKENS: u32 = 8000;

/// Rewrites documents with `[[wikilinks]]` to the deduplicated concepts.
pub struct CrossLinker {
    llm: Arc<dyn TextGenerator>,
    use_case: UseCase,
    max_tokens: u32,
    concurrency: usize,
}

impl CrossLinker {
    pub fn new(llm: Arc<dyn TextGenerator>, use_case: UseCase) -> Self {
        Self {
            llm,
            use_case,
            max_tokens: LINKING_MAX_TOKENS,
            concurrency: 1,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Link every document; output has the same names in the same order as the input
    pub async fn link_all(
        &self,
        documents: &[Document],
        concept_names: &[String],
        deadline: Option<Instant>,
    ) -> Result<Vec<Document>, DocumentCallError> {
        let calls: Vec<_> = documents
            .iter()
            .map(|document| self.link_document(document, concept_names, deadline))
            .collect();

        stream::iter(calls)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    /// Link one document. Keeps the original content when the model
    /// returns no usable text or the run deadline passes.
    pub async fn link_document(
        &self,
        document: &Document,
        concept_names: &[String],
        deadline: Option<Instant>,
    ) -> Result<Document, DocumentCallError> {
        tracing::info!(document = %document.name, "Adding wikilinks");

        let prompt = self.use_case.linking_prompt(concept_names, &document.content);
        let call = self.llm.generate(self.use_case.system_prompt(), &prompt, self.max_tokens);

        let generation = match llm::within_deadline(deadline, call).await {
            Some(result) => result.map_err(|source| DocumentCallError {
                document: document.name.clone(),
                source,
            })?,
            None => {
                tracing::warn!(document = %document.name, "Run deadline reached, keeping original content");
                return Ok(document.clone());
            }
        };

        match generation.into_text() {
            Some(text) if !text.trim().is_empty() => Ok(document.with_content(text)),
            _ => {
                tracing::warn!(document = %document.name, "Model returned no text, keeping original content");
                Ok(document.clone())
            }
        }
    }
}
