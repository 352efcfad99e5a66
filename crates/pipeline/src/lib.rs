pub mod archive;
pub mod config;
pub mod error;
pub mod logging;

pub use archive::package_archive;
pub use config::AppConfig;
pub use error::{FailureCategory, PipelineError, Stage};

use extract::{ConceptExtractor, ConceptRecord, TextGenerator, UseCase};
use ingest::Document;
use link::CrossLinker;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

static WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("wikilink pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMetadata {
    pub total_concepts: usize,
    /// Wikilinks in the relinked input documents; the index document is not counted
    pub total_links: usize,
    pub processing_time_ms: u64,
}

/// Result of one run. `files` holds the relinked documents in input order
/// followed by the concept index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedOutput {
    pub files: Vec<Document>,
    pub concepts: Vec<ConceptRecord>,
    pub metadata: OutputMetadata,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub extraction_max_tokens: u32,
    pub linking_max_tokens: u32,
    pub max_concurrent_llm_calls: usize,
    pub run_deadline: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            extraction_max_tokens: config.llm.extraction_max_tokens,
            linking_max_tokens: config.llm.linking_max_tokens,
            max_concurrent_llm_calls: config.concurrency.max_concurrent_llm_calls,
            run_deadline: config.concurrency.run_deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Count `[[...]]` references across documents
pub fn count_wikilinks(files: &[Document]) -> usize {
    files
        .iter()
        .map(|file| WIKILINK.find_iter(&file.content).count())
        .sum()
}

/// Extraction -> deduplication -> cross-linking -> index, once per batch.
pub struct KnowledgeGraphPipeline {
    llm: Arc<dyn TextGenerator>,
    settings: PipelineSettings,
}

impl KnowledgeGraphPipeline {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self {
            llm,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Process a batch under the profile named by `use_case_key`
    /// (unknown keys use the research-library profile)
    pub async fn process(
        &self,
        use_case_key: &str,
        documents: &[Document],
    ) -> Result<ProcessedOutput, PipelineError> {
        self.run(UseCase::resolve(use_case_key), documents).await
    }

    pub async fn run(
        &self,
        use_case: UseCase,
        documents: &[Document],
    ) -> Result<ProcessedOutput, PipelineError> {
        let start = Instant::now();
        let deadline = self
            .settings
            .run_deadline
            .map(|limit| tokio::time::Instant::now() + limit);

        tracing::info!(
            documents = documents.len(),
            use_case = %use_case,
            "Starting knowledge graph generation"
        );

        // Step 1: Extract concepts from every document
        let extractor = ConceptExtractor::new(self.llm.clone(), use_case)
            .with_max_tokens(self.settings.extraction_max_tokens)
            .with_concurrency(self.settings.max_concurrent_llm_calls);
        let extracted = extractor
            .extract_all(documents, deadline)
            .await
            .map_err(|e| PipelineError::stage(Stage::Extraction, e))?;

        // Step 2: Merge concepts by normalized name
        let concepts = extract::deduplicate(extracted);
        tracing::info!(concepts = concepts.len(), "Deduplicated concepts");

        // Step 3: Rewrite documents with wikilinks
        let concept_names: Vec<String> = concepts.iter().map(|c| c.name.clone()).collect();
        let linker = CrossLinker::new(self.llm.clone(), use_case)
            .with_max_tokens(self.settings.linking_max_tokens)
            .with_concurrency(self.settings.max_concurrent_llm_calls);
        let mut files = linker
            .link_all(documents, &concept_names, deadline)
            .await
            .map_err(|e| PipelineError::stage(Stage::Linking, e))?;

        // Step 4: Count links before the index joins the output
        let total_links = count_wikilinks(&files);
        files.push(index::generate_index(&concepts));

        let processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            concepts = concepts.len(),
            links = total_links,
            elapsed_ms = processing_time_ms,
            "Knowledge graph generation complete"
        );

        Ok(ProcessedOutput {
            files,
            metadata: OutputMetadata {
                total_concepts: concepts.len(),
                total_links,
                processing_time_ms,
            },
            concepts,
        })
    }
}

/// Build the configured model client and process one batch.
/// A configuration error is returned before any document is touched.
pub async fn generate_knowledge_graph(
    config: &AppConfig,
    use_case_key: &str,
    documents: &[Document],
) -> Result<ProcessedOutput, PipelineError> {
    let llm = config.build_generator()?;

    KnowledgeGraphPipeline::new(llm)
        .with_settings(PipelineSettings::from(config))
        .process(use_case_key, documents)
        .await
}
