use serde::Serialize;

/// Pipeline stage that issues model calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Linking,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extraction => f.write_str("concept extraction"),
            Stage::Linking => f.write_str("cross-linking"),
        }
    }
}

/// Unrecovered failure of a whole run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Raised before any document is processed
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Transport or service failure of a model call
    #[error("{stage} failed for document '{document}'")]
    Stage {
        stage: Stage,
        document: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn stage(stage: Stage, failure: extract::DocumentCallError) -> Self {
        Self::Stage {
            stage,
            document: failure.document,
            source: failure.source,
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            PipelineError::Config { .. } => FailureCategory::Configuration,
            PipelineError::Stage { .. } => FailureCategory::ModelUnavailable,
        }
    }
}

/// Stable, user-facing classes of run failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Configuration,
    ModelUnavailable,
    Internal,
}

impl FailureCategory {
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureCategory::Configuration => "The service is not configured to process documents.",
            FailureCategory::ModelUnavailable => "The language model could not be reached. Please try again later.",
            FailureCategory::Internal => "Processing failed unexpectedly.",
        }
    }
}
