#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config ({field}): {detail}")]
    Config { field: &'static str, detail: String },
}

impl PipelineError {
    pub(crate) fn config(field: &'static str, detail: impl Into<String>) -> Self {
        Self::Config { field, detail: detail.into() }
    }
}
