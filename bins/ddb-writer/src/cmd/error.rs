use ingest_api::IngestError;

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Ingest(#[from] IngestError),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),
}
