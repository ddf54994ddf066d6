/// Failures of the record stores backing the identity and product services.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    Duplicate,

    #[error("storage backend failure: {0}")]
    Backend(String),
}
