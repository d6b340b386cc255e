use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("specification template {template} is referenced by {rules} rule(s) and cannot be redefined")]
    TemplateInUse { template: String, rules: usize },
    #[error("invalid compatibility rule {rule}: {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("storage backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn backend(msg: impl std::fmt::Display) -> Self {
        StoreError::Backend(anyhow::anyhow!("{msg}"))
    }
}
