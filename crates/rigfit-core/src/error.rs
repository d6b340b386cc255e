use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown specification data type: {0}")]
    UnknownDataType(String),
    #[error("unknown compatibility rule type: {0}")]
    UnknownRuleType(String),
    #[error("value {value:?} rejected by specification template {template}: {reason}")]
    ValueRejected {
        template: String,
        value: String,
        reason: String,
    },
}
