use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("envelope missing required field `{0}`")]
    MissingField(&'static str),
}
