/// Reasons an authentication claim is rejected.
///
/// Every variant is reported to the client the same way (`auth_fail` followed
/// by a close). The distinction only exists for server-side logging.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("Claim is not a JSON object: {0}")]
    Malformed(String),

    #[error("Claim type is not \"auth\"")]
    WrongType,

    #[error("Claim is missing field: {0}")]
    MissingField(&'static str),

    #[error("Claim timestamp is not numeric")]
    InvalidTimestamp,

    #[error("Claim expired: {age}s old")]
    Expired { age: f64 },

    #[error("Claim is dated {ahead}s in the future")]
    FutureDated { ahead: f64 },

    #[error("Claim token is not valid hex")]
    InvalidTokenEncoding,

    #[error("Claim signature mismatch")]
    SignatureMismatch,
}
