use thiserror::Error;

/// Errors from account registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("account '{0}' not found")]
    AccountNotFound(String),

    #[error("account '{0}' is inactive")]
    AccountInactive(String),

    #[error("account '{0}' already exists")]
    DuplicateAccount(String),

    #[error("account '{0}' is the default account and cannot be deleted")]
    ProtectedAccount(String),

    #[error("no active account for phone number id '{0}'")]
    Unroutable(String),

    #[error("invalid account: {0}")]
    Invalid(String),
}

/// Errors from durable store operations (used by port traits in switchboard-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("durable store timed out after {0} ms")]
    Timeout(u64),
}

/// Errors from the message store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("'{0}' does not contain a phone number")]
    InvalidPhone(String),
}

/// Errors raised while handling an inbound delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature")]
    SignatureInvalid,

    /// Body is not JSON or carries a different `object` tag. Acknowledged
    /// and ignored.
    #[error("unrelated or malformed payload: {0}")]
    MalformedPayload(String),

    #[error("failed to process webhook: {0}")]
    Processing(String),
}

/// Errors from the outbound provider capability.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider request timed out")]
    Timeout,

    #[error("{message}")]
    Rejected {
        message: String,
        raw: Option<serde_json::Value>,
    },
}

/// Errors that abort a send before the provider is contacted.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid account: {0}")]
    InvalidAccount(#[from] RegistryError),

    #[error("{0}")]
    InvalidRequest(String),
}

impl From<StoreError> for SendError {
    fn from(err: StoreError) -> Self {
        SendError::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::ProtectedAccount("main".to_string());
        assert!(err.to_string().contains("cannot be deleted"));
        assert_eq!(
            RegistryError::AccountNotFound("x".to_string()).to_string(),
            "account 'x' not found"
        );
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("no such table".to_string());
        assert_eq!(err.to_string(), "query error: no such table");
        assert!(RepositoryError::Timeout(2000).to_string().contains("2000"));
    }

    #[test]
    fn test_provider_rejection_displays_message() {
        let err = ProviderError::Rejected {
            message: "Recipient phone number not in allowed list".to_string(),
            raw: None,
        };
        assert_eq!(err.to_string(), "Recipient phone number not in allowed list");
    }

    #[test]
    fn test_send_error_from_registry() {
        let err: SendError = RegistryError::AccountInactive("old".to_string()).into();
        assert!(matches!(err, SendError::InvalidAccount(RegistryError::AccountInactive(_))));
    }
}
