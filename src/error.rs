use thiserror::Error;

/// Result type for fieldencryption operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the fieldencryption library
///
/// The variants form the taxonomy callers dispatch on: configuration problems
/// fail before any cipher attempt, `KeyNotFound` is recoverable by fallback
/// logic, and `KeyEncryptionUnavailable` / `BackendUnavailable` are retryable
/// at a higher level. The FPE validation variants are permanent input
/// rejections, never silent truncation or padding.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or incomplete keyset/provider configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key identifier absent from the vault
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// KEK/KMS unreachable or misconfigured
    #[error("Key encryption unavailable: {0}")]
    KeyEncryptionUnavailable(String),

    /// Secret-store backend failure, propagated unchanged by vaults
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// FPE plaintext length outside the bounds for the configured radix
    #[error("Domain validation error: {0}")]
    DomainValidation(String),

    /// FPE alphabet rejected at construction (duplicates, degenerate radix)
    /// or a plaintext symbol the alphabet does not contain
    #[error("Alphabet error: {0}")]
    AlphabetMismatch(String),

    /// FPE tweak length outside the accepted byte range
    #[error("Tweak length error: {0}")]
    TweakLength(String),

    /// AEAD tag or associated-data mismatch on decipher
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    /// Algorithm invoked outside its capability family
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Errors from cryptographic primitives outside the taxonomy above
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        // Strict config parsing: a malformed document is a configuration
        // failure, not a distinct JSON error kind.
        Error::Configuration(err.to_string())
    }
}
