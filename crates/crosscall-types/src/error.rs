use thiserror::Error;

use crate::FfiType;

/// Errors surfaced by registration, dispatch, and chunked execution.
///
/// Registration-time failures (`TypeMismatch`, `DuplicateMethod`) abort module
/// construction. Dispatch-time failures are returned to the caller as a single
/// error; a failure inside any slice of a chunked batch aborts the whole batch
/// with no partial results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FfiError {
    #[error("unsupported type tag: {tag}")]
    UnsupportedType { tag: String },

    #[error("type mismatch in `{method}`: expected {expected}, found {found}")]
    TypeMismatch {
        method: String,
        expected: String,
        found: String,
    },

    #[error("duplicate method `{method}` in module `{module}`")]
    DuplicateMethod { module: String, method: String },

    #[error("method `{method}` not found in module `{module}`")]
    MethodNotFound { module: String, method: String },

    #[error("no dispatch entry for type tag `{tag}` in call to `{method}`")]
    UnhandledTypeTag { method: String, tag: FfiType },

    #[error("unknown execution strategy `{name}`")]
    UnknownExecutionStrategy { name: String },

    #[error("execution strategy `{name}` is not available in this build")]
    StrategyUnavailable { name: String },

    #[error("invalid module handle for `{name}`")]
    InvalidHandle { name: String },

    #[error("unknown parameter `{name}` in call to `{method}`")]
    UnknownParameter { method: String, name: String },

    #[error("`{method}` failed: {message}")]
    CallableFailure { method: String, message: String },
}
