use std::path::PathBuf;
use thiserror::Error;

/// Failure to convert a script value into a host value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("value nesting exceeds {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("script value could not be read: {message}")]
    Unreadable { message: String },
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("script engine is not started")]
    NotStarted,

    #[error("script engine has been stopped")]
    Stopped,

    #[error("script engine is already executing")]
    Reentrant,

    #[error("{count} script handles are still alive")]
    LiveHandles { count: usize },

    #[error("uncaught exception: {message}")]
    Exception { message: String },

    #[error("module `{name}` not found")]
    ModuleNotFound { name: String },

    #[error("invalid module name `{name}`")]
    InvalidModuleName { name: String },

    #[error("`{name}` is not a module")]
    NotAModule { name: String },

    #[error("script wrapper holds no value")]
    EmptyScript,

    #[error("script file {} is empty", .path.display())]
    EmptySource { path: PathBuf },

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Js(#[from] rquickjs::Error),
}

impl BridgeError {
    /// Message suitable for rethrowing inside the script runtime.
    pub fn script_message(&self) -> String {
        match self {
            BridgeError::Exception { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
