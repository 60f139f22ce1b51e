use std::error::Error;
use std::fmt;

use crate::error::Error as CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Parse,
    KindDetectionAmbiguous,
    UnsupportedOperation,
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for CoreError {}

impl From<CodecError> for CoreError {
    fn from(e: CodecError) -> Self {
        let code = match e {
            CodecError::InvalidArgument { .. } | CodecError::OutOfBounds { .. } => {
                CoreErrorCode::InvalidInput
            }
            _ => CoreErrorCode::Parse,
        };
        Self::new(code, e.to_string())
    }
}
