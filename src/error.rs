use std::io;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("invalid path '{path}': {reason}")]
    Path { path: String, reason: String },
    #[error("{0} is not valid UTF-8 text")]
    Encoding(String),
    #[error("malformed patch: {0}")]
    MalformedPatch(String),
    #[error("patch too large: {actual} {unit} exceeds the limit of {limit}")]
    PatchTooLarge {
        actual: usize,
        limit: usize,
        unit: &'static str,
    },
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error(
        "context match failed for hunk {hunk}; searched for:\n{context}\nnearest lines in file:\n{nearest}"
    )]
    ContextNotFound {
        hunk: usize,
        context: String,
        nearest: String,
    },
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl PatchError {
    pub fn path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PatchError::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        PatchError::MalformedPatch(detail.into())
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationResult {
    Result(String),
    Error(String),
}

impl OperationResult {
    pub fn is_error(&self) -> bool {
        matches!(self, OperationResult::Error(_))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| match self {
            OperationResult::Result(_) => r#"{"result":"ok"}"#.to_string(),
            OperationResult::Error(_) => r#"{"error":"unserializable error"}"#.to_string(),
        })
    }
}

impl From<Result<String, PatchError>> for OperationResult {
    fn from(value: Result<String, PatchError>) -> Self {
        match value {
            Ok(message) => OperationResult::Result(message),
            Err(err) => OperationResult::Error(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_with_result_key() {
        let outcome = OperationResult::Result("File updated: foo.txt".into());
        assert_eq!(outcome.to_json(), r#"{"result":"File updated: foo.txt"}"#);
    }

    #[test]
    fn error_serializes_with_error_key() {
        let outcome = OperationResult::from(Err(PatchError::NotFound("foo.txt".into())));
        assert_eq!(outcome.to_json(), r#"{"error":"file not found: foo.txt"}"#);
    }

    #[test]
    fn context_not_found_names_the_hunk() {
        let err = PatchError::ContextNotFound {
            hunk: 2,
            context: "let x = 1;".into(),
            nearest: "  3 | let x = 2;".into(),
        };
        let message = err.to_string();
        assert!(message.contains("hunk 2"));
        assert!(message.contains("let x = 1;"));
        assert!(message.contains("let x = 2;"));
    }
}
