pub mod client;
pub mod implementation;
pub mod statefulset;
pub mod status;
pub mod svc;
#[cfg(test)]
pub(crate) mod testing;

use kube::core::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error while interacting with the kubernetes API: {0}")]
    KubeError(
        #[from]
        #[source]
        kube::Error,
    ),
    #[error("MadaraChain is missing {0}")]
    MissingObjectKey(&'static str),
    #[error("Invalid MadaraChain spec: {0}")]
    InvalidSpec(String),
}

impl Error {
    fn api_code(&self) -> Option<u16> {
        match self {
            Error::KubeError(kube::Error::Api(ErrorResponse { code, .. })) => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    /// Optimistic-concurrency failure: another writer updated the object first.
    pub fn is_conflict(&self) -> bool {
        self.api_code() == Some(409)
    }

    /// Whether retrying without a spec change can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::KubeError(_))
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} (test)"),
        reason: reason.to_string(),
        code,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_api_errors() {
        assert!(api_error(409, "Conflict").is_conflict());
        assert!(api_error(404, "NotFound").is_not_found());
        assert!(api_error(500, "InternalError").is_retryable());
        assert!(!api_error(500, "InternalError").is_conflict());
    }

    #[test]
    fn spec_errors_are_not_retryable() {
        assert!(!Error::InvalidSpec("port".into()).is_retryable());
        assert!(!Error::MissingObjectKey("namespace").is_retryable());
    }
}
