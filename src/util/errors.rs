use thiserror::Error;

#[derive(Error, Debug)]
pub enum StdError {
    #[error("JsonSerializationError: {0}")]
    JsonSerializationError(#[source] serde_json::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("UnregisteredKind: {0}")]
    UnregisteredKind(String),

    #[error("OwnerReference: {0}")]
    OwnerReference(String),
}

impl StdError {
    pub fn metric_label(&self) -> String {
        match self {
            StdError::JsonSerializationError(_) => "jsonserializationerror".to_string(),
            StdError::KubeError(_) => "kubeerror".to_string(),
            StdError::MetadataMissing(_) => "metadatamissing".to_string(),
            StdError::UnregisteredKind(_) => "unregisteredkind".to_string(),
            StdError::OwnerReference(_) => "ownerreference".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Standard Error: {0}")]
    StdError(#[source] StdError),

    #[error("Build Error: {0}")]
    BuildError(#[source] StdError),

    #[error("Apply Error: {0}")]
    ApplyError(#[source] StdError),

    #[error("Status Write Error: {0}")]
    StatusWriteError(#[source] StdError),
}

impl Error {
    pub fn metric_label(&self) -> String {
        let (prefix, inner) = match self {
            Error::StdError(e) => ("stderror", e),
            Error::BuildError(e) => ("builderror", e),
            Error::ApplyError(e) => ("applyerror", e),
            Error::StatusWriteError(e) => ("statuswriteerror", e),
        };
        format!("{prefix}_{}", inner.metric_label())
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::StdError(StdError::KubeError(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_label_names_category_and_cause() {
        let e = Error::BuildError(StdError::UnregisteredKind("v1/Foo".to_string()));
        assert_eq!(e.metric_label(), "builderror_unregisteredkind");

        let e = Error::StatusWriteError(StdError::MetadataMissing("name".to_string()));
        assert_eq!(e.metric_label(), "statuswriteerror_metadatamissing");
    }

    #[test]
    fn api_errors_keep_the_server_message() {
        let e = Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        }));
        assert_eq!(e.metric_label(), "stderror_kubeerror");
        assert!(e.to_string().contains("the object has been modified"));
    }
}
