#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotationError {
    #[error("invalid target group ARN `{0}`")]
    InvalidArn(String),

    #[error("target group ARN `{0}` has no region")]
    MissingRegion(String),

    #[error("ARN `{0}` does not name an elasticloadbalancing target group")]
    NotTargetGroup(String),
}

impl AnnotationError {
    /// Only the target-group identifier is parsed, so every annotation error
    /// belongs to that backend.
    pub fn kind(&self) -> crate::BackendKind {
        crate::BackendKind::TargetGroup
    }
}
