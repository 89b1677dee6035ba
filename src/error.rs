use thiserror::Error;

use crate::bone::HumanBone;
use crate::skeleton::NodeId;

/// Errors raised while building skeletons, binding pose handles, parsing
/// settings or loading models. The per-frame update never returns one.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetargetError {
    #[error("skeleton has no node for required bone {0:?}")]
    MissingBone(HumanBone),
    #[error("rest pose of {0:?} is degenerate")]
    DegenerateRest(HumanBone),
    #[error("{0:?} does not belong to this skeleton")]
    UnknownNode(NodeId),
    #[error("{0:?} is already mapped to a node")]
    DuplicateBone(HumanBone),
    #[error("skeleton has more nodes than a node index can address")]
    TooManyNodes,
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("model load failed: {0}")]
    Load(String),
}

impl From<serde_json::Error> for RetargetError {
    fn from(e: serde_json::Error) -> Self {
        RetargetError::Settings(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RetargetError>;
