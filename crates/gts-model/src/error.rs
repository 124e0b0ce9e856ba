//! Error types for gts-model

use thiserror::Error;

use crate::mesh::{ElementKind, Member};

/// Violation of a mesh model invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{entity} identifier must be positive, got 0")]
    ZeroId { entity: &'static str },

    #[error("duplicate node id {0}")]
    DuplicateNode(u32),

    #[error("duplicate element id {0}")]
    DuplicateElement(u32),

    #[error("duplicate property id {0}")]
    DuplicateProperty(u32),

    #[error("duplicate group name \"{0}\"")]
    DuplicateGroup(String),

    #[error("group name must not be empty")]
    EmptyGroupName,

    #[error("node {node} has a non-finite coordinate {value}")]
    NonFiniteCoordinate { node: u32, value: f64 },

    #[error("element {element} ({kind}) expects {expected} nodes, found {found}")]
    NodeCount {
        element: u32,
        kind: ElementKind,
        expected: usize,
        found: usize,
    },

    #[error("element {element} references missing node {node}")]
    DanglingNode { element: u32, node: u32 },

    #[error("group \"{group}\" references missing {member}")]
    DanglingMember { group: String, member: Member },

    #[error("group \"{0}\" does not exist")]
    UnknownGroup(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
