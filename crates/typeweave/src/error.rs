//! Errors raised while loading, converting and rendering a unit.

use crate::oracle::{NodeId, Position};
use std::fmt;
use std::path::PathBuf;

/// The unit could not be loaded or is internally inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid unit: {0}")]
    Json(#[from] serde_json::Error),

    #[error("node {from} references missing node {missing}")]
    DanglingNode { from: NodeId, missing: NodeId },

    #[error("declaration {0} is a {1} node, expected named")]
    NotNamed(NodeId, &'static str),

    #[error("type `{0}` was declared but never defined")]
    Undefined(String),

    #[error("duplicate declaration `{0}`")]
    DuplicateDeclaration(String),

    #[error("node {0} is on a cycle that passes through no named type")]
    UnnamedCycle(NodeId),
}

/// Where an invariant broke: the declaration being converted, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Site {
    pub declaration: Option<String>,
    pub position: Option<Position>,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.declaration, &self.position) {
            (Some(name), Some(pos)) => write!(f, "in `{}` ({})", name, pos),
            (Some(name), None) => write!(f, "in `{}`", name),
            (None, Some(pos)) => write!(f, "at {}", pos),
            (None, None) => f.write_str("at top level"),
        }
    }
}

/// A broken precondition of the engine itself. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum InvariantViolation {
    #[error("anonymous struct {site}: records must be named")]
    AnonymousStruct { site: Site },

    #[error("anonymous interface {site}: unions must be named")]
    AnonymousInterface { site: Site },

    #[error("union members of `{0}` queried before registration completed")]
    PrematureResolution(String),

    #[error("`{0}` registered after resolution")]
    LateRegistration(String),

    #[error("union `{union}` member `{member}` was never converted")]
    MissingMember { union: String, member: String },

    #[error("declaration `{id}` submitted twice with different content")]
    DeclarationConflict { id: String },
}

/// A declaration directive that cannot be rendered.
#[derive(Debug, thiserror::Error)]
pub enum DirectiveError {
    #[error("unknown enum constant `#{constant}` in a directive on `{declaration}`")]
    UnknownConstant {
        declaration: String,
        constant: String,
    },
}

/// Any failure of a generation run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Wire(#[from] crate::wire::WireError),

    #[error(transparent)]
    Directive(#[from] DirectiveError),
}
