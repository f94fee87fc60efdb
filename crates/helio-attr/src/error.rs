//! Error types for helio-attr.

use std::fmt;

use thiserror::Error;

use crate::attr::AttrType;

/// Composition errors, raised while a tree is being built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttrError {
    #[error("mutually exclusive {ty} attributes: {left} and {right}")]
    MutualExclusion { ty: AttrType, left: String, right: String },

    #[error("xor is not defined for {0}")]
    XorUnsupported(String),
}

/// Which half of the converter was looking for a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Apply,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Create => f.write_str("create"),
            Op::Apply => f.write_str("apply"),
        }
    }
}

/// Translation errors, raised while converting a tree into blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("no {op} handler registered for {ty}")]
    Unsupported { op: Op, ty: String },
}

pub type Result<T> = std::result::Result<T, AttrError>;
