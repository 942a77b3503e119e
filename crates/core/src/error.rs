//! Error types for ballot-core.

use thiserror::Error;

use crate::{Hash, Identity, ProposalId, Transition};

/// Rejections of a single operation. None of them leaves partial state behind.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller lacks the administrator or voter role.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    /// Operation attempted outside its required phase.
    #[error("{operation}: {reason}")]
    PhaseViolation {
        operation: &'static str,
        reason: &'static str,
    },

    /// Phase advance requested from the wrong predecessor.
    #[error("illegal transition {transition}: {reason}")]
    IllegalTransition {
        transition: Transition,
        reason: &'static str,
    },

    /// Identity already registered.
    #[error("{0} already registered")]
    DuplicateRegistration(Identity),

    /// Empty proposal description.
    #[error("proposal description cannot be empty")]
    EmptyProposal,

    /// Voter already cast their vote.
    #[error("{0} already voted")]
    AlreadyVoted(Identity),

    /// Proposal index out of bounds.
    #[error("proposal not found: {0}")]
    NotFound(ProposalId),

    /// Signed command does not verify against its signer.
    #[error("invalid signature for {0}")]
    InvalidSignature(Identity),

    /// Signed command was already committed.
    #[error("command {0} already applied")]
    Replayed(Hash),

    /// Event log or snapshot failed an integrity check.
    #[error("integrity check failed: {0}")]
    Tampered(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`], for callers that branch on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    PhaseViolation,
    IllegalTransition,
    DuplicateRegistration,
    EmptyProposal,
    AlreadyVoted,
    NotFound,
    InvalidSignature,
    Replayed,
    Tampered,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::PhaseViolation { .. } => ErrorKind::PhaseViolation,
            Error::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Error::DuplicateRegistration(_) => ErrorKind::DuplicateRegistration,
            Error::EmptyProposal => ErrorKind::EmptyProposal,
            Error::AlreadyVoted(_) => ErrorKind::AlreadyVoted,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Error::Replayed(_) => ErrorKind::Replayed,
            Error::Tampered(_) => ErrorKind::Tampered,
            Error::Serialization(_) | Error::Io(_) => ErrorKind::Storage,
        }
    }

    /// True for rejections caused by the caller's input rather than storage.
    pub fn is_rejection(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Storage | ErrorKind::Tampered)
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}
