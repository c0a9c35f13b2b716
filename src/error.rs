use thiserror::Error;

/// Everything the engine can fail with. Parsing and catalogue lookups are
/// recoverable by the immediate caller; the generation-level variants abort
/// a whole generation attempt and leave prior state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("could not parse note: {0:?}")]
    ParseNote(String),

    #[error("could not find root for chord name: {0:?}")]
    UnknownChord(String),

    #[error("no {root} frettings catalogued for suffix {suffix:?}")]
    NotFound { root: String, suffix: String },

    #[error("flavour {flavour:?} left no candidate chords")]
    EmptyCandidateSet { flavour: String },

    #[error("no compatible key found after {attempts} attempts")]
    NoCompatibleKey { attempts: usize },

    #[error("key {key:?} is not compatible with the leading chord")]
    KeyMismatch { key: String },

    #[error("no sequence entry {index} (length is {len})")]
    NoSuchEntry { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
