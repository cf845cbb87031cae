use thiserror::Error;

/// Errors surfaced while assembling or driving a network.
///
/// Configuration problems are caught during initialization, before any
/// arc is materialized; shape problems are caught at the call that
/// supplies the offending vector.
#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate layer name `{name}`")]
    DuplicateLayer { name: String },

    #[error("unknown layer `{name}` referenced by {context}")]
    UnknownLayer { name: String, context: String },

    #[error("link #{index} has no {side} layer")]
    UnboundLink { index: usize, side: &'static str },

    #[error("link #{index} arc pair {pair:?} is outside layer sizes {pre_size}x{post_size}")]
    ArcIndexOutOfRange {
        index: usize,
        pair: (usize, usize),
        pre_size: usize,
        post_size: usize,
    },

    #[error("expected {expected} input values, got {got}")]
    InputShape { expected: usize, got: usize },

    #[error("expected {expected} target values, got {got}")]
    TargetShape { expected: usize, got: usize },
}

pub type Result<T> = core::result::Result<T, Error>;
