use relief_tree::TreeOp;

/// Errors surfaced by renderer construction and rendering.
///
/// Subtape pool exhaustion is deliberately absent: it is a benign fallback
/// that is counted in [`RenderStats`](crate::RenderStats) and logged once,
/// never thrown. Internal invariant violations are fatal and panic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The expression tree contains an operator outside the supported set.
    #[error("unsupported operator {op:?} at node {node}")]
    UnsupportedOpcode {
        /// The offending operator.
        op: TreeOp,
        /// Index of the offending node in the tree's topological order.
        node: usize,
    },

    /// The tape compiler would need more register slots than the clause
    /// encoding can address.
    #[error("expression needs more than {limit} register slots")]
    TooManySlots {
        /// Maximum number of addressable slots.
        limit: u32,
    },

    /// A worker stream could not be launched.
    #[error("failed to launch worker stream")]
    Device(#[from] std::io::Error),
}
