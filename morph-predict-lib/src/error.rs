use thiserror::Error;

/// Errors surfaced by the paradigm prediction pipeline.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Should be unreachable: insert/delete are always legal moves, so some
    /// path must reach the final chart cell.
    #[error("edit distance found no path for {src} -> {trg}")]
    NoAlignmentPath { src: String, trg: String },

    /// A per-position cost vector whose length disagrees with the source form.
    #[error("cost vector has length {got}, source form has length {expected}")]
    CostLengthMismatch { got: usize, expected: usize },

    /// The matcher was asked about a rule it never learned a pattern for.
    #[error("no match pattern learned for rule {0}")]
    UnknownRule(String),

    /// Prediction requested for a slot-key set different from the one the
    /// inventory was trained over.
    #[error("requested slot set does not match the trained inventory")]
    SlotSetMismatch,

    /// Two applied changes overlap or are out of order when splicing.
    #[error("bad change sequence: previous change ended at {prev_end} but next starts at {start}")]
    OverlappingChanges { prev_end: usize, start: usize },

    /// A rewrite rule applied at inflection time does not cover the requested
    /// slot set.
    #[error("rule {rule} is not defined over the requested slot set")]
    IncompleteRewrite { rule: String },

    /// Degenerate curvature in the quasi-Newton update (rho = 0).
    #[error("curvature degeneracy in L-BFGS update")]
    CurvatureDegeneracy,

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
