pub mod align;
pub mod analysis;
pub mod change;
pub mod corpus;
pub mod error;
pub mod features;
pub mod inventory;
pub mod joint;
pub mod lattice;
pub mod opt;
pub mod paradigm;
pub mod pattern;
pub mod span;
pub mod types;

pub use align::{align, EditCosts};
pub use analysis::{AlignmentMode, AnalyzedParadigm};
pub use change::{AnchoredChange, MorphChange};
pub use corpus::CorpusFormat;
pub use error::ModelError;
pub use inventory::ChangeInventory;
pub use joint::{JointConfig, JointModel, Prediction};
pub use paradigm::{EvalSummary, ParadigmInstance};
pub use types::{Alignment, Attributes, Form, Operation, Symbol};
