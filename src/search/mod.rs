//! Time-series aware hyperparameter search.

mod driver;
mod objective;
mod proposer;
mod space;
mod splitter;
mod tpe;

pub use driver::{CancelToken, SearchDriver, SearchOutcome, Trial};
pub use objective::ObjectiveEvaluator;
pub use proposer::{Proposer, RandomProposer, SearchStrategy};
pub use space::{Configuration, Domain, ParamValue, SearchSpace};
pub use splitter::{Fold, Folds, TimeOrderedSplitter};
pub use tpe::TpeProposer;
