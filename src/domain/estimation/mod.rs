pub mod alphabet;
pub mod classifier;
pub mod counter;
pub mod shrinkage;
pub mod state;
pub mod table;

pub use alphabet::{Label, OutcomeAlphabet};
pub use classifier::{ClassificationRule, Classifier, CutPoint, SignalTransform};
pub use counter::{OutcomeCount, StateCounts, TransitionCounter, TransitionCounts};
pub use shrinkage::{NormalizationPolicy, Prior, ShrinkageParams, credible_interval, shrink};
pub use state::{StateEncoder, StateKey, form_indicator};
pub use table::{OutcomeEntry, OutcomeTable, TableCell};
