pub mod loaders;
pub mod question;
pub mod run;
pub mod scope;

pub use loaders::{load_converted_text, load_row_sheets};
pub use question::{
    DependencyAction, DependencyEdge, EdgeTarget, Judgment, LocalRef, Question,
    QuestionCandidate, QuestionId, QuestionType, RawDependency,
};
pub use run::{RunMetrics, RunResult, ScopeReport, ScopeStatus, Strategy};
pub use scope::{GroupingLimits, Scope, ScopeSource, SheetRow, SheetRows};
