pub mod clients;
pub mod confidence_batcher;
pub mod dependency_resolver;
pub mod follow_up;
pub mod identity_assigner;
pub mod lexicon;
pub mod llm_service;
pub mod response_parser;
pub mod row_grouper;
pub mod scope_chunker;

pub use clients::{Evaluation, ExtractionClient, ScoringClient, ScoringItem};
pub use confidence_batcher::{BatchStats, ConfidenceBatcher};
pub use dependency_resolver::DependencyResolver;
pub use follow_up::{apply_heuristic, DependencyHeuristic, FollowUpDetector};
pub use identity_assigner::{IdentityAssigner, PendingQuestion, RefMap};
pub use llm_service::LlmService;
pub use response_parser::{Grammar, ParseOutcome, ResponseParser};
pub use row_grouper::RowGrouper;
pub use scope_chunker::ScopeChunker;
