//! Data models for Discursis entities.
//!
//! - `Project`, `ProjectStatus`: uploaded corpora and their processing state
//! - Analysis payloads: `RecurrenceModel`, `SimilarTerms`, `TermLayout`
//! - Request parameters: `ModelQuery`, `ExportKind`
//! - Account flows: `ResetTokenStatus`

pub mod account;
pub mod analysis;
pub mod project;

pub use account::ResetTokenStatus;
pub use analysis::{
    ExportKind, LayoutTerm, ModelQuery, RecurrenceModel, SimilarTerms, TermClusters, TermLayout,
};
pub use project::{Project, ProjectStatus};
