//! Capability trait abstractions at the system's seams.
//!
//! Every external collaborator is a trait: network fetch, rendered
//! fetch, AI selector generation, and template persistence. Production
//! implementations live in [`crate::fetchers`] and [`crate::ai`];
//! deterministic mocks live in [`crate::testing`].

pub mod fetcher;
pub mod generator;
pub mod renderer;
pub mod store;

pub use fetcher::{FetchedPage, Fetcher};
pub use generator::{CandidateMapping, GenerationFeedback, SelectorGenerator, StructureSummary};
pub use renderer::{RenderPool, Renderer};
pub use store::{TemplateRepository, UpsertOutcome};
