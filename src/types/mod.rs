//! Core data types.

pub mod config;
pub mod fragment;
pub mod result;
pub mod schema;
pub mod template;

pub use config::{BatchConfig, EngineConfig, ReplacePolicy, StorePolicy, TrainerConfig};
pub use fragment::Fragment;
pub use result::{ExtractionResult, OutputFormat, TemplateUsed};
pub use schema::{FieldSchema, FieldType, CONTENT_FIELD};
pub use template::{normalize_domain, Template, TemplateStatus};
