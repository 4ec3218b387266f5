//! AI selector-generation implementations.

pub mod openai;

pub use openai::OpenAiGenerator;
