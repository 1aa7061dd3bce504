// Port Layer - Interfaces for external dependencies

pub mod capabilities;
pub mod id_provider;
pub mod time_provider;

// Re-exports
pub use capabilities::{Analyzer, CapabilityError, ImageSynthesizer, TextSynthesizer};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
