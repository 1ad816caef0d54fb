//! Batch pipeline.
//!
//! [`BatchOrchestrator`] discovers documents and hands each one to a
//! [`DocumentProcessor`], which runs extract → summarize → compose+send and
//! turns every failure into a [`ProcessOutcome`]. Documents are processed
//! strictly one after another, with a [`PacingPolicy`] pause in between.

pub mod batch;
pub mod document;
pub mod pacing;
pub mod processor;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchOptions, BatchOrchestrator, BatchStats, DiscoveryError, discover};
pub use document::Document;
pub use pacing::PacingPolicy;
pub use processor::{Delivery, DocumentProcessor, ProcessOutcome, SkipReason, Stage, StageError};
