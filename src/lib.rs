//! PDF Summary Mailer
//!
//! Batch-processes PDF documents: extracts their text, summarizes it with a
//! chat completion backend, and emails the summary with the original file
//! attached.
//!
//! # Architecture
//!
//! - **Extraction**: [`file_processing::TextExtractor`] with a lopdf backend
//! - **Summarization**: [`llm::Summarizer`] over the Chat Completions API
//! - **Mail**: HTML report rendering, MIME composition and SMTP delivery
//! - **Pipeline**: per-document state machine and a sequential, paced batch loop
//!
//! # Modules
//!
//! - [`config`]: CLI arguments and layered configuration
//! - [`file_processing`]: text extraction backends
//! - [`llm`]: summarization client
//! - [`mail`]: report rendering, message composition, SMTP transport
//! - [`pipeline`]: document processor and batch orchestrator
//! - [`app`]: wiring from configuration to a run

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod app;
pub mod config;
pub mod file_processing;
pub mod llm;
pub mod mail;
pub mod pipeline;
