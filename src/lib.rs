//! # seo-meta
//!
//! Batch SEO metadata writer: stamp one author, copyright, title, description
//! and keyword list into many JPEG, PNG and TIFF files at once, on a bounded
//! pool of workers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seo_meta::config::Config;
//! use seo_meta::metadata::RustBackend;
//! use seo_meta::pipeline::{discover, run};
//! use seo_meta::report::LogReporter;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Metadata, inputs and run options all come from one JSON file
//!     let config = Config::load("seo-meta.json".as_ref())?;
//!     let record = config.metadata_record()?;
//!
//!     let files = discover(&config.inputs, config.recursive);
//!     let summary = run(
//!         files,
//!         record,
//!         config.run_options(),
//!         Arc::new(RustBackend::new()),
//!         &LogReporter,
//!     )
//!     .await;
//!
//!     println!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Write Strategy |
//! |--------|---------------|
//! | JPEG (`.jpg`, `.jpeg`) | EXIF IFD0: XPTitle, XPComment, XPAuthor, XPKeywords |
//! | TIFF (`.tif`, `.tiff`) | Same XP tags, merged into IFD0 |
//! | PNG (`.png`) | iTXt chunks: Title, Description, Author, Copyright, Keywords |
//! | WebP (`.webp`) | Re-saved without metadata |
//!
//! The format is detected from the file content, not the extension. Every
//! written file is a fresh encode, so previous metadata is dropped.
//!
//! ## Modules
//!
//! - [`config`] — JSON config, the validated [`config::MetadataRecord`] and run options
//! - [`metadata`] — text encoding and the per-format writer
//! - [`pipeline`] — file discovery and the batch coordinator
//! - [`report`] — run events and the reporter that logs them

pub mod config;
pub mod metadata;
pub mod pipeline;
pub mod report;
