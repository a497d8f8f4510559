//! srctag: tag source files by their history
//!
//! Collect commit, file and issue relations from a git repository, score
//! files against free-text tags through a nearest-neighbor index, and widen a
//! set of changed files to everything that shares an issue with them.
//!
//! # Pipeline
//! - [`collector`] walks history into a [`facts::FactStore`] and builds a
//!   [`graph::RelationGraph`] of files, commits and issues
//! - [`propagate`] expands a diff seed set over shared issues to a fixpoint
//! - [`index`] turns facts into documents; [`tagger`] queries them per tag and
//!   ranks the accumulated scores into a [`model::TagResult`]
//! - [`visualization`] renders graphs and results as DOT
//!
//! # Quickstart (Library)
//! ```no_run
//! use srctag::collector::{Collector, CollectorConfig};
//! use srctag::index::storage::Storage;
//! use srctag::tagger::{Tagger, TaggerConfig};
//!
//! let collector = Collector::new(CollectorConfig::default()).expect("valid config");
//! let repo = collector.open_repo().expect("git repository");
//! let collection = collector.collect(&repo).expect("collect");
//!
//! let storage = Storage::default();
//! let mut index = storage.open_index().expect("index");
//! storage.embed(&collection.facts, &collection.graph, &mut index);
//!
//! let config = TaggerConfig { tags: vec!["caching".into()], ..Default::default() };
//! let run = Tagger::new(config).expect("valid config").tag(&index, collection.graph);
//! for (file, score) in run.result.top_n_files("caching", 5) {
//!     println!("{file}: {score:.3}");
//! }
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! srctag graph --path . --json graph.json
//! srctag tag --path . --tags caching,parser --csv tags.csv
//! srctag diff --path . --base HEAD~3 --batch 2
//! srctag show --csv tags.csv --tag caching --top 5
//! ```
pub mod app;
pub mod cli;
pub mod collector;
pub mod errors;
pub mod facts;
pub mod graph;
pub mod index;
pub mod model;
pub mod propagate;
pub mod tagger;
pub mod utils;
pub mod visualization;
