//! # Story Corpus
//!
//! Title resolution, path reconciliation and full-text search over an
//! extracted game story corpus.
//!
//! The corpus is a tree of `.txt` bodies plus a handful of JSON metadata
//! tables that name them. This crate joins the two: every story unit a
//! table declares gets a display title (explicit field, side-map, or file
//! name), is matched to its file regardless of casing, and is indexed for
//! substring-faithful CJK search.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Tables    │──▶│   Catalog   │──▶│  Reconcile   │
//! │ JSON/excel  │   │ titles+ids  │   │ path → body  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            ▼
//!                   ┌─────────────┐   ┌──────────────┐
//!                   │   SQLite    │◀──│  Generation  │
//!                   │  snapshot   │   │ index + ids  │
//!                   └─────────────┘   └──────┬───────┘
//!                                            ▼
//!                                     ┌──────────────┐
//!                                     │ IndexManager │──▶ CLI (story)
//!                                     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! story rebuild                 # build and persist an index generation
//! story search "枯萎"
//! story title endbook_rogue_2_1_1
//! story open Obt/Record/main_10/text_main_10_note_1
//! story status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Table, build and store error taxonomy |
//! | [`tables`] | Metadata table loading |
//! | [`corpus`] | Corpus walk into a path map |
//! | [`reconcile`] | Unit → file matching and body reading |
//! | [`generation`] | Immutable index generations and their build pipeline |
//! | [`lifecycle`] | Publishing, single-flight rebuilds, snapshot restore |
//! | [`sqlite_store`] | SQLite snapshot persistence |
//! | [`progress`] | Rebuild progress reporting |
//! | [`search`], [`get`], [`status`], [`sources`] | CLI commands |

pub mod config;
pub mod corpus;
pub mod error;
pub mod generation;
pub mod get;
pub mod lifecycle;
pub mod migrate;
pub mod progress;
pub mod reconcile;
pub mod render;
pub mod search;
pub mod sources;
pub mod sqlite_store;
pub mod status;
pub mod tables;
