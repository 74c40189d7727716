//! # Story Corpus Core
//!
//! Pure logic for the story corpus engine: metadata models, title
//! extraction rules and the side-map, catalog assembly, path keys, the
//! tokenizer, the inverted index, and the snapshot store abstraction.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Callers load
//! tables and walk the corpus, then hand the results in.

pub mod catalog;
pub mod index;
pub mod models;
pub mod normalize;
pub mod pathmap;
pub mod rules;
pub mod store;
pub mod tokenizer;
