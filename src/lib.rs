//! Schema-aware natural-language to SQL translation.
//!
//! Tables are registered in a [`schema::registry::SchemaRegistry`] and
//! embedded into a [`schema::index::SchemaIndex`]. A translate call retrieves
//! candidate tables, lets a chat model pick the relevant columns, then asks it
//! for dialect-specific SQL ([`nl2sql::pipeline::Nl2SqlPipeline`]).

pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod nl2sql;
pub mod schema;
pub mod util;
pub mod vector_store;
pub mod web;

pub use error::{Nl2SqlError, Result};
