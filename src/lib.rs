//! # nl2sql-analyst Library
//!
//! Natural-language questions over a relational database: schema
//! introspection, LLM-driven SQL generation, execution and narrative
//! analysis of the results.
//!
//! The pipeline is generic over two seams, [`store::DataStore`] and
//! [`llm::TextGenerator`], so it can run against any database session and
//! any text model.

pub mod analyzer;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod sql;
pub mod store;
pub mod value;
