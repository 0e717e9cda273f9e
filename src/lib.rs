//! Generate a type-safe Zod client for the resources, scripts and flows of a
//! Windmill workspace.
pub mod catalog;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod context;
pub mod error;
pub mod generate;
pub mod ir;
pub mod lower;
pub mod path_de;
pub mod schema;
pub mod sections;
pub mod transform;
pub mod workspace;

pub use catalog::Catalog;
pub use error::{Error, Result};
pub use generate::{GenerateOptions, GenerationReport, SectionOutcome, generate};
