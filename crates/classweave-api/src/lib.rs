//! Declarative configuration types for classweave.
//!
//! A project that wants its compiled classes woven depends on this crate
//! only: it describes *what* annotations the weaver should ensure are
//! present (`WeaveConfig`, `ClassFilter`, `ClassOptions`) without pulling
//! in the class-file machinery. The engine crate consumes these values
//! as an immutable rule set for one run.

mod annotation;
mod config;
mod filter;
mod options;
mod value;

pub mod names;

pub use annotation::AnnotationInfo;
pub use config::WeaveConfig;
pub use filter::ClassFilter;
pub use options::{ClassOptions, JpaOptions, ValidationOptions};
pub use value::MemberValue;
