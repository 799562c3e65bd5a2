//! Classweave - post-compile annotation weaving for JVM class files
//!
//! This crate implements the classweave engine: it loads compiled class
//! files from build output locations, infers declarative annotations for
//! entity fields from rules in a user-supplied configuration, and writes
//! the annotated class files back in place.

pub mod annotate;
pub mod classfile;
pub mod discovery;
pub mod filter;
pub mod fingerprint;
pub mod pipeline;
pub mod source;

pub use annotate::{AnnotateError, AnnotateStats};
pub use classfile::{ClassFile, ClassFileBuilder, ClassFileError};
pub use discovery::{DiscoveryError, LoadedClass};
pub use pipeline::{RunSummary, WeaveError, WeaveResult, Weaver};
pub use source::{ConfigFactory, ConfigSourceRef, FactoryError, TomlConfigFactory};
