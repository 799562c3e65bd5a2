//! Configuration source resolution.
//!
//! The active configuration comes from the user project itself: exactly one
//! static, parameterless method across all loaded classes must carry the
//! config-source marker. Discovery of that method is the engine's job; how
//! its value is produced is behind the narrow [`ConfigFactory`] seam (a
//! JVM runtime would reflectively invoke the method; the CLI loads a
//! declarative rendition of it from a TOML file).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use classweave_api::{names, WeaveConfig};

use crate::classfile::ClassFileError;
use crate::discovery::LoadedClass;

/// Errors during config-source discovery.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(
        "there must be a single static zero-argument method annotated with \
         {marker}, but found {count}",
        marker = names::CONFIG_SOURCE
    )]
    Misconfiguration { count: usize },

    #[error(transparent)]
    ClassFile(#[from] ClassFileError),
}

/// Errors from a [`ConfigFactory`] producing the configuration value.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("config factory failed: {0}")]
    Other(String),
}

/// The single discovered configuration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSourceRef {
    /// Qualified name of the declaring class.
    pub class_name: String,
    /// Name of the marked static method.
    pub method_name: String,
    /// The method's descriptor, always of the form `()…`.
    pub descriptor: String,
}

/// Produces the active configuration for the discovered source.
///
/// This is the explicit, typed stand-in for the host runtime's reflective
/// call: the engine hands over the one method it found and gets back the
/// configuration value.
pub trait ConfigFactory {
    fn produce(&self, source: &ConfigSourceRef) -> Result<WeaveConfig, FactoryError>;
}

impl<F> ConfigFactory for F
where
    F: Fn(&ConfigSourceRef) -> Result<WeaveConfig, FactoryError>,
{
    fn produce(&self, source: &ConfigSourceRef) -> Result<WeaveConfig, FactoryError> {
        self(source)
    }
}

/// Loads the configuration from a TOML rendition of [`WeaveConfig`].
///
/// Used by the CLI adapter, which cannot execute JVM bytecode.
pub struct TomlConfigFactory {
    path: PathBuf,
}

impl TomlConfigFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TomlConfigFactory { path: path.into() }
    }
}

impl ConfigFactory for TomlConfigFactory {
    fn produce(&self, source: &ConfigSourceRef) -> Result<WeaveConfig, FactoryError> {
        info!(
            source = %format!("{}.{}()", source.class_name, source.method_name),
            config = %self.path.display(),
            "loading configuration"
        );
        let text = fs::read_to_string(&self.path).map_err(|source| FactoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| FactoryError::Parse {
            path: self.path.clone(),
            source: Box::new(source),
        })
    }
}

/// Scans all loaded classes for the single config-source method.
///
/// A candidate is any method carrying the config-source marker in either
/// annotation channel that is static and takes no parameters. Zero or more
/// than one candidate across the whole set fails with
/// [`SourceError::Misconfiguration`].
pub fn find_config_source(classes: &[LoadedClass]) -> Result<ConfigSourceRef, SourceError> {
    let mut candidates = Vec::new();
    for loaded in classes {
        let class = &loaded.class_file;
        for method in &class.methods {
            if !class.has_method_annotation(method, names::CONFIG_SOURCE)? {
                continue;
            }
            if !method.is_static() || !is_zero_arg(class.method_descriptor(method)?) {
                continue;
            }
            candidates.push(ConfigSourceRef {
                class_name: class.class_name()?,
                method_name: class.method_name(method)?.to_string(),
                descriptor: class.method_descriptor(method)?.to_string(),
            });
        }
    }
    if candidates.len() != 1 {
        return Err(SourceError::Misconfiguration {
            count: candidates.len(),
        });
    }
    let source = candidates.remove(0);
    info!(
        class = %source.class_name,
        method = %source.method_name,
        "found configuration source"
    );
    Ok(source)
}

fn is_zero_arg(descriptor: &str) -> bool {
    descriptor.starts_with("()")
}

/// The default CLI config path, next to the project being woven.
pub fn default_config_path() -> &'static Path {
    Path::new(".classweave.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use classweave_api::AnnotationInfo;

    use crate::classfile::{ClassFileBuilder, ACC_STATIC};

    fn loaded(class: crate::classfile::ClassFile) -> LoadedClass {
        LoadedClass {
            class_file: class,
            origin: PathBuf::from("out"),
        }
    }

    fn config_source_class(name: &str) -> LoadedClass {
        loaded(
            ClassFileBuilder::new(name)
                .method("weaveConfig", "()Lio/classweave/api/WeaveConfig;", ACC_STATIC)
                .method_annotation(
                    "weaveConfig",
                    &AnnotationInfo::marker(names::CONFIG_SOURCE),
                    true,
                )
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn finds_the_single_source() {
        let classes = vec![
            loaded(ClassFileBuilder::new("com.acme.Plain").build().unwrap()),
            config_source_class("com.acme.Config"),
        ];
        let source = find_config_source(&classes).unwrap();
        assert_eq!(source.class_name, "com.acme.Config");
        assert_eq!(source.method_name, "weaveConfig");
    }

    #[test]
    fn zero_sources_fail_with_count() {
        let classes = vec![loaded(ClassFileBuilder::new("com.acme.Plain").build().unwrap())];
        assert!(matches!(
            find_config_source(&classes),
            Err(SourceError::Misconfiguration { count: 0 })
        ));
    }

    #[test]
    fn two_sources_fail_with_count() {
        let classes = vec![
            config_source_class("com.acme.A"),
            config_source_class("com.acme.B"),
        ];
        assert!(matches!(
            find_config_source(&classes),
            Err(SourceError::Misconfiguration { count: 2 })
        ));
    }

    #[test]
    fn non_static_and_parameterized_methods_are_not_candidates() {
        let class = ClassFileBuilder::new("com.acme.Bad")
            .method("instanceConfig", "()Lio/classweave/api/WeaveConfig;", 0)
            .method_annotation(
                "instanceConfig",
                &AnnotationInfo::marker(names::CONFIG_SOURCE),
                true,
            )
            .method(
                "paramConfig",
                "(I)Lio/classweave/api/WeaveConfig;",
                ACC_STATIC,
            )
            .method_annotation(
                "paramConfig",
                &AnnotationInfo::marker(names::CONFIG_SOURCE),
                true,
            )
            .build()
            .unwrap();
        assert!(matches!(
            find_config_source(&[loaded(class)]),
            Err(SourceError::Misconfiguration { count: 0 })
        ));
    }

    #[test]
    fn toml_factory_loads_a_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.toml");
        fs::write(
            &path,
            r#"
[class_filter]
package_prefix = "com.acme"

[class_options.jpa]
infer_column_nullable = true
infer_column_length = true
"#,
        )
        .unwrap();
        let factory = TomlConfigFactory::new(&path);
        let source = ConfigSourceRef {
            class_name: "com.acme.Config".into(),
            method_name: "weaveConfig".into(),
            descriptor: "()Lio/classweave/api/WeaveConfig;".into(),
        };
        let config = factory.produce(&source).unwrap();
        assert_eq!(config.class_filter.package_prefix, "com.acme");
        assert!(config.class_options.jpa.infer_column_nullable);
        // Unspecified sections keep their defaults.
        assert!(config.class_options.validation.infer_not_null);
    }
}
