//! Well-known annotation qualified names.
//!
//! The `javax.*` names are the real JVM ecosystem annotations the weaver
//! injects or reacts to; the `io.classweave.api.*` names are the weaver's
//! own markers that user projects place on their classes and methods.

/// Marks a class for weaving even when it carries no JPA class annotation.
///
/// Its optional boolean member `fieldsAreNonnullByDefault` treats every
/// field of the class as non-null unless an explicit nullable marker says
/// otherwise.
pub const ANNOTATED: &str = "io.classweave.api.Annotated";

/// Member name on [`ANNOTATED`] enabling class-wide non-null defaulting.
pub const FIELDS_NON_NULL_MEMBER: &str = "fieldsAreNonnullByDefault";

/// Excludes a class or field from weaving regardless of other markers.
pub const IGNORED: &str = "io.classweave.api.Ignored";

/// Marks the single static parameterless method that yields the active
/// configuration.
pub const CONFIG_SOURCE: &str = "io.classweave.api.ConfigSource";

pub const NOT_NULL: &str = "javax.validation.constraints.NotNull";
pub const NOT_BLANK: &str = "javax.validation.constraints.NotBlank";
pub const PATTERN: &str = "javax.validation.constraints.Pattern";
pub const SIZE: &str = "javax.validation.constraints.Size";

pub const COLUMN: &str = "javax.persistence.Column";
pub const ENTITY: &str = "javax.persistence.Entity";
pub const EMBEDDABLE: &str = "javax.persistence.Embeddable";
pub const MAPPED_SUPERCLASS: &str = "javax.persistence.MappedSuperclass";
pub const MANY_TO_ONE: &str = "javax.persistence.ManyToOne";
pub const TRANSIENT: &str = "javax.persistence.Transient";

/// The Java string type, the only type the not-blank rules apply to.
pub const JAVA_LANG_STRING: &str = "java.lang.String";
