//! Error types for binary emission.

/// What kind of binary item an unresolved reference pointed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyKind {
    String,
    Class,
    Field,
    Method,
    LiteralArray,
    AnnotationInterface,
}

impl DependencyKind {
    pub fn name(self) -> &'static str {
        match self {
            DependencyKind::String => "string",
            DependencyKind::Class => "class",
            DependencyKind::Field => "field",
            DependencyKind::Method => "method",
            DependencyKind::LiteralArray => "literal array",
            DependencyKind::AnnotationInterface => "annotation interface",
        }
    }
}

/// Error during binary emission. Any failure aborts the whole emit; no
/// partial container is produced.
#[derive(Clone, Debug, thiserror::Error)]
pub enum EmitError {
    /// A stage referenced an item that no earlier stage registered.
    #[error("missing index dependency: {} `{name}` referenced from {context}", .kind.name())]
    MissingIndexDependency {
        kind: DependencyKind,
        name: String,
        context: String,
    },

    /// A record names a base or interface record that does not exist.
    #[error("record `{record}` references unknown base or interface `{referent}`")]
    UnknownBase { record: String, referent: String },

    /// A literal cannot be represented in the container format.
    #[error("unsupported literal tag {tag:#04x} in array `{array}`")]
    UnsupportedLiteral { tag: u8, array: String },

    /// A jump targets a label that is not defined in the function body.
    #[error("undefined label `{label}` in function `{function}`")]
    UndefinedLabel { label: String, function: String },

    /// A catch block names a try-range label that is not defined.
    #[error("undefined try-range label `{label}` in function `{function}`")]
    UndefinedTryLabel { label: String, function: String },

    /// Too many items for a 16-bit index table.
    #[error("too many {what}: {count} (max 65535)")]
    TooManyItems { what: &'static str, count: usize },

    /// Internal error while emitting one function; aborts the whole emit
    /// because the layout is already invalid.
    #[error("internal error during emitting function `{function}`: {message}")]
    Internal { function: String, message: String },
}

impl EmitError {
    pub fn missing(kind: DependencyKind, name: &str, context: &str) -> Self {
        Self::MissingIndexDependency {
            kind,
            name: name.to_string(),
            context: context.to_string(),
        }
    }
}
