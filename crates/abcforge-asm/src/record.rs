//! Records: classes, namespaces, module descriptors, and plain data records.

use abcforge_core::Dialect;
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationData;
use crate::literal::{Literal, LiteralValue};

/// Field naming the packed import/export table of a module-descriptor record.
pub const MODULE_RECORD_FIELD: &str = "moduleRecordIdx";
/// Field naming the demangling table for scoped identifiers.
pub const SCOPE_NAMES_FIELD: &str = "scopeNames";

/// Access flag bits shared by records, fields, and methods.
pub mod access {
    pub const PUBLIC: u32 = 0x0001;
    pub const PRIVATE: u32 = 0x0002;
    pub const PROTECTED: u32 = 0x0004;
    pub const STATIC: u32 = 0x0008;
    pub const FINAL: u32 = 0x0010;
    pub const NATIVE: u32 = 0x0100;
    pub const ABSTRACT: u32 = 0x0400;
}

/// Kind of an annotation-interface record, carried in its own metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Runtime,
    CompileTime,
    RuntimeType,
    CompileTimeType,
}

impl AnnotationKind {
    /// Whether payloads of this kind are visible at runtime.
    pub fn is_runtime(self) -> bool {
        matches!(self, AnnotationKind::Runtime | AnnotationKind::RuntimeType)
    }

    /// Whether this is one of the type-annotation variants.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            AnnotationKind::RuntimeType | AnnotationKind::CompileTimeType
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub access_flags: u32,
    /// External declaration only; emitted as a foreign class.
    pub external: bool,
    /// Set when this record declares an annotation interface.
    pub annotation: Option<AnnotationKind>,
    /// Name of the superclass record, if any.
    pub base: Option<String>,
    /// Names of implemented interface records.
    pub interfaces: Vec<String>,
}

/// One record field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Type descriptor, e.g. `u1`, `i32`, `f64`, `any`, a record name, or an
    /// array descriptor ending in `[]`.
    pub ty: String,
    /// Default initializer, attached as a binary value item at the
    /// annotation stage of emission.
    pub value: Option<Literal>,
    pub access_flags: u32,
    pub annotations: Vec<AnnotationData>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            value: None,
            access_flags: 0,
            annotations: Vec::new(),
        }
    }

    /// Whether the field type is an array descriptor.
    pub fn is_array_type(&self) -> bool {
        self.ty.ends_with("[]")
    }

    /// Key of the literal array this field points at, if its value is an
    /// array reference.
    pub fn array_key(&self) -> Option<&str> {
        match self.value.as_ref().map(|l| &l.value) {
            Some(LiteralValue::ArrayRef(key)) => Some(key),
            _ => None,
        }
    }
}

/// A class, namespace, module descriptor, or plain data record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub dialect: Dialect,
    pub fields: Vec<Field>,
    pub metadata: RecordMetadata,
    pub annotations: Vec<AnnotationData>,
    pub source_file: Option<String>,
}

impl Record {
    pub fn new(name: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            name: name.into(),
            dialect,
            fields: Vec::new(),
            metadata: RecordMetadata::default(),
            annotations: Vec::new(),
            source_file: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Key of the packed module table, when this record is a module
    /// descriptor.
    pub fn module_record_key(&self) -> Option<&str> {
        self.field(MODULE_RECORD_FIELD).and_then(Field::array_key)
    }

    /// Key of the scope-names table, when this record is a module
    /// descriptor.
    pub fn scope_names_key(&self) -> Option<&str> {
        self.field(SCOPE_NAMES_FIELD).and_then(Field::array_key)
    }

    /// A module descriptor carries both required table fields and is neither
    /// external nor an annotation interface.
    pub fn is_module_descriptor(&self) -> bool {
        !self.metadata.external
            && self.metadata.annotation.is_none()
            && self.module_record_key().is_some()
            && self.scope_names_key().is_some()
    }
}
