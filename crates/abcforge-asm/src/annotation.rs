//! Annotation payloads attached to records, fields, functions, and
//! parameters.

use serde::{Deserialize, Serialize};

/// Value of one annotation element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AnnotationValue {
    Bool(bool),
    I32(i32),
    F64(f64),
    Str(String),
    /// Mangled name of a function.
    Method(String),
    /// Key of a literal array.
    ArrayRef(String),
}

/// One `name = value` element of an annotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationElement {
    pub name: String,
    pub value: AnnotationValue,
}

/// An annotation instance: the annotation-interface record it instantiates
/// plus its elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationData {
    /// Name of the annotation-interface record.
    pub name: String,
    pub elements: Vec<AnnotationElement>,
}

impl AnnotationData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    pub fn element(&self, name: &str) -> Option<&AnnotationValue> {
        self.elements
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }
}
