//! Functions: parameters, body, try/catch ranges, and debug metadata.

use abcforge_core::Dialect;
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationData;
use crate::ins::Ins;
use crate::record::access;

/// Base name marking a class initializer; always emitted into the static
/// method table regardless of declared receiver.
pub const CLASS_INITIALIZER: &str = "cctor";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Type descriptor; the receiver of an instance method repeats the
    /// owning record's name here.
    pub ty: String,
}

/// One declared try/catch range. Ranges sharing the same begin/end label
/// pair are grouped into a single try-block at emission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatchBlock {
    pub try_begin_label: String,
    pub try_end_label: String,
    pub catch_begin_label: String,
    /// Record of the caught exception type; `None` is a catch-all.
    pub exception_record: Option<String>,
}

/// A named local variable slot, emitted into the debug item on request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalVariable {
    pub name: String,
    pub reg: u16,
    /// First instruction index where the variable is live.
    pub start: u32,
    /// Number of instructions the variable stays live for.
    pub length: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub access_flags: u32,
    /// Declared but not implemented here; emitted as a foreign method.
    pub external: bool,
}

/// A function body plus everything emission needs to serialize it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Exact mangled signature; also the key in the program function table.
    pub name: String,
    pub dialect: Dialect,
    pub params: Vec<Param>,
    pub regs_num: u32,
    pub ins: Vec<Ins>,
    pub catch_blocks: Vec<CatchBlock>,
    pub metadata: FunctionMetadata,
    pub source_file: Option<String>,
    pub source_code: Option<String>,
    pub local_variables: Vec<LocalVariable>,
    pub annotations: Vec<AnnotationData>,
    /// Per-parameter annotation sets, parallel to `params`.
    pub param_annotations: Vec<Vec<AnnotationData>>,
}

impl Function {
    pub fn new(name: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            name: name.into(),
            dialect,
            params: Vec::new(),
            regs_num: 0,
            ins: Vec::new(),
            catch_blocks: Vec::new(),
            metadata: FunctionMetadata::default(),
            source_file: None,
            source_code: None,
            local_variables: Vec::new(),
            annotations: Vec::new(),
            param_annotations: Vec::new(),
        }
    }

    /// Split the mangled name into (owning record, base name).
    ///
    /// Functions without a record prefix live in the global pseudo-class.
    pub fn owner_and_base(&self) -> (Option<&str>, &str) {
        match self.name.split_once('.') {
            Some((owner, base)) => (Some(owner), base),
            None => (None, self.name.as_str()),
        }
    }

    pub fn is_static(&self) -> bool {
        self.metadata.access_flags & access::STATIC != 0
    }

    /// Whether the base name marks a class initializer.
    pub fn is_class_initializer(&self) -> bool {
        let (_, base) = self.owner_and_base();
        base == CLASS_INITIALIZER
    }

    /// Declared receiver type for a non-static function, if present.
    pub fn receiver_type(&self) -> Option<&str> {
        if self.is_static() {
            return None;
        }
        self.params.first().map(|p| p.ty.as_str())
    }
}
