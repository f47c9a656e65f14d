//! The staged emission pipeline.
//!
//! Stages run in a strict order because each stage resolves symbolic
//! references against index tables the earlier stages populated. Violating
//! that order surfaces as `MissingIndexDependency`, never as silent
//! corruption, and aborts the whole emit.

use std::collections::HashMap;

use tracing::debug;

use crate::annotation::{AnnotationData, AnnotationValue};
use crate::function::Function;
use crate::literal::{Literal, LiteralValue};
use crate::program::Program;

use super::code::{body_size, encode_function, try_shape};
use super::container::{GLOBAL_CLASS, ItemContainer, MethodTable};
use super::error::{DependencyKind, EmitError};
use super::items::{
    AnnotationItem, AnnotationOwner, CodeItem, DebugItem, ElementItem, FieldItem, FieldItemId,
    LiteralItem, LocalVarItem, MethodItem, ValueItem,
};

/// Key of the reserved export-entities literal array. Its string-tagged
/// placeholder slots are patched with final string/class offsets once the
/// layout is known.
pub const EXPORT_ENTITIES_KEY: &str = "_exportEntities";

/// Knobs for one emit call.
#[derive(Clone, Debug)]
pub struct EmitOptions {
    /// Emit per-function debug items (line/column records, source file and
    /// source code strings, local variables).
    pub emit_debug_info: bool,
    /// Profile-guided code layout: functions named here get their code items
    /// placed first, in profile order.
    pub code_profile: Option<Vec<String>>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            emit_debug_info: true,
            code_profile: None,
        }
    }
}

/// Serialize a resolved program into a binary container.
pub fn emit(program: &Program, options: &EmitOptions) -> Result<Vec<u8>, EmitError> {
    let mut emitter = Emitter {
        container: ItemContainer::new(),
        fields_by_key: HashMap::new(),
    };
    emitter.run(program, options)
}

struct Emitter {
    container: ItemContainer,
    /// (record name, field name) -> field item, for default-value and
    /// annotation attachment.
    fields_by_key: HashMap<(String, String), FieldItemId>,
}

impl Emitter {
    fn run(&mut self, program: &Program, options: &EmitOptions) -> Result<Vec<u8>, EmitError> {
        debug!(
            records = program.records.len(),
            functions = program.functions.len(),
            literal_arrays = program.literal_arrays.len(),
            "emitting program"
        );

        self.intern_strings(program);
        self.register_array_types(program);
        self.register_records(program)?;
        self.register_functions(program, options)?;
        self.build_literal_arrays(program)?;
        self.attach_record_annotations(program)?;
        self.attach_function_annotations(program)?;

        self.container.validate()?;
        let sections = self
            .container
            .compute_layout(options.code_profile.as_deref());
        self.patch_export_entities();
        self.encode_bodies(program)?;

        debug!(total_size = sections.total_size, "layout sealed");
        self.container.write(&sections)
    }

    /// Stage 1: intern every string the program mentions by name.
    ///
    /// Literal payload strings are interned on demand during array
    /// conversion; interning is first-writer-wins either way.
    fn intern_strings(&mut self, program: &Program) {
        let c = &mut self.container;
        for record in program.records.values() {
            c.get_or_intern_string(&record.name);
            if let Some(source) = &record.source_file {
                c.get_or_intern_string(source);
            }
            for field in &record.fields {
                c.get_or_intern_string(&field.name);
                c.get_or_intern_string(&field.ty);
            }
        }
        for function in program.functions.values() {
            c.get_or_intern_string(&function.name);
            if let Some(source) = &function.source_file {
                c.get_or_intern_string(source);
            }
            for param in &function.params {
                c.get_or_intern_string(&param.ty);
            }
            for ins in &function.ins {
                if ins.opcode.id_is_string()
                    && let Some(id) = ins.ids.first()
                {
                    c.get_or_intern_string(id);
                }
            }
        }
    }

    /// Stage 2: array-type descriptors become synthetic foreign classes
    /// keyed by descriptor.
    fn register_array_types(&mut self, program: &Program) {
        for record in program.records.values() {
            for field in &record.fields {
                if field.is_array_type() {
                    self.container.get_or_create_class(&field.ty, true);
                }
            }
        }
        for function in program.functions.values() {
            for param in &function.params {
                if param.ty.ends_with("[]") {
                    self.container.get_or_create_class(&param.ty, true);
                }
            }
        }
    }

    /// Stage 3: records become class items (foreign for externals), with
    /// superclass/interface wiring and field items.
    fn register_records(&mut self, program: &Program) -> Result<(), EmitError> {
        // Every record gets its class item before any base/interface wiring,
        // so declaration order cannot hide a legitimate referent.
        for record in program.records.values() {
            let id = self
                .container
                .get_or_create_class(&record.name, record.metadata.external);
            let source = record
                .source_file
                .as_ref()
                .map(|s| self.container.get_or_intern_string(s));
            let class = self.container.class_mut(id);
            class.access_flags = record.metadata.access_flags;
            class.source_file = source;
        }

        for record in program.records.values() {
            let class_id = self
                .container
                .class_id(&record.name)
                .expect("registered above");

            if let Some(base) = &record.metadata.base {
                if !program.records.contains_key(base) {
                    return Err(EmitError::UnknownBase {
                        record: record.name.clone(),
                        referent: base.clone(),
                    });
                }
                let base_id = self.container.class_id(base).expect("registered above");
                self.container.class_mut(class_id).base = Some(base_id);
            }
            for iface in &record.metadata.interfaces {
                if !program.records.contains_key(iface) {
                    return Err(EmitError::UnknownBase {
                        record: record.name.clone(),
                        referent: iface.clone(),
                    });
                }
                let iface_id = self.container.class_id(iface).expect("registered above");
                self.container.class_mut(class_id).interfaces.push(iface_id);
            }

            for field in &record.fields {
                let name = self.container.get_or_intern_string(&field.name);
                let ty = self.container.get_or_intern_string(&field.ty);
                let field_id = self.container.add_field(FieldItem {
                    class: class_id,
                    name,
                    ty,
                    access_flags: field.access_flags,
                    foreign: record.metadata.external,
                    value: None,
                    offset: 0,
                });
                self.fields_by_key
                    .insert((record.name.clone(), field.name.clone()), field_id);
            }
        }
        Ok(())
    }

    /// Stage 4: functions, static table first, then instance table.
    ///
    /// An "instance" function whose declared receiver does not match its
    /// owner record, or whose name is a class initializer, is emitted as
    /// effectively static.
    fn register_functions(
        &mut self,
        program: &Program,
        options: &EmitOptions,
    ) -> Result<(), EmitError> {
        for function in program.functions.values().filter(|f| effectively_static(f)) {
            self.register_function(function, MethodTable::Static, options);
        }
        for function in program.functions.values().filter(|f| !effectively_static(f)) {
            self.register_function(function, MethodTable::Instance, options);
        }
        Ok(())
    }

    fn register_function(
        &mut self,
        function: &Function,
        table: MethodTable,
        options: &EmitOptions,
    ) {
        let c = &mut self.container;
        let (owner, _) = function.owner_and_base();
        let class_id = match owner {
            Some(owner) => {
                // Owner records may be foreign declarations or missing
                // entirely; either way the scope materializes as a foreign
                // class.
                let foreign = c.class_id(owner).is_none();
                c.get_or_create_class(owner, foreign)
            }
            None => c.get_or_create_class(GLOBAL_CLASS, false),
        };

        let receiver_args = match table {
            MethodTable::Instance => 1,
            MethodTable::Static => 0,
        };
        let num_args = function.params.len().saturating_sub(receiver_args) as u8;

        let name = c.get_or_intern_string(&function.name);
        let foreign = function.metadata.external;

        let code = if foreign {
            None
        } else {
            Some(c.add_code(CodeItem {
                function: function.name.clone(),
                regs: function.regs_num as u16,
                num_args,
                code_size: body_size(function),
                bytes: Vec::new(),
                try_shape: try_shape(function),
                try_blocks: Vec::new(),
                offset: 0,
            }))
        };

        let debug = if foreign || !options.emit_debug_info {
            None
        } else {
            let source_file = function
                .source_file
                .as_ref()
                .map(|s| c.get_or_intern_string(s));
            let source_code = function
                .source_code
                .as_ref()
                .map(|s| c.get_or_intern_string(s));
            let locals = function
                .local_variables
                .iter()
                .map(|v| LocalVarItem {
                    name: c.get_or_intern_string(&v.name),
                    reg: v.reg,
                    start_pc: v.start,
                    length: v.length,
                })
                .collect();
            Some(c.add_debug(DebugItem {
                function: function.name.clone(),
                source_file,
                source_code,
                lines: Vec::new(),
                line_count: function.ins.len() as u32,
                locals,
                offset: 0,
            }))
        };

        c.add_method(
            &function.name,
            MethodItem {
                class: class_id,
                name,
                access_flags: function.metadata.access_flags,
                foreign,
                num_args,
                code,
                debug,
                offset: 0,
            },
            table,
        );
    }

    /// Stage 5: literal arrays, in the deterministic order given by the
    /// numeric suffix of their keys. Ids are declared up front so arrays can
    /// reference each other independent of conversion order.
    fn build_literal_arrays(&mut self, program: &Program) -> Result<(), EmitError> {
        let mut keys: Vec<&String> = program.literal_arrays.keys().collect();
        keys.sort_by(|a, b| {
            let ka = (numeric_suffix(a).unwrap_or(u64::MAX), a.as_str());
            let kb = (numeric_suffix(b).unwrap_or(u64::MAX), b.as_str());
            ka.cmp(&kb)
        });

        for key in &keys {
            self.container.declare_literal_array(key);
        }

        for key in keys {
            let array = program
                .literal_arrays
                .get(key.as_str())
                .expect("key came from this table");
            let mut items = Vec::with_capacity(array.literals.len());
            for literal in &array.literals {
                items.push(self.convert_literal(literal, key)?);
            }
            let id = self.container.literal_array_id(key).expect("declared above");
            self.container.literal_array_mut(id).literals = items;
        }
        Ok(())
    }

    fn convert_literal(&mut self, literal: &Literal, array: &str) -> Result<LiteralItem, EmitError> {
        let context = format!("literal array `{array}`");
        let item = match &literal.value {
            LiteralValue::TagByte(v) => LiteralItem::TagByte(*v),
            LiteralValue::Bool(v) => LiteralItem::Bool(*v),
            LiteralValue::U32(v) => LiteralItem::U32(*v),
            LiteralValue::F32(v) => LiteralItem::F32(*v),
            LiteralValue::F64(v) => LiteralItem::F64(*v),
            LiteralValue::Str(s) => LiteralItem::String(self.container.get_or_intern_string(s)),
            LiteralValue::MethodRef(name) => LiteralItem::Method(
                self.container
                    .method_id(name)
                    .ok_or_else(|| EmitError::missing(DependencyKind::Method, name, &context))?,
            ),
            LiteralValue::Affiliate(v) => LiteralItem::Affiliate(*v),
            LiteralValue::ArrayRef(key) => LiteralItem::Array(
                self.container.literal_array_id(key).ok_or_else(|| {
                    EmitError::missing(DependencyKind::LiteralArray, key, &context)
                })?,
            ),
            LiteralValue::StringArray(items) => LiteralItem::StringArray(
                items
                    .iter()
                    .map(|s| self.container.get_or_intern_string(s))
                    .collect(),
            ),
            LiteralValue::Null => LiteralItem::Null,
        };
        Ok(item)
    }

    /// Stage 6: record- and field-level annotations plus field default
    /// values.
    fn attach_record_annotations(&mut self, program: &Program) -> Result<(), EmitError> {
        for record in program.records.values() {
            if record.metadata.external {
                continue;
            }
            let class_id = self
                .container
                .class_id(&record.name)
                .expect("registered in stage 3");

            for annotation in &record.annotations {
                let item =
                    self.make_annotation(program, annotation, AnnotationOwner::Class(class_id))?;
                self.container.add_annotation(item);
            }

            for field in &record.fields {
                let field_id = self.fields_by_key[&(record.name.clone(), field.name.clone())];
                for annotation in &field.annotations {
                    let item = self.make_annotation(
                        program,
                        annotation,
                        AnnotationOwner::Field(field_id),
                    )?;
                    self.container.add_annotation(item);
                }
                if let Some(value) = &field.value {
                    let value = self.convert_value(value, &record.name)?;
                    self.container.fields[field_id.get() as usize].value = Some(value);
                }
            }
        }
        Ok(())
    }

    /// Stage 7: function- and parameter-level annotations.
    fn attach_function_annotations(&mut self, program: &Program) -> Result<(), EmitError> {
        for function in program.functions.values() {
            if function.metadata.external {
                continue;
            }
            let method_id = self
                .container
                .method_id(&function.name)
                .expect("registered in stage 4");

            for annotation in &function.annotations {
                let item =
                    self.make_annotation(program, annotation, AnnotationOwner::Method(method_id))?;
                self.container.add_annotation(item);
            }
            for (index, set) in function.param_annotations.iter().enumerate() {
                for annotation in set {
                    let item = self.make_annotation(
                        program,
                        annotation,
                        AnnotationOwner::Param(method_id, index as u8),
                    )?;
                    self.container.add_annotation(item);
                }
            }
        }
        Ok(())
    }

    fn make_annotation(
        &mut self,
        program: &Program,
        annotation: &AnnotationData,
        owner: AnnotationOwner,
    ) -> Result<AnnotationItem, EmitError> {
        let context = format!("annotation `{}`", annotation.name);
        let kind = program
            .records
            .get(&annotation.name)
            .and_then(|r| r.metadata.annotation)
            .ok_or_else(|| {
                EmitError::missing(
                    DependencyKind::AnnotationInterface,
                    &annotation.name,
                    &context,
                )
            })?;
        let interface = self
            .container
            .class_id(&annotation.name)
            .expect("annotation records are registered in stage 3");

        let mut elements = Vec::with_capacity(annotation.elements.len());
        for element in &annotation.elements {
            let name = self.container.get_or_intern_string(&element.name);
            let value = self.convert_annotation_value(&element.value, &context)?;
            elements.push(ElementItem { name, value });
        }

        Ok(AnnotationItem {
            owner,
            interface,
            runtime: kind.is_runtime(),
            type_annotation: kind.is_type(),
            elements,
            offset: 0,
        })
    }

    fn convert_annotation_value(
        &mut self,
        value: &AnnotationValue,
        context: &str,
    ) -> Result<ValueItem, EmitError> {
        let item = match value {
            AnnotationValue::Bool(v) => ValueItem::Bool(*v),
            AnnotationValue::I32(v) => ValueItem::I32(*v),
            AnnotationValue::F64(v) => ValueItem::F64(*v),
            AnnotationValue::Str(s) => ValueItem::Str(self.container.get_or_intern_string(s)),
            AnnotationValue::Method(name) => ValueItem::Method(
                self.container
                    .method_id(name)
                    .ok_or_else(|| EmitError::missing(DependencyKind::Method, name, context))?,
            ),
            AnnotationValue::ArrayRef(key) => ValueItem::Array(
                self.container
                    .literal_array_id(key)
                    .ok_or_else(|| EmitError::missing(DependencyKind::LiteralArray, key, context))?,
            ),
        };
        Ok(item)
    }

    /// Convert a field default value into a binary value item.
    fn convert_value(&mut self, literal: &Literal, record: &str) -> Result<ValueItem, EmitError> {
        let context = format!("field default in `{record}`");
        let item = match &literal.value {
            LiteralValue::Bool(v) => ValueItem::Bool(*v),
            LiteralValue::U32(v) => ValueItem::I32(*v as i32),
            LiteralValue::F64(v) => ValueItem::F64(*v),
            LiteralValue::Str(s) => ValueItem::Str(self.container.get_or_intern_string(s)),
            LiteralValue::MethodRef(name) => ValueItem::Method(
                self.container
                    .method_id(name)
                    .ok_or_else(|| EmitError::missing(DependencyKind::Method, name, &context))?,
            ),
            LiteralValue::ArrayRef(key) => ValueItem::Array(
                self.container
                    .literal_array_id(key)
                    .ok_or_else(|| EmitError::missing(DependencyKind::LiteralArray, key, &context))?,
            ),
            _ => {
                return Err(EmitError::UnsupportedLiteral {
                    tag: literal.tag as u8,
                    array: context,
                });
            }
        };
        Ok(item)
    }

    /// Stage 9: patch the reserved export-entities array. String-tagged
    /// placeholder slots naming a registered class take that class item's
    /// offset; all others take their string item's offset. Width is stable
    /// (both sides are 4 bytes), so the layout stays valid.
    fn patch_export_entities(&mut self) {
        let Some(id) = self.container.literal_array_id(EXPORT_ENTITIES_KEY) else {
            return;
        };

        let mut patched = Vec::new();
        for (index, literal) in self.container.literal_arrays[id.get() as usize]
            .literals
            .iter()
            .enumerate()
        {
            if let LiteralItem::String(sid) = literal {
                let text = self.container.strings[sid.get() as usize].text.clone();
                let offset = match self.container.class_id(&text) {
                    Some(cid) => self.container.classes[cid.get() as usize].offset,
                    None => self.container.strings[sid.get() as usize].offset,
                };
                patched.push((index, LiteralItem::U32(offset)));
            }
        }
        let array = self.container.literal_array_mut(id);
        for (index, item) in patched {
            array.literals[index] = item;
        }
    }

    /// Stage 10: encode every function body and fill the code/debug shells.
    fn encode_bodies(&mut self, program: &Program) -> Result<(), EmitError> {
        let mut encoded = Vec::with_capacity(self.container.code.len());
        for (index, item) in self.container.code.iter().enumerate() {
            let function = program.functions.get(&item.function).ok_or_else(|| {
                EmitError::Internal {
                    function: item.function.clone(),
                    message: "code item without a source function".to_string(),
                }
            })?;
            encoded.push((index, encode_function(function, &self.container)?));
        }

        for (index, body) in encoded {
            let function = self.container.code[index].function.clone();
            let lines = body.lines.clone();
            self.container.code[index].bytes = body.bytes;
            self.container.code[index].try_blocks = body.try_blocks;

            if let Some(debug_index) = self.debug_index_for(&function) {
                self.container.debug[debug_index].lines = lines;
            }
        }
        Ok(())
    }

    fn debug_index_for(&self, function: &str) -> Option<usize> {
        self.container
            .debug
            .iter()
            .position(|d| d.function == function)
    }
}

/// Whether a function belongs in the static method table.
///
/// Instance functions whose declared receiver does not match their owner
/// record, and class initializers, are emitted as effectively static.
pub(crate) fn effectively_static(f: &Function) -> bool {
    if f.is_static() || f.is_class_initializer() {
        return true;
    }
    let (owner, _) = f.owner_and_base();
    match (f.receiver_type(), owner) {
        (Some(receiver), Some(owner)) => receiver != owner,
        (Some(_), None) => true,
        (None, _) => true,
    }
}

/// Trailing decimal suffix of a literal-array key, if any.
fn numeric_suffix(key: &str) -> Option<u64> {
    let digits = key
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(key, |i| &key[i + 1..]);
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
