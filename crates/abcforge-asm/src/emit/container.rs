//! Item container, layout computation, and the on-disk writer/view.
//!
//! The container owns every binary item created by the pipeline stages and
//! the interning tables that guarantee value identity (first-writer-wins:
//! re-registering an existing value returns the cached item). Layout assigns
//! absolute file offsets; the writer then serializes items at those offsets
//! and seals the header with a crc32 checksum.

use std::collections::HashMap;

use super::error::EmitError;
use super::items::{
    AnnotationItem, AnnotationOwner, ClassItem, ClassItemId, CodeItem, CodeItemId, DebugItem,
    DebugItemId, FieldItem, FieldItemId, LiteralArrayItem, LiteralArrayItemId, LiteralItem,
    MethodItem, MethodItemId, StringItem, StringItemId, ValueItem,
};

/// Container magic bytes.
pub const MAGIC: [u8; 4] = *b"ABCF";
/// Container format version.
pub const VERSION: u32 = 1;
/// Fixed header size.
pub const HEADER_SIZE: usize = 64;
/// Pseudo-class owning functions without a record prefix.
pub const GLOBAL_CLASS: &str = "_GLOBAL";

/// Which method table a signature was indexed into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodTable {
    Static,
    Instance,
}

/// All items of the output container plus their interning tables.
#[derive(Debug, Default)]
pub struct ItemContainer {
    pub strings: Vec<StringItem>,
    string_lookup: HashMap<String, StringItemId>,
    pub classes: Vec<ClassItem>,
    class_lookup: HashMap<String, ClassItemId>,
    pub fields: Vec<FieldItem>,
    pub methods: Vec<MethodItem>,
    static_methods: HashMap<String, MethodItemId>,
    instance_methods: HashMap<String, MethodItemId>,
    pub literal_arrays: Vec<LiteralArrayItem>,
    array_lookup: HashMap<String, LiteralArrayItemId>,
    pub annotations: Vec<AnnotationItem>,
    pub code: Vec<CodeItem>,
    pub debug: Vec<DebugItem>,
}

impl ItemContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string item. Existing strings return their cached id.
    pub fn get_or_intern_string(&mut self, text: &str) -> StringItemId {
        if let Some(&id) = self.string_lookup.get(text) {
            return id;
        }
        let id = StringItemId(self.strings.len() as u16);
        self.strings.push(StringItem {
            text: text.to_string(),
            offset: 0,
        });
        self.string_lookup.insert(text.to_string(), id);
        id
    }

    pub fn string_id(&self, text: &str) -> Option<StringItemId> {
        self.string_lookup.get(text).copied()
    }

    /// Register a class item under `name`. Re-registering returns the
    /// existing item unchanged.
    pub fn get_or_create_class(&mut self, name: &str, foreign: bool) -> ClassItemId {
        if let Some(&id) = self.class_lookup.get(name) {
            return id;
        }
        let name_id = self.get_or_intern_string(name);
        let id = ClassItemId(self.classes.len() as u16);
        self.classes.push(ClassItem {
            name: name_id,
            access_flags: 0,
            foreign,
            base: None,
            interfaces: Vec::new(),
            source_file: None,
            offset: 0,
        });
        self.class_lookup.insert(name.to_string(), id);
        id
    }

    pub fn class_id(&self, name: &str) -> Option<ClassItemId> {
        self.class_lookup.get(name).copied()
    }

    pub fn class_mut(&mut self, id: ClassItemId) -> &mut ClassItem {
        &mut self.classes[id.0 as usize]
    }

    pub fn add_field(&mut self, field: FieldItem) -> FieldItemId {
        let id = FieldItemId(self.fields.len() as u16);
        self.fields.push(field);
        id
    }

    /// Index a method item under its exact mangled signature in the chosen
    /// table.
    pub fn add_method(
        &mut self,
        signature: &str,
        item: MethodItem,
        table: MethodTable,
    ) -> MethodItemId {
        let id = MethodItemId(self.methods.len() as u16);
        self.methods.push(item);
        match table {
            MethodTable::Static => self.static_methods.insert(signature.to_string(), id),
            MethodTable::Instance => self.instance_methods.insert(signature.to_string(), id),
        };
        id
    }

    /// Resolve a mangled signature against the static table first, then the
    /// instance table.
    pub fn method_id(&self, signature: &str) -> Option<MethodItemId> {
        self.static_methods
            .get(signature)
            .or_else(|| self.instance_methods.get(signature))
            .copied()
    }

    pub fn method_mut(&mut self, id: MethodItemId) -> &mut MethodItem {
        &mut self.methods[id.0 as usize]
    }

    /// Pre-register a literal array id so arrays can reference each other
    /// regardless of conversion order.
    pub fn declare_literal_array(&mut self, key: &str) -> LiteralArrayItemId {
        if let Some(&id) = self.array_lookup.get(key) {
            return id;
        }
        let id = LiteralArrayItemId(self.literal_arrays.len() as u16);
        self.literal_arrays.push(LiteralArrayItem {
            key: key.to_string(),
            literals: Vec::new(),
            offset: 0,
        });
        self.array_lookup.insert(key.to_string(), id);
        id
    }

    pub fn literal_array_id(&self, key: &str) -> Option<LiteralArrayItemId> {
        self.array_lookup.get(key).copied()
    }

    pub fn literal_array_mut(&mut self, id: LiteralArrayItemId) -> &mut LiteralArrayItem {
        &mut self.literal_arrays[id.0 as usize]
    }

    pub fn add_annotation(&mut self, item: AnnotationItem) {
        self.annotations.push(item);
    }

    pub fn add_code(&mut self, item: CodeItem) -> CodeItemId {
        let id = CodeItemId(self.code.len() as u16);
        self.code.push(item);
        id
    }

    pub fn add_debug(&mut self, item: DebugItem) -> DebugItemId {
        let id = DebugItemId(self.debug.len() as u16);
        self.debug.push(item);
        id
    }

    /// Validate that every index table fits its 16-bit width.
    pub fn validate(&self) -> Result<(), EmitError> {
        let limit = u16::MAX as usize;
        let tables: [(&'static str, usize); 5] = [
            ("strings", self.strings.len()),
            ("classes", self.classes.len()),
            ("methods", self.methods.len()),
            ("fields", self.fields.len()),
            ("literal arrays", self.literal_arrays.len()),
        ];
        for (what, count) in tables {
            if count > limit {
                return Err(EmitError::TooManyItems { what, count });
            }
        }
        Ok(())
    }

    /// Assign absolute file offsets to every item.
    ///
    /// Section order: strings, classes, fields, methods, literal arrays,
    /// annotations, code, debug. Code items listed in `profile` are placed
    /// first within the code section, in profile order.
    pub fn compute_layout(&mut self, profile: Option<&[String]>) -> SectionOffsets {
        fn align4(off: u32) -> u32 {
            (off + 3) & !3
        }

        let mut off = HEADER_SIZE as u32;
        let mut sections = SectionOffsets::default();

        sections.strings = off;
        for item in &mut self.strings {
            item.offset = off;
            off += item.byte_size() as u32;
        }

        off = align4(off);
        sections.classes = off;
        for item in &mut self.classes {
            item.offset = off;
            off += item.byte_size() as u32;
        }

        off = align4(off);
        sections.fields = off;
        for item in &mut self.fields {
            item.offset = off;
            off += item.byte_size() as u32;
        }

        off = align4(off);
        sections.methods = off;
        for item in &mut self.methods {
            item.offset = off;
            off += item.byte_size() as u32;
        }

        off = align4(off);
        sections.literal_arrays = off;
        for item in &mut self.literal_arrays {
            item.offset = off;
            off += item.byte_size() as u32;
        }

        off = align4(off);
        sections.annotations = off;
        for item in &mut self.annotations {
            item.offset = off;
            off += item.byte_size() as u32;
        }

        off = align4(off);
        sections.code = off;
        for idx in code_order(&self.code, profile) {
            let item = &mut self.code[idx];
            item.offset = off;
            off += item.byte_size() as u32;
        }

        off = align4(off);
        sections.debug = off;
        for item in &mut self.debug {
            item.offset = off;
            off += item.byte_size() as u32;
        }

        sections.total_size = off;
        sections
    }

    /// Serialize every item at its assigned offset and seal the header.
    pub fn write(&self, sections: &SectionOffsets) -> Result<Vec<u8>, EmitError> {
        let mut out = vec![0u8; sections.total_size as usize];

        for item in &self.strings {
            let mut w = Cursor::at(&mut out, item.offset);
            w.u16(item.text.len() as u16);
            w.bytes(item.text.as_bytes());
        }

        for item in &self.classes {
            let mut w = Cursor::at(&mut out, item.offset);
            w.u32(self.strings[item.name.0 as usize].offset);
            w.u32(item.access_flags);
            w.u8(item.foreign as u8);
            w.u32(item.base.map_or(0, |id| self.classes[id.0 as usize].offset));
            w.u32(
                item.source_file
                    .map_or(0, |id| self.strings[id.0 as usize].offset),
            );
            w.u8(item.interfaces.len() as u8);
            for &iface in &item.interfaces {
                w.u32(self.classes[iface.0 as usize].offset);
            }
        }

        for item in &self.fields {
            let mut w = Cursor::at(&mut out, item.offset);
            w.u32(self.classes[item.class.0 as usize].offset);
            w.u32(self.strings[item.name.0 as usize].offset);
            w.u32(self.strings[item.ty.0 as usize].offset);
            w.u32(item.access_flags);
            w.u8(item.foreign as u8);
            w.u8(item.value.is_some() as u8);
            if let Some(value) = &item.value {
                self.write_value(&mut w, value);
            }
        }

        for item in &self.methods {
            let mut w = Cursor::at(&mut out, item.offset);
            w.u32(self.classes[item.class.0 as usize].offset);
            w.u32(self.strings[item.name.0 as usize].offset);
            w.u32(item.access_flags);
            w.u8(item.foreign as u8);
            w.u8(item.num_args);
            w.u32(item.code.map_or(0, |id| self.code[id.0 as usize].offset));
            w.u32(item.debug.map_or(0, |id| self.debug[id.0 as usize].offset));
        }

        for item in &self.literal_arrays {
            let mut w = Cursor::at(&mut out, item.offset);
            w.u32(item.literals.len() as u32);
            for literal in &item.literals {
                self.write_literal(&mut w, literal);
            }
        }

        for item in &self.annotations {
            let mut w = Cursor::at(&mut out, item.offset);
            let (kind, owner_off, param_idx) = match item.owner {
                AnnotationOwner::Class(id) => (0u8, self.classes[id.0 as usize].offset, 0u8),
                AnnotationOwner::Field(id) => (1, self.fields[id.0 as usize].offset, 0),
                AnnotationOwner::Method(id) => (2, self.methods[id.0 as usize].offset, 0),
                AnnotationOwner::Param(id, p) => (3, self.methods[id.0 as usize].offset, p),
            };
            w.u8(kind);
            w.u32(owner_off);
            w.u8(param_idx);
            w.u32(self.classes[item.interface.0 as usize].offset);
            w.u8(item.runtime as u8 | (item.type_annotation as u8) << 1);
            w.u8(item.elements.len() as u8);
            for element in &item.elements {
                w.u32(self.strings[element.name.0 as usize].offset);
                self.write_value(&mut w, &element.value);
            }
        }

        for item in &self.code {
            if item.bytes.len() != item.code_size as usize
                || item.try_blocks.len() != item.try_shape.len()
            {
                return Err(EmitError::Internal {
                    function: item.function.clone(),
                    message: "code item size disagrees with its layout shell".to_string(),
                });
            }
            let mut w = Cursor::at(&mut out, item.offset);
            w.u16(item.regs);
            w.u8(item.num_args);
            w.u32(item.code_size);
            w.bytes(&item.bytes);
            w.u8(item.try_blocks.len() as u8);
            for block in &item.try_blocks {
                w.u32(block.start_pc);
                w.u32(block.length);
                w.u8(block.catches.len() as u8);
                for catch in &block.catches {
                    w.u32(
                        catch
                            .exception
                            .map_or(0, |id| self.classes[id.0 as usize].offset),
                    );
                    w.u32(catch.handler_pc);
                }
            }
        }

        for item in &self.debug {
            if item.lines.len() != item.line_count as usize {
                return Err(EmitError::Internal {
                    function: item.function.clone(),
                    message: "debug item line count disagrees with its layout shell".to_string(),
                });
            }
            let mut w = Cursor::at(&mut out, item.offset);
            w.u32(
                item.source_file
                    .map_or(0, |id| self.strings[id.0 as usize].offset),
            );
            w.u32(
                item.source_code
                    .map_or(0, |id| self.strings[id.0 as usize].offset),
            );
            w.u32(item.line_count);
            for &(pc, line, col) in &item.lines {
                w.u32(pc);
                w.u32(line);
                w.u32(col);
            }
            w.u16(item.locals.len() as u16);
            for local in &item.locals {
                w.u32(self.strings[local.name.0 as usize].offset);
                w.u16(local.reg);
                w.u32(local.start_pc);
                w.u32(local.length);
            }
        }

        let mut header = Header {
            magic: MAGIC,
            version: VERSION,
            checksum: 0,
            total_size: sections.total_size,
            strings_count: self.strings.len() as u16,
            classes_count: self.classes.len() as u16,
            fields_count: self.fields.len() as u16,
            methods_count: self.methods.len() as u16,
            literal_arrays_count: self.literal_arrays.len() as u16,
            annotations_count: self.annotations.len() as u16,
            code_count: self.code.len() as u16,
            debug_count: self.debug.len() as u16,
            sections: *sections,
        };
        header.checksum = crc32fast::hash(&out[HEADER_SIZE..]);
        out[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        Ok(out)
    }

    fn write_value(&self, w: &mut Cursor<'_>, value: &ValueItem) {
        match value {
            ValueItem::Bool(v) => {
                w.u8(0x01);
                w.u8(*v as u8);
            }
            ValueItem::I32(v) => {
                w.u8(0x02);
                w.u32(*v as u32);
            }
            ValueItem::F64(v) => {
                w.u8(0x04);
                w.u64(v.to_bits());
            }
            ValueItem::Str(id) => {
                w.u8(0x05);
                w.u32(self.strings[id.0 as usize].offset);
            }
            ValueItem::Method(id) => {
                w.u8(0x06);
                w.u32(self.methods[id.0 as usize].offset);
            }
            ValueItem::Array(id) => {
                w.u8(0x18);
                w.u32(self.literal_arrays[id.0 as usize].offset);
            }
        }
    }

    fn write_literal(&self, w: &mut Cursor<'_>, literal: &LiteralItem) {
        match literal {
            LiteralItem::TagByte(v) => w.u8(*v),
            LiteralItem::Bool(v) => w.u8(*v as u8),
            LiteralItem::U32(v) => w.u32(*v),
            LiteralItem::F32(v) => w.u32(v.to_bits()),
            LiteralItem::F64(v) => w.u64(v.to_bits()),
            LiteralItem::String(id) => w.u32(self.strings[id.0 as usize].offset),
            LiteralItem::Method(id) => w.u32(self.methods[id.0 as usize].offset),
            LiteralItem::Affiliate(v) => w.u16(*v),
            LiteralItem::Array(id) => w.u32(self.literal_arrays[id.0 as usize].offset),
            LiteralItem::StringArray(items) => {
                w.u32(items.len() as u32);
                for id in items {
                    w.u32(self.strings[id.0 as usize].offset);
                }
            }
            LiteralItem::Null => w.u8(0xff),
        }
    }
}

/// Compute the code-section emission order: profiled functions first.
fn code_order(code: &[CodeItem], profile: Option<&[String]>) -> Vec<usize> {
    let Some(profile) = profile else {
        return (0..code.len()).collect();
    };
    let mut order = Vec::with_capacity(code.len());
    for name in profile {
        if let Some(idx) = code.iter().position(|c| &c.function == name) {
            order.push(idx);
        }
    }
    for idx in 0..code.len() {
        if !order.contains(&idx) {
            order.push(idx);
        }
    }
    order
}

/// Little-endian writer positioned inside the output buffer.
struct Cursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at(buf: &'a mut [u8], offset: u32) -> Self {
        Self {
            buf,
            pos: offset as usize,
        }
    }

    fn u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn u16(&mut self, v: u16) {
        self.buf[self.pos..self.pos + 2].copy_from_slice(&v.to_le_bytes());
        self.pos += 2;
    }

    fn u32(&mut self, v: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.pos += 4;
    }

    fn u64(&mut self, v: u64) {
        self.buf[self.pos..self.pos + 8].copy_from_slice(&v.to_le_bytes());
        self.pos += 8;
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf[self.pos..self.pos + v.len()].copy_from_slice(v);
        self.pos += v.len();
    }
}

/// Absolute offsets of each item section, plus the total size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionOffsets {
    pub strings: u32,
    pub classes: u32,
    pub fields: u32,
    pub methods: u32,
    pub literal_arrays: u32,
    pub annotations: u32,
    pub code: u32,
    pub debug: u32,
    pub total_size: u32,
}

/// Container file header, always the first 64 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 4],
    pub version: u32,
    pub checksum: u32,
    pub total_size: u32,
    pub strings_count: u16,
    pub classes_count: u16,
    pub fields_count: u16,
    pub methods_count: u16,
    pub literal_arrays_count: u16,
    pub annotations_count: u16,
    pub code_count: u16,
    pub debug_count: u16,
    pub sections: SectionOffsets,
}

impl Header {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic);
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        out[12..16].copy_from_slice(&self.total_size.to_le_bytes());
        let counts = [
            self.strings_count,
            self.classes_count,
            self.fields_count,
            self.methods_count,
            self.literal_arrays_count,
            self.annotations_count,
            self.code_count,
            self.debug_count,
        ];
        for (i, count) in counts.into_iter().enumerate() {
            out[16 + i * 2..18 + i * 2].copy_from_slice(&count.to_le_bytes());
        }
        let offsets = [
            self.sections.strings,
            self.sections.classes,
            self.sections.fields,
            self.sections.methods,
            self.sections.literal_arrays,
            self.sections.annotations,
            self.sections.code,
            self.sections.debug,
        ];
        for (i, off) in offsets.into_iter().enumerate() {
            out[32 + i * 4..36 + i * 4].copy_from_slice(&off.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: u32_at(4),
            checksum: u32_at(8),
            total_size: u32_at(12),
            strings_count: u16_at(16),
            classes_count: u16_at(18),
            fields_count: u16_at(20),
            methods_count: u16_at(22),
            literal_arrays_count: u16_at(24),
            annotations_count: u16_at(26),
            code_count: u16_at(28),
            debug_count: u16_at(30),
            sections: SectionOffsets {
                strings: u32_at(32),
                classes: u32_at(36),
                fields: u32_at(40),
                methods: u32_at(44),
                literal_arrays: u32_at(48),
                annotations: u32_at(52),
                code: u32_at(56),
                debug: u32_at(60),
                total_size: u32_at(12),
            },
        }
    }
}

/// Container parse/validation error.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("file too small: {0} bytes (minimum {HEADER_SIZE})")]
    TooSmall(usize),
    #[error("invalid magic: expected ABCF")]
    BadMagic,
    #[error("unsupported version: {0} (expected {VERSION})")]
    BadVersion(u32),
    #[error("size mismatch: header says {header} bytes, got {actual}")]
    SizeMismatch { header: u32, actual: usize },
    #[error("checksum mismatch: header says {header:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { header: u32, computed: u32 },
}

/// Validating read-only view over an emitted container.
#[derive(Debug)]
pub struct View<'a> {
    bytes: &'a [u8],
    header: Header,
}

impl<'a> View<'a> {
    /// Parse and validate magic, version, size, and checksum.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ContainerError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ContainerError::TooSmall(bytes.len()));
        }
        let header = Header::from_bytes(bytes);
        if header.magic != MAGIC {
            return Err(ContainerError::BadMagic);
        }
        if header.version != VERSION {
            return Err(ContainerError::BadVersion(header.version));
        }
        if header.total_size as usize != bytes.len() {
            return Err(ContainerError::SizeMismatch {
                header: header.total_size,
                actual: bytes.len(),
            });
        }
        let computed = crc32fast::hash(&bytes[HEADER_SIZE..]);
        if computed != header.checksum {
            return Err(ContainerError::ChecksumMismatch {
                header: header.checksum,
                computed,
            });
        }
        Ok(Self { bytes, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Read the string item at an absolute offset.
    pub fn string_at(&self, offset: u32) -> Option<&'a str> {
        let start = offset as usize;
        let len = u16::from_le_bytes([
            *self.bytes.get(start)?,
            *self.bytes.get(start + 1)?,
        ]) as usize;
        let text = self.bytes.get(start + 2..start + 2 + len)?;
        std::str::from_utf8(text).ok()
    }
}
