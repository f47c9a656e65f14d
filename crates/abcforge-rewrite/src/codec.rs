//! Section codec for module-descriptor literal arrays.
//!
//! A module table is one flat literal array holding six sections in fixed
//! order, each a `u32` count literal followed by `count * field_width`
//! literals. Sections are positional: no tag-prefix literals appear between
//! entries, unlike ordinary literal arrays.
//!
//! Section starts are never stored; [`TableLayout`] derives them from the
//! counts on demand, so an edit can never leave a stale offset behind.

use std::collections::HashMap;

use abcforge_asm::{Literal, LiteralArray, LiteralTag};

use crate::error::ModuleError;

/// The six sections of a module table, in their fixed on-disk order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SectionKind {
    ModuleRequests,
    RegularImports,
    NamespaceImports,
    LocalExports,
    IndirectExports,
    StarExports,
}

impl SectionKind {
    pub const ALL: [SectionKind; 6] = [
        SectionKind::ModuleRequests,
        SectionKind::RegularImports,
        SectionKind::NamespaceImports,
        SectionKind::LocalExports,
        SectionKind::IndirectExports,
        SectionKind::StarExports,
    ];

    /// Number of literals per entry.
    pub fn field_width(self) -> usize {
        match self {
            SectionKind::ModuleRequests | SectionKind::StarExports => 1,
            SectionKind::NamespaceImports | SectionKind::LocalExports => 2,
            SectionKind::RegularImports | SectionKind::IndirectExports => 3,
        }
    }

    /// Expected tag of each field in an entry.
    pub fn field_tags(self) -> &'static [LiteralTag] {
        match self {
            SectionKind::ModuleRequests => &[LiteralTag::String],
            SectionKind::RegularImports => &[
                LiteralTag::String,
                LiteralTag::String,
                LiteralTag::MethodAffiliate,
            ],
            SectionKind::NamespaceImports => &[LiteralTag::String, LiteralTag::MethodAffiliate],
            SectionKind::LocalExports => &[LiteralTag::String, LiteralTag::String],
            SectionKind::IndirectExports => &[
                LiteralTag::String,
                LiteralTag::String,
                LiteralTag::MethodAffiliate,
            ],
            SectionKind::StarExports => &[LiteralTag::MethodAffiliate],
        }
    }

    /// Position of the module-request index field within an entry, for
    /// sections that carry one.
    pub fn request_field(self) -> Option<usize> {
        match self {
            SectionKind::RegularImports | SectionKind::IndirectExports => Some(2),
            SectionKind::NamespaceImports => Some(1),
            SectionKind::StarExports => Some(0),
            SectionKind::ModuleRequests | SectionKind::LocalExports => None,
        }
    }

    fn index(self) -> usize {
        match self {
            SectionKind::ModuleRequests => 0,
            SectionKind::RegularImports => 1,
            SectionKind::NamespaceImports => 2,
            SectionKind::LocalExports => 3,
            SectionKind::IndirectExports => 4,
            SectionKind::StarExports => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::ModuleRequests => "module requests",
            SectionKind::RegularImports => "regular imports",
            SectionKind::NamespaceImports => "namespace imports",
            SectionKind::LocalExports => "local exports",
            SectionKind::IndirectExports => "indirect exports",
            SectionKind::StarExports => "star exports",
        }
    }
}

/// Derived layout of a module table: section counts and entry starts.
///
/// Always recomputed from the count literals, never mutated piecemeal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableLayout {
    counts: [u32; 6],
    /// Literal index of each section's first entry (one past its count).
    starts: [usize; 6],
}

impl TableLayout {
    /// Walk the six count literals and derive every section start.
    pub fn compute(array: &LiteralArray, key: &str) -> Result<Self, ModuleError> {
        let mut counts = [0u32; 6];
        let mut starts = [0usize; 6];
        let mut cursor = 0usize;

        for kind in SectionKind::ALL {
            let count_literal = array.literals.get(cursor).ok_or_else(|| {
                ModuleError::malformed(key, format!("missing {} count", kind.name()))
            })?;
            if count_literal.tag != LiteralTag::Integer {
                return Err(ModuleError::malformed(
                    key,
                    format!(
                        "{} count has tag {:#04x}, expected INTEGER",
                        kind.name(),
                        count_literal.tag as u8
                    ),
                ));
            }
            let count = count_literal.as_u32().ok_or_else(|| {
                ModuleError::malformed(key, format!("{} count payload mismatch", kind.name()))
            })?;

            let i = kind.index();
            counts[i] = count;
            starts[i] = cursor + 1;
            cursor += 1 + count as usize * kind.field_width();
        }

        if cursor != array.literals.len() {
            return Err(ModuleError::malformed(
                key,
                format!(
                    "table has {} literals, sections account for {cursor}",
                    array.literals.len()
                ),
            ));
        }

        Ok(Self { counts, starts })
    }

    /// Entry count of a section (tombstoned entries included).
    pub fn count(&self, kind: SectionKind) -> u32 {
        self.counts[kind.index()]
    }

    /// Literal index of a section's first entry.
    pub fn start(&self, kind: SectionKind) -> usize {
        self.starts[kind.index()]
    }

    /// Literal index of the count literal of a section.
    pub fn count_index(&self, kind: SectionKind) -> usize {
        self.starts[kind.index()] - 1
    }

    /// Literal index one past the last entry of a section; new entries are
    /// inserted here so the section stays contiguous.
    pub fn end(&self, kind: SectionKind) -> usize {
        self.start(kind) + self.count(kind) as usize * kind.field_width()
    }

    /// Absolute literal index of one field of one entry.
    pub fn entry_field(&self, kind: SectionKind, entry: u32, field: usize) -> usize {
        self.start(kind) + entry as usize * kind.field_width() + field
    }
}

/// One decoded entry: its physical position within the section and its
/// field literals.
#[derive(Clone, Debug, PartialEq)]
pub struct RawEntry {
    /// Zero-based physical position, tombstoned slots included.
    pub index: u32,
    pub fields: Vec<Literal>,
    pub tombstone: bool,
}

/// Decode one section into raw entries.
///
/// A group whose first literal carries the tombstone tag is a logically
/// deleted slot: with `skip_tombstones` it is not yielded (the cursor still
/// advances), otherwise it is yielded with `tombstone` set. Any other tag
/// mismatch fails the whole decode with `MalformedModuleTable`.
pub fn decode_section(
    array: &LiteralArray,
    layout: &TableLayout,
    kind: SectionKind,
    key: &str,
    skip_tombstones: bool,
) -> Result<Vec<RawEntry>, ModuleError> {
    let width = kind.field_width();
    let tags = kind.field_tags();
    let mut entries = Vec::new();

    for entry in 0..layout.count(kind) {
        let base = layout.entry_field(kind, entry, 0);
        let group = array.literals.get(base..base + width).ok_or_else(|| {
            ModuleError::malformed(key, format!("{} entry {entry} truncated", kind.name()))
        })?;

        if group[0].is_tombstone() {
            if !skip_tombstones {
                entries.push(RawEntry {
                    index: entry,
                    fields: group.to_vec(),
                    tombstone: true,
                });
            }
            continue;
        }

        for (field, literal) in group.iter().enumerate() {
            if literal.tag != tags[field] {
                return Err(ModuleError::malformed(
                    key,
                    format!(
                        "{} entry {entry} field {field} has tag {:#04x}, expected {:#04x}",
                        kind.name(),
                        literal.tag as u8,
                        tags[field] as u8
                    ),
                ));
            }
        }

        entries.push(RawEntry {
            index: entry,
            fields: group.to_vec(),
            tombstone: false,
        });
    }

    Ok(entries)
}

/// Encode one section from surviving entries.
///
/// Writes the count literal followed by each non-tombstoned entry's fields
/// in their original order, and returns the old-position -> new-position map
/// for entries that moved.
pub fn encode_section(entries: &[RawEntry], out: &mut Vec<Literal>) -> HashMap<u32, u32> {
    let survivors: Vec<&RawEntry> = entries.iter().filter(|e| !e.tombstone).collect();

    out.push(Literal::u32(survivors.len() as u32));
    let mut remap = HashMap::with_capacity(survivors.len());
    for (new_index, entry) in survivors.iter().enumerate() {
        remap.insert(entry.index, new_index as u32);
        out.extend(entry.fields.iter().cloned());
    }
    remap
}

/// Build an empty module table: six zero counts.
pub fn empty_table() -> LiteralArray {
    LiteralArray::new(vec![Literal::u32(0); 6])
}
