//! Unit tests for the section codec and derived table layout.

use abcforge_asm::{Literal, LiteralArray};

use super::codec::{SectionKind, TableLayout, decode_section, empty_table, encode_section};
use super::error::ModuleError;
use super::test_utils::table_literals;

const KEY: &str = "m.table";

fn fixture() -> LiteralArray {
    table_literals(
        &["./a", "./b"],
        &[("x", "y", 0), ("z", "w", 1)],
        &[("n", 1)],
        &[("l", "e")],
        &[("ie", "ii", 0)],
        &[1],
    )
}

#[test]
fn layout_derives_counts_and_starts() {
    let array = fixture();
    let layout = TableLayout::compute(&array, KEY).unwrap();

    assert_eq!(layout.count(SectionKind::ModuleRequests), 2);
    assert_eq!(layout.count(SectionKind::RegularImports), 2);
    assert_eq!(layout.count(SectionKind::NamespaceImports), 1);
    assert_eq!(layout.count(SectionKind::LocalExports), 1);
    assert_eq!(layout.count(SectionKind::IndirectExports), 1);
    assert_eq!(layout.count(SectionKind::StarExports), 1);

    // requests: count at 0, entries at 1..3; regular imports count at 3.
    assert_eq!(layout.start(SectionKind::ModuleRequests), 1);
    assert_eq!(layout.count_index(SectionKind::RegularImports), 3);
    assert_eq!(layout.start(SectionKind::RegularImports), 4);
    assert_eq!(layout.end(SectionKind::RegularImports), 10);
    assert_eq!(layout.start(SectionKind::NamespaceImports), 11);
}

#[test]
fn layout_of_the_empty_table() {
    let array = empty_table();
    let layout = TableLayout::compute(&array, KEY).unwrap();

    for kind in SectionKind::ALL {
        assert_eq!(layout.count(kind), 0);
    }
    assert_eq!(layout.end(SectionKind::StarExports), 6);
}

#[test]
fn layout_rejects_trailing_literals() {
    let mut array = fixture();
    array.literals.push(Literal::u32(7));

    let err = TableLayout::compute(&array, KEY).unwrap_err();
    assert!(matches!(err, ModuleError::MalformedModuleTable { .. }));
}

#[test]
fn decode_regular_imports_yields_field_groups() {
    let array = fixture();
    let layout = TableLayout::compute(&array, KEY).unwrap();

    let entries = decode_section(&array, &layout, SectionKind::RegularImports, KEY, false).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].index, 0);
    assert_eq!(entries[0].fields[0].as_str(), Some("x"));
    assert_eq!(entries[0].fields[1].as_str(), Some("y"));
    assert_eq!(entries[0].fields[2].as_affiliate(), Some(0));
    assert_eq!(entries[1].index, 1);
    assert_eq!(entries[1].fields[0].as_str(), Some("z"));
}

#[test]
fn tombstoned_groups_are_skipped_but_keep_their_slot() {
    let mut array = fixture();
    let layout = TableLayout::compute(&array, KEY).unwrap();

    // Tombstone the first regular import's first literal.
    let offset = layout.entry_field(SectionKind::RegularImports, 0, 0);
    array.literals[offset] = Literal::null();

    let skipped =
        decode_section(&array, &layout, SectionKind::RegularImports, KEY, true).unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].index, 1);

    let kept = decode_section(&array, &layout, SectionKind::RegularImports, KEY, false).unwrap();
    assert_eq!(kept.len(), 2);
    assert!(kept[0].tombstone);
    assert!(!kept[1].tombstone);
}

#[test]
fn unexpected_tag_is_malformed() {
    let mut array = fixture();
    let layout = TableLayout::compute(&array, KEY).unwrap();

    // Replace the request-index affiliate with a string literal.
    let offset = layout.entry_field(SectionKind::RegularImports, 0, 2);
    array.literals[offset] = Literal::string("oops");

    let err =
        decode_section(&array, &layout, SectionKind::RegularImports, KEY, false).unwrap_err();
    assert!(matches!(err, ModuleError::MalformedModuleTable { .. }));
}

#[test]
fn decode_then_encode_reproduces_the_table() {
    // Round trip with no tombstones must be literal-for-literal identical.
    let array = fixture();
    let layout = TableLayout::compute(&array, KEY).unwrap();

    let mut rebuilt = Vec::new();
    for kind in SectionKind::ALL {
        let entries = decode_section(&array, &layout, kind, KEY, false).unwrap();
        encode_section(&entries, &mut rebuilt);
    }

    assert_eq!(rebuilt, array.literals);
}

#[test]
fn encode_compacts_and_remaps() {
    let mut array = fixture();
    let layout = TableLayout::compute(&array, KEY).unwrap();
    let offset = layout.entry_field(SectionKind::RegularImports, 0, 0);
    array.literals[offset] = Literal::null();

    let entries = decode_section(&array, &layout, SectionKind::RegularImports, KEY, false).unwrap();
    let mut out = Vec::new();
    let remap = encode_section(&entries, &mut out);

    // One survivor: the count literal plus one 3-field group.
    assert_eq!(out.len(), 1 + 3);
    assert_eq!(out[0].as_u32(), Some(1));
    assert_eq!(out[1].as_str(), Some("z"));
    assert_eq!(remap.get(&1), Some(&0));
    assert!(!remap.contains_key(&0));
}

#[test]
fn field_widths_match_the_packed_format() {
    assert_eq!(SectionKind::ModuleRequests.field_width(), 1);
    assert_eq!(SectionKind::RegularImports.field_width(), 3);
    assert_eq!(SectionKind::NamespaceImports.field_width(), 2);
    assert_eq!(SectionKind::LocalExports.field_width(), 2);
    assert_eq!(SectionKind::IndirectExports.field_width(), 3);
    assert_eq!(SectionKind::StarExports.field_width(), 1);
}
