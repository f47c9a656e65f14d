//! Unit tests for the item container, layout, and the validating view.

use super::container::{ContainerError, HEADER_SIZE, ItemContainer, MethodTable, View};
use super::items::{CodeItem, MethodItem};

fn empty_code_item(function: &str) -> CodeItem {
    CodeItem {
        function: function.to_string(),
        regs: 0,
        num_args: 0,
        code_size: 0,
        bytes: Vec::new(),
        try_shape: Vec::new(),
        try_blocks: Vec::new(),
        offset: 0,
    }
}

#[test]
fn string_interning_is_first_writer_wins() {
    let mut container = ItemContainer::new();

    let a = container.get_or_intern_string("x");
    let b = container.get_or_intern_string("x");
    let c = container.get_or_intern_string("y");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(container.strings.len(), 2);
}

#[test]
fn class_registration_returns_cached_item() {
    let mut container = ItemContainer::new();

    let a = container.get_or_create_class("K", false);
    let b = container.get_or_create_class("K", true);

    assert_eq!(a, b);
    assert!(!container.classes[a.get() as usize].foreign);
}

#[test]
fn method_lookup_prefers_the_static_table() {
    let mut container = ItemContainer::new();
    let class = container.get_or_create_class("K", false);
    let name = container.get_or_intern_string("K.m");

    let method = |class, name| MethodItem {
        class,
        name,
        access_flags: 0,
        foreign: false,
        num_args: 0,
        code: None,
        debug: None,
        offset: 0,
    };

    let instance = container.add_method("K.m", method(class, name), MethodTable::Instance);
    let statik = container.add_method("K.m", method(class, name), MethodTable::Static);

    assert_ne!(instance, statik);
    assert_eq!(container.method_id("K.m"), Some(statik));
}

#[test]
fn layout_assigns_ascending_section_offsets() {
    let mut container = ItemContainer::new();
    container.get_or_intern_string("alpha");
    container.get_or_create_class("K", false);

    let sections = container.compute_layout(None);

    assert_eq!(sections.strings, HEADER_SIZE as u32);
    assert!(sections.classes > sections.strings);
    assert!(sections.total_size >= sections.classes);
    assert_eq!(container.strings[0].offset, sections.strings);
}

#[test]
fn write_then_parse_round_trips() {
    let mut container = ItemContainer::new();
    container.get_or_intern_string("alpha");
    container.get_or_create_class("K", false);

    let sections = container.compute_layout(None);
    let bytes = container.write(&sections).unwrap();
    let view = View::parse(&bytes).unwrap();

    let header = view.header();
    assert_eq!(header.strings_count, 2); // "alpha" + "K"
    assert_eq!(header.classes_count, 1);
    assert_eq!(header.total_size as usize, bytes.len());
    assert_eq!(view.string_at(header.sections.strings), Some("alpha"));
}

#[test]
fn corrupted_body_fails_the_checksum() {
    let mut container = ItemContainer::new();
    container.get_or_intern_string("alpha");

    let sections = container.compute_layout(None);
    let mut bytes = container.write(&sections).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    let err = View::parse(&bytes).unwrap_err();
    assert!(matches!(err, ContainerError::ChecksumMismatch { .. }));
}

#[test]
fn parse_rejects_bad_magic_and_short_input() {
    let mut container = ItemContainer::new();
    container.get_or_intern_string("alpha");
    let sections = container.compute_layout(None);
    let mut bytes = container.write(&sections).unwrap();

    bytes[0] = b'Z';
    assert!(matches!(
        View::parse(&bytes).unwrap_err(),
        ContainerError::BadMagic
    ));

    assert!(matches!(
        View::parse(&[0u8; 10]).unwrap_err(),
        ContainerError::TooSmall(10)
    ));
}

#[test]
fn parse_rejects_truncated_container() {
    let mut container = ItemContainer::new();
    container.get_or_intern_string("a string long enough to truncate");
    let sections = container.compute_layout(None);
    let bytes = container.write(&sections).unwrap();

    let err = View::parse(&bytes[..bytes.len() - 4]).unwrap_err();
    assert!(matches!(err, ContainerError::SizeMismatch { .. }));
}

#[test]
fn code_profile_reorders_the_code_section() {
    let mut container = ItemContainer::new();
    container.add_code(empty_code_item("first"));
    container.add_code(empty_code_item("second"));

    let profile = vec!["second".to_string()];
    container.compute_layout(Some(&profile));

    assert!(container.code[1].offset < container.code[0].offset);
}

#[test]
fn validate_accepts_small_containers() {
    let mut container = ItemContainer::new();
    container.get_or_intern_string("x");
    assert!(container.validate().is_ok());
}
