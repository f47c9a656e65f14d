//! Unit tests for the program model.

use abcforge_core::Dialect;

use super::literal::{Literal, LiteralArray};
use super::program::Program;
use super::record::{Field, MODULE_RECORD_FIELD, Record, SCOPE_NAMES_FIELD};

fn module_record(name: &str, table_key: &str, scopes_key: &str) -> Record {
    let mut record = Record::new(name, Dialect::Dynamic);
    let mut table = Field::new(MODULE_RECORD_FIELD, "u32");
    table.value = Some(Literal::array_ref(table_key));
    let mut scopes = Field::new(SCOPE_NAMES_FIELD, "u32");
    scopes.value = Some(Literal::array_ref(scopes_key));
    record.fields.push(table);
    record.fields.push(scopes);
    record
}

#[test]
fn module_descriptor_requires_both_fields() {
    let mut program = Program::new();
    program.add_record(module_record("src/index", "idx_0", "scopes_1"));

    let mut partial = Record::new("src/other", Dialect::Dynamic);
    let mut table = Field::new(MODULE_RECORD_FIELD, "u32");
    table.value = Some(Literal::array_ref("idx_2"));
    partial.fields.push(table);
    program.add_record(partial);

    let descriptors: Vec<&str> = program.module_records().map(|r| r.name.as_str()).collect();
    assert_eq!(descriptors, ["src/index"]);
}

#[test]
fn external_records_are_not_module_descriptors() {
    let mut record = module_record("src/ext", "idx_0", "scopes_1");
    record.metadata.external = true;

    let mut program = Program::new();
    program.add_record(record);

    assert_eq!(program.module_records().count(), 0);
}

#[test]
fn record_keys_expose_table_names() {
    let record = module_record("m", "table_7", "scopes_8");
    assert_eq!(record.module_record_key(), Some("table_7"));
    assert_eq!(record.scope_names_key(), Some("scopes_8"));
}

#[test]
fn interning_is_per_program_and_first_writer_wins() {
    let mut program = Program::new();
    let a = program.intern("name");
    let b = program.intern("name");
    assert_eq!(a, b);
}

#[test]
fn tables_preserve_insertion_order() {
    let mut program = Program::new();
    program.add_literal_array("b_1", LiteralArray::default());
    program.add_literal_array("a_0", LiteralArray::default());

    let keys: Vec<&str> = program.literal_arrays.keys().map(String::as_str).collect();
    assert_eq!(keys, ["b_1", "a_0"]);
}
