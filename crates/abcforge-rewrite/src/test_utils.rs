//! Shared fixtures for module-table tests.

use abcforge_asm::{Field, Literal, LiteralArray, Program, Record};
use abcforge_asm::record::{MODULE_RECORD_FIELD, SCOPE_NAMES_FIELD};
use abcforge_core::Dialect;

/// Build a packed module table from section tuples.
pub fn table_literals(
    requests: &[&str],
    regular: &[(&str, &str, u16)],
    namespace: &[(&str, u16)],
    local: &[(&str, &str)],
    indirect: &[(&str, &str, u16)],
    star: &[u16],
) -> LiteralArray {
    let mut literals = Vec::new();

    literals.push(Literal::u32(requests.len() as u32));
    for path in requests {
        literals.push(Literal::string(*path));
    }

    literals.push(Literal::u32(regular.len() as u32));
    for (local_name, imported, request) in regular {
        literals.push(Literal::string(*local_name));
        literals.push(Literal::string(*imported));
        literals.push(Literal::affiliate(*request));
    }

    literals.push(Literal::u32(namespace.len() as u32));
    for (local_name, request) in namespace {
        literals.push(Literal::string(*local_name));
        literals.push(Literal::affiliate(*request));
    }

    literals.push(Literal::u32(local.len() as u32));
    for (local_name, export) in local {
        literals.push(Literal::string(*local_name));
        literals.push(Literal::string(*export));
    }

    literals.push(Literal::u32(indirect.len() as u32));
    for (export, import, request) in indirect {
        literals.push(Literal::string(*export));
        literals.push(Literal::string(*import));
        literals.push(Literal::affiliate(*request));
    }

    literals.push(Literal::u32(star.len() as u32));
    for request in star {
        literals.push(Literal::affiliate(*request));
    }

    LiteralArray::new(literals)
}

/// Register a module-descriptor record plus its two literal arrays.
///
/// Returns the module table key.
pub fn add_module(
    program: &mut Program,
    name: &str,
    table: LiteralArray,
    scopes: &[&str],
) -> String {
    let table_key = format!("{name}.table");
    let scopes_key = format!("{name}.scopes");

    program.add_literal_array(table_key.clone(), table);
    program.add_literal_array(
        scopes_key.clone(),
        LiteralArray::new(scopes.iter().map(|s| Literal::string(*s)).collect()),
    );

    let mut record = Record::new(name, Dialect::Dynamic);
    let mut table_field = Field::new(MODULE_RECORD_FIELD, "u32");
    table_field.value = Some(Literal::array_ref(&table_key));
    let mut scopes_field = Field::new(SCOPE_NAMES_FIELD, "u32");
    scopes_field.value = Some(Literal::array_ref(&scopes_key));
    record.fields.push(table_field);
    record.fields.push(scopes_field);
    program.add_record(record);

    table_key
}

/// Canonical small fixture: `src/index` requesting `./a` and `./b` with one
/// regular import of `y` from `./a` bound as `x`.
pub fn index_program() -> Program {
    let mut program = Program::new();
    let table = table_literals(&["./a", "./b"], &[("x", "y", 0)], &[], &[], &[], &[]);
    add_module(&mut program, "src/index", table, &[]);
    program
}
