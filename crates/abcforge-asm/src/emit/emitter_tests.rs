//! Unit tests for the staged emission pipeline.

use abcforge_core::Dialect;

use crate::function::{Function, Param};
use crate::ins::{Imm, Ins, Opcode};
use crate::literal::{Literal, LiteralArray};
use crate::program::Program;
use crate::record::{Record, access};

use super::container::View;
use super::emitter::{EXPORT_ENTITIES_KEY, EmitOptions, effectively_static, emit};
use super::error::EmitError;

fn small_program() -> Program {
    let mut program = Program::new();
    program.add_record(Record::new("Mod", Dialect::Dynamic));

    let mut function = Function::new("entry", Dialect::Dynamic);
    function.regs_num = 2;
    function.ins = vec![
        Ins::with_id(Opcode::LdaStr, "hello"),
        Ins::new(Opcode::ReturnUndefined),
    ];
    program.add_function(function);
    program
}

#[test]
fn emits_a_parseable_container() {
    let bytes = emit(&small_program(), &EmitOptions::default()).unwrap();
    let view = View::parse(&bytes).unwrap();
    let header = view.header();

    // "Mod" plus the global pseudo-class for the record-less function.
    assert_eq!(header.classes_count, 2);
    assert_eq!(header.methods_count, 1);
    assert_eq!(header.code_count, 1);
    assert_eq!(header.debug_count, 1);
}

#[test]
fn debug_items_are_optional() {
    let options = EmitOptions {
        emit_debug_info: false,
        ..EmitOptions::default()
    };
    let bytes = emit(&small_program(), &options).unwrap();
    let view = View::parse(&bytes).unwrap();

    assert_eq!(view.header().debug_count, 0);
    assert_eq!(view.header().code_count, 1);
}

#[test]
fn unknown_base_record_aborts_the_emit() {
    let mut program = small_program();
    let mut record = Record::new("Derived", Dialect::Dynamic);
    record.metadata.base = Some("Nope".to_string());
    program.add_record(record);

    let err = emit(&program, &EmitOptions::default()).unwrap_err();
    assert!(matches!(err, EmitError::UnknownBase { referent, .. } if referent == "Nope"));
}

#[test]
fn unresolved_method_reference_is_a_missing_dependency() {
    // A literal array converts after the method tables are built; a method
    // name nothing registered must fail, not silently mis-index.
    let mut program = small_program();
    program.add_literal_array(
        "arr_0",
        LiteralArray::new(vec![Literal::method("ghost")]),
    );

    let err = emit(&program, &EmitOptions::default()).unwrap_err();
    assert!(matches!(err, EmitError::MissingIndexDependency { .. }));
}

#[test]
fn literal_arrays_can_reference_each_other() {
    let mut program = small_program();
    program.add_literal_array("arr_1", LiteralArray::new(vec![Literal::array_ref("arr_0")]));
    program.add_literal_array("arr_0", LiteralArray::new(vec![Literal::u32(1)]));

    let bytes = emit(&program, &EmitOptions::default()).unwrap();
    let view = View::parse(&bytes).unwrap();
    assert_eq!(view.header().literal_arrays_count, 2);
}

#[test]
fn static_classification_rules() {
    let mut instance = Function::new("Owner.m", Dialect::Static);
    instance.params.push(Param {
        ty: "Owner".to_string(),
    });
    assert!(!effectively_static(&instance));

    // Receiver type disagrees with the owner record.
    let mut mismatched = Function::new("Owner.m", Dialect::Static);
    mismatched.params.push(Param {
        ty: "Other".to_string(),
    });
    assert!(effectively_static(&mismatched));

    // Class initializers always go to the static table.
    let mut initializer = Function::new("Owner.cctor", Dialect::Static);
    initializer.params.push(Param {
        ty: "Owner".to_string(),
    });
    assert!(effectively_static(&initializer));

    let mut flagged = Function::new("Owner.s", Dialect::Static);
    flagged.params.push(Param {
        ty: "Owner".to_string(),
    });
    flagged.metadata.access_flags = access::STATIC;
    assert!(effectively_static(&flagged));
}

#[test]
fn export_entities_slots_are_patched_with_offsets() {
    let mut program = small_program();
    program.add_literal_array(
        EXPORT_ENTITIES_KEY,
        LiteralArray::new(vec![Literal::string("Mod"), Literal::string("plain")]),
    );

    let bytes = emit(&program, &EmitOptions::default()).unwrap();
    let view = View::parse(&bytes).unwrap();
    let sections = view.header().sections;

    let u32_at = |off: u32| {
        let i = off as usize;
        u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
    };

    let array_off = sections.literal_arrays;
    assert_eq!(u32_at(array_off), 2);

    // "Mod" names a class, so its slot holds a class item offset.
    let class_slot = u32_at(array_off + 4);
    assert!(class_slot >= sections.classes && class_slot < sections.fields);

    // "plain" is an ordinary string, so its slot holds a string offset.
    let string_slot = u32_at(array_off + 8);
    assert!(string_slot >= sections.strings && string_slot < sections.classes);
    assert_eq!(view.string_at(string_slot), Some("plain"));
}

#[test]
fn function_references_resolve_to_method_indices() {
    // definefunc resolves through the method tables built in stage 4, so a
    // function body may reference any method registered anywhere in the
    // program.
    let mut program = small_program();

    let mut helper = Function::new("helper", Dialect::Dynamic);
    helper.ins = vec![Ins::new(Opcode::ReturnUndefined)];
    program.add_function(helper);

    let mut define = Ins::with_id(Opcode::DefineFunc, "helper");
    define.imms.push(Imm::Int(0));
    let entry = program.functions.get_mut("entry").unwrap();
    entry.ins.insert(0, define);

    let bytes = emit(&program, &EmitOptions::default()).unwrap();
    let view = View::parse(&bytes).unwrap();
    assert_eq!(view.header().methods_count, 2);
    assert_eq!(view.header().code_count, 2);
}
