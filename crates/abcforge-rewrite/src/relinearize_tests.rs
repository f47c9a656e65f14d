//! Unit tests for re-linearization and operand patching.

use abcforge_asm::{Function, Ins, Opcode, Program};
use abcforge_core::Dialect;

use super::codec::{SectionKind, TableLayout};
use super::error::ModuleError;
use super::model::{ModuleId, ModuleSet};
use super::test_utils::{add_module, index_program, table_literals};

fn layout_of(program: &Program, set: &ModuleSet, module: ModuleId) -> TableLayout {
    let key = &set.module(module).table_key;
    TableLayout::compute(&program.literal_arrays[key], key).unwrap()
}

#[test]
fn removing_the_only_import_compacts_to_zero() {
    let mut program = index_program();
    let mut set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();

    set.remove_import(&mut program, index, 0).unwrap();
    assert!(set.needs_commit(&program, index));

    set.commit(&mut program, index).unwrap();

    let layout = layout_of(&program, &set, index);
    assert_eq!(layout.count(SectionKind::RegularImports), 0);
    let key = &set.module(index).table_key;
    assert!(!program.literal_arrays[key].has_tombstones());
    assert!(!set.needs_commit(&program, index));
}

#[test]
fn commit_without_changes_is_a_no_op() {
    let mut program = index_program();
    let mut set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();
    let key = set.module(index).table_key.clone();
    let before = program.literal_arrays[&key].clone();

    assert!(!set.needs_commit(&program, index));
    set.commit(&mut program, index).unwrap();

    assert_eq!(program.literal_arrays[&key], before);
}

#[test]
fn compaction_counts_match_survivors() {
    let mut program = index_program();
    let mut set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();
    let b = set.module_by_name("src/b").unwrap();

    for i in 0..4 {
        let local = format!("l{i}");
        set.add_local_export(&mut program, index, &local, &local)
            .unwrap();
    }
    set.add_regular_import(&mut program, index, b, "extra", "e")
        .unwrap();

    // Remove two local exports and the original import.
    set.remove_export(&mut program, index, 0).unwrap();
    set.remove_export(&mut program, index, 1).unwrap();
    set.remove_import(&mut program, index, 0).unwrap();

    set.commit(&mut program, index).unwrap();

    let layout = layout_of(&program, &set, index);
    assert_eq!(layout.count(SectionKind::LocalExports), 2);
    assert_eq!(layout.count(SectionKind::RegularImports), 1);

    let node = set.module(index);
    assert_eq!(node.exports.len(), 2);
    // Surviving descriptors are rebased onto compacted slots.
    assert_eq!(node.exports[0].entry_idx, Some(0));
    assert_eq!(node.exports[1].entry_idx, Some(1));
    assert_eq!(node.imports[0].entry_idx, 0);
}

#[test]
fn operands_are_patched_through_the_remap() {
    let mut program = index_program();
    let mut set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();
    let b = set.module_by_name("src/b").unwrap();

    // Slot 1 of both patched sections must survive and shift down.
    set.add_regular_import(&mut program, index, b, "keep", "k")
        .unwrap();
    set.add_local_export(&mut program, index, "drop", "drop")
        .unwrap();
    set.add_local_export(&mut program, index, "keep", "keep")
        .unwrap();

    let mut function = Function::new("src/index.func_main_0", Dialect::Dynamic);
    function.ins = vec![
        Ins::with_imm(Opcode::LdExternalModuleVar, 1),
        Ins::with_imm(Opcode::WideLdLocalModuleVar, 1),
        Ins::with_imm(Opcode::StModuleVar, 1),
        Ins::with_imm(Opcode::Ldai, 1), // not a module slot; untouched
    ];
    program.add_function(function);

    set.remove_import(&mut program, index, 0).unwrap();
    set.remove_export(&mut program, index, 0).unwrap();
    set.commit(&mut program, index).unwrap();

    let function = &program.functions["src/index.func_main_0"];
    assert_eq!(function.ins[0].module_slot(), Some(0));
    assert_eq!(function.ins[1].module_slot(), Some(0));
    assert_eq!(function.ins[2].module_slot(), Some(0));
    assert_eq!(function.ins[3].module_slot(), None);
}

#[test]
fn stale_operand_reference_is_reported() {
    let mut program = index_program();
    let mut set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();

    let mut function = Function::new("src/index.func_main_0", Dialect::Dynamic);
    function.ins = vec![Ins::with_imm(Opcode::LdExternalModuleVar, 0)];
    program.add_function(function);

    // The referenced import is removed, so the operand has no new slot.
    set.remove_import(&mut program, index, 0).unwrap();
    let err = set.commit(&mut program, index).unwrap_err();

    assert!(matches!(
        err,
        ModuleError::StaleOperandReference { slot: 0, .. }
    ));
}

#[test]
fn foreign_module_functions_are_left_alone() {
    let mut program = index_program();
    let mut set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();

    // Same opcode, different module; must not be patched or checked.
    let mut other = Function::new("src/other.f", Dialect::Dynamic);
    other.ins = vec![Ins::with_imm(Opcode::LdExternalModuleVar, 9)];
    program.add_function(other);

    set.remove_import(&mut program, index, 0).unwrap();
    set.commit(&mut program, index).unwrap();

    assert_eq!(
        program.functions["src/other.f"].ins[0].module_slot(),
        Some(9)
    );
}

#[test]
fn absolute_request_paths_are_relativized() {
    let mut program = Program::new();
    let table = table_literals(&["/src/b", "@pkg/log"], &[], &[("nsb", 0)], &[], &[], &[]);
    add_module(&mut program, "src/index", table, &[]);

    let mut set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();
    assert!(set.module(index).abs_paths);

    set.commit(&mut program, index).unwrap();

    let node = set.module(index);
    assert!(!node.abs_paths);
    assert_eq!(node.requests[0].path, "./b");
    assert_eq!(node.requests[1].path, "@pkg/log");

    let layout = layout_of(&program, &set, index);
    let key = &set.module(index).table_key;
    let array = &program.literal_arrays[key];
    let first = layout.entry_field(SectionKind::ModuleRequests, 0, 0);
    assert_eq!(array.literals[first].as_str(), Some("./b"));
    assert_eq!(array.literals[first + 1].as_str(), Some("@pkg/log"));
}

#[test]
fn service_star_slots_are_rebased() {
    let mut program = index_program();
    let mut set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();
    let a = set.module_by_name("src/a").unwrap();
    let b = set.module_by_name("src/b").unwrap();

    set.add_namespace_import(&mut program, index, a, "nsa")
        .unwrap();
    set.add_star_export(&mut program, index, b, Some("ns"))
        .unwrap();

    // Drop the plain namespace import in slot 0; the service import moves
    // from slot 1 to slot 0.
    let ns_index = set
        .module(index)
        .imports
        .iter()
        .position(|i| i.local_name == "nsa")
        .unwrap();
    set.remove_import(&mut program, index, ns_index).unwrap();
    set.commit(&mut program, index).unwrap();

    let star = set
        .module(index)
        .exports
        .iter()
        .find(|e| e.has_service_import)
        .unwrap();
    assert_eq!(star.service_namespace_import_idx, Some(0));

    let found = set.find_star_export(&program, index, "=ens0").unwrap();
    assert!(found.is_some());
}
