//! Re-linearization: compacting a mutated module table and patching
//! bytecode operands.
//!
//! Triggered at write-back when a module is dirty, still carries tombstones,
//! or still encodes its request strings as absolute paths. The instruction
//! patch pass always runs as part of a rebuild; it is never skipped
//! conditionally, so a count change can never leave a stale immediate
//! behind.

use std::collections::HashMap;

use abcforge_asm::{Literal, Program};
use tracing::debug;

use crate::codec::{SectionKind, TableLayout, decode_section, encode_section};
use crate::error::ModuleError;
use crate::model::{ExportKind, ImportKind, ModuleId, ModuleSet};
use crate::mutate::relative_request_path;

impl ModuleSet {
    /// Whether write-back must rebuild this module's table first.
    pub fn needs_commit(&self, program: &Program, module: ModuleId) -> bool {
        let node = self.module(module);
        if node.external {
            return false;
        }
        if node.dirty || node.abs_paths {
            return true;
        }
        program
            .literal_arrays
            .get(&node.table_key)
            .is_some_and(|array| array.has_tombstones())
    }

    /// Rebuild the module's packed table: relativize request paths, compact
    /// tombstones, patch every module-variable operand through the index
    /// remaps, and swap in the new literal sequence.
    pub fn commit(&mut self, program: &mut Program, module: ModuleId) -> Result<(), ModuleError> {
        if !self.needs_commit(program, module) {
            return Ok(());
        }
        let node = self.module(module);
        let table_key = node.table_key.clone();
        let module_name = node.name.clone();

        if node.abs_paths {
            self.relativize_requests(program, module, &table_key)?;
        }

        // Rebuild all six sections, collecting an old -> new map per
        // section.
        let array = program
            .literal_arrays
            .get(&table_key)
            .ok_or_else(|| ModuleError::malformed(&table_key, "module table array missing"))?;
        let layout = TableLayout::compute(array, &table_key)?;

        let mut rebuilt = Vec::with_capacity(array.literals.len());
        let mut remaps: HashMap<SectionKind, HashMap<u32, u32>> = HashMap::new();
        for kind in SectionKind::ALL {
            let entries = decode_section(array, &layout, kind, &table_key, false)?;
            let remap = encode_section(&entries, &mut rebuilt);
            remaps.insert(kind, remap);
        }

        let regular_map = &remaps[&SectionKind::RegularImports];
        let local_map = &remaps[&SectionKind::LocalExports];
        debug!(
            module = %module_name,
            regular_imports = regular_map.len(),
            local_exports = local_map.len(),
            "relinearized module table"
        );

        // Patch pass: every instruction of every function owned by this
        // module. Runs unconditionally as part of a rebuild.
        for function in program.functions.values_mut() {
            if function.owner_and_base().0 != Some(module_name.as_str()) {
                continue;
            }
            for ins in &mut function.ins {
                let Some(slot) = ins.module_slot() else {
                    continue;
                };
                let map = if ins.opcode.reads_local_export_slot() {
                    local_map
                } else {
                    regular_map
                };
                let new_slot =
                    map.get(&slot)
                        .copied()
                        .ok_or_else(|| ModuleError::StaleOperandReference {
                            function: function.name.clone(),
                            slot,
                        })?;
                ins.set_module_slot(new_slot);
            }
        }

        // Swap in the compacted sequence and rebase descriptor slots.
        let array = program
            .literal_arrays
            .get_mut(&table_key)
            .ok_or_else(|| ModuleError::malformed(&table_key, "module table array missing"))?;
        array.literals = rebuilt;

        let remap_slot = |kind: SectionKind, slot: u32| -> Result<u32, ModuleError> {
            remaps[&kind].get(&slot).copied().ok_or_else(|| {
                ModuleError::malformed(
                    &table_key,
                    format!("descriptor slot {slot} vanished from {}", kind.name()),
                )
            })
        };

        let node = &mut self.modules[module.index()];
        for import in &mut node.imports {
            let kind = match import.kind {
                ImportKind::Regular => SectionKind::RegularImports,
                ImportKind::Namespace => SectionKind::NamespaceImports,
            };
            import.entry_idx = remap_slot(kind, import.entry_idx)?;
        }
        for export in &mut node.exports {
            let kind = match export.kind {
                ExportKind::Local => SectionKind::LocalExports,
                ExportKind::Indirect => SectionKind::IndirectExports,
                ExportKind::Star => SectionKind::StarExports,
            };
            if let Some(entry) = export.entry_idx {
                export.entry_idx = Some(remap_slot(kind, entry)?);
            }
            if let Some(slot) = export.service_namespace_import_idx {
                export.service_namespace_import_idx =
                    Some(remap_slot(SectionKind::NamespaceImports, slot)?);
            }
        }

        node.dirty = false;
        node.abs_paths = false;
        Ok(())
    }

    /// Rewrite absolute request paths relative to the module's own
    /// directory; `@`-prefixed package identifiers are left untouched.
    fn relativize_requests(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        table_key: &str,
    ) -> Result<(), ModuleError> {
        let module_name = self.module(module).name.clone();
        let array = program
            .literal_arrays
            .get_mut(table_key)
            .ok_or_else(|| ModuleError::malformed(table_key, "module table array missing"))?;
        let layout = TableLayout::compute(array, table_key)?;

        for entry in 0..layout.count(SectionKind::ModuleRequests) {
            let offset = layout.entry_field(SectionKind::ModuleRequests, entry, 0);
            let Some(path) = array.literals.get(offset).and_then(|l| l.as_str()) else {
                continue; // tombstoned or malformed slots are left to decode
            };
            if path.starts_with('@') || !path.starts_with('/') {
                continue;
            }
            let relative = relative_request_path(&module_name, path.trim_start_matches('/'));
            array.literals[offset] = Literal::string(relative.clone());

            let node = &mut self.modules[module.index()];
            if let Some(request) = node.requests.get_mut(entry as usize) {
                request.path = relative;
            }
        }
        Ok(())
    }
}
