//! Structural edits of module tables.
//!
//! Adds append entries at the end of their section (keeping entries
//! contiguous) and bump the section count; removes tombstone the entry's
//! first literal and erase the in-memory descriptor. Nothing is mutated when
//! an operation fails. Compaction is deferred to re-linearization.

use abcforge_asm::{Literal, Program};
use abcforge_core::Dialect;
use tracing::debug;

use crate::codec::{SectionKind, TableLayout, decode_section};
use crate::error::ModuleError;
use crate::hierarchy::SERVICE_EXPORT_PREFIX;
use crate::model::{
    ExportDescriptor, ExportKind, ImportDescriptor, ImportKind, ModuleId, ModuleRequest, ModuleSet,
};

impl ModuleSet {
    /// Add a regular import of `imported` from `target`, bound as `local`.
    pub fn add_regular_import(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        target: ModuleId,
        local: &str,
        imported: &str,
    ) -> Result<(), ModuleError> {
        self.check_mutable(module)?;
        let request = self.ensure_request(program, module, target)?;

        let table_key = self.module(module).table_key.clone();
        let entry = insert_entry(
            program,
            &table_key,
            SectionKind::RegularImports,
            vec![
                Literal::string(local),
                Literal::string(imported),
                Literal::affiliate(request),
            ],
        )?;

        let node = self.module_mut(module);
        node.imports.push(ImportDescriptor {
            kind: ImportKind::Regular,
            local_name: local.to_string(),
            imported_name: Some(imported.to_string()),
            request_idx: request,
            target: Some(target),
            entry_idx: entry,
        });
        node.dirty = true;
        Ok(())
    }

    /// Add a namespace import of `target`, bound as `local`.
    pub fn add_namespace_import(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        target: ModuleId,
        local: &str,
    ) -> Result<(), ModuleError> {
        self.check_mutable(module)?;
        let request = self.ensure_request(program, module, target)?;

        let table_key = self.module(module).table_key.clone();
        let entry = insert_entry(
            program,
            &table_key,
            SectionKind::NamespaceImports,
            vec![Literal::string(local), Literal::affiliate(request)],
        )?;

        let node = self.module_mut(module);
        node.imports.push(ImportDescriptor {
            kind: ImportKind::Namespace,
            local_name: local.to_string(),
            imported_name: None,
            request_idx: request,
            target: Some(target),
            entry_idx: entry,
        });
        node.dirty = true;
        Ok(())
    }

    /// Export the locally defined `local` under `export`.
    pub fn add_local_export(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        local: &str,
        export: &str,
    ) -> Result<(), ModuleError> {
        self.check_mutable(module)?;

        let table_key = self.module(module).table_key.clone();
        let entry = insert_entry(
            program,
            &table_key,
            SectionKind::LocalExports,
            vec![Literal::string(local), Literal::string(export)],
        )?;

        let node = self.module_mut(module);
        node.exports.push(ExportDescriptor {
            kind: ExportKind::Local,
            local_name: Some(local.to_string()),
            export_name: Some(export.to_string()),
            import_name: None,
            request_idx: None,
            target: None,
            entry_idx: Some(entry),
            has_service_import: false,
            service_namespace_import_idx: None,
            service_name: None,
        });
        node.dirty = true;
        Ok(())
    }

    /// Re-export `import` from `target` under `export`.
    pub fn add_indirect_export(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        target: ModuleId,
        export: &str,
        import: &str,
    ) -> Result<(), ModuleError> {
        self.check_mutable(module)?;
        let request = self.ensure_request(program, module, target)?;

        let table_key = self.module(module).table_key.clone();
        let entry = insert_entry(
            program,
            &table_key,
            SectionKind::IndirectExports,
            vec![
                Literal::string(export),
                Literal::string(import),
                Literal::affiliate(request),
            ],
        )?;

        let node = self.module_mut(module);
        node.exports.push(ExportDescriptor {
            kind: ExportKind::Indirect,
            local_name: None,
            export_name: Some(export.to_string()),
            import_name: Some(import.to_string()),
            request_idx: Some(request),
            target: Some(target),
            entry_idx: Some(entry),
            has_service_import: false,
            service_namespace_import_idx: None,
            service_name: None,
        });
        node.dirty = true;
        Ok(())
    }

    /// Re-export all of `target`'s exports.
    ///
    /// With an alias this is not stored as a star entry: it synthesizes a
    /// fresh `=ens<N>` service name, a local export of that service name
    /// under the alias, and a namespace import of `target` bound to the
    /// service name.
    pub fn add_star_export(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        target: ModuleId,
        alias: Option<&str>,
    ) -> Result<(), ModuleError> {
        self.check_mutable(module)?;
        let request = self.ensure_request(program, module, target)?;
        let table_key = self.module(module).table_key.clone();

        let Some(alias) = alias else {
            let entry = insert_entry(
                program,
                &table_key,
                SectionKind::StarExports,
                vec![Literal::affiliate(request)],
            )?;
            let node = self.module_mut(module);
            node.exports.push(ExportDescriptor {
                kind: ExportKind::Star,
                local_name: None,
                export_name: None,
                import_name: None,
                request_idx: Some(request),
                target: Some(target),
                entry_idx: Some(entry),
                has_service_import: false,
                service_namespace_import_idx: None,
                service_name: None,
            });
            node.dirty = true;
            return Ok(());
        };

        let service = self.next_service_name(module);
        debug!(module = %self.module(module).name, service = %service, alias, "synthesizing service import");

        insert_entry(
            program,
            &table_key,
            SectionKind::LocalExports,
            vec![Literal::string(&service), Literal::string(alias)],
        )?;
        let ns_slot = insert_entry(
            program,
            &table_key,
            SectionKind::NamespaceImports,
            vec![Literal::string(&service), Literal::affiliate(request)],
        )?;

        let node = self.module_mut(module);
        node.exports.push(ExportDescriptor {
            kind: ExportKind::Star,
            local_name: None,
            export_name: Some(alias.to_string()),
            import_name: None,
            request_idx: Some(request),
            target: Some(target),
            entry_idx: None,
            has_service_import: true,
            service_namespace_import_idx: Some(ns_slot),
            service_name: Some(service),
        });
        node.dirty = true;
        Ok(())
    }

    /// Remove the import at `index` in the module's import list.
    pub fn remove_import(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        index: usize,
    ) -> Result<(), ModuleError> {
        self.check_mutable(module)?;
        let node = self.module(module);
        let Some(import) = node.imports.get(index) else {
            return Err(ModuleError::BadArgument(format!(
                "module `{}` has no import {index}",
                node.name
            )));
        };

        let kind = match import.kind {
            ImportKind::Regular => SectionKind::RegularImports,
            ImportKind::Namespace => SectionKind::NamespaceImports,
        };
        let table_key = node.table_key.clone();
        let entry = import.entry_idx;
        tombstone_entry(program, &table_key, kind, entry)?;

        let node = self.module_mut(module);
        node.imports.remove(index);
        node.dirty = true;
        Ok(())
    }

    /// Remove the export at `index` in the module's export list.
    ///
    /// A star export realized through a service import tombstones both
    /// halves of the synthesized pair.
    pub fn remove_export(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        index: usize,
    ) -> Result<(), ModuleError> {
        self.check_mutable(module)?;
        let node = self.module(module);
        let Some(export) = node.exports.get(index) else {
            return Err(ModuleError::BadArgument(format!(
                "module `{}` has no export {index}",
                node.name
            )));
        };
        let table_key = node.table_key.clone();

        match (export.kind, export.entry_idx) {
            (ExportKind::Local, Some(entry)) => {
                tombstone_entry(program, &table_key, SectionKind::LocalExports, entry)?;
            }
            (ExportKind::Indirect, Some(entry)) => {
                tombstone_entry(program, &table_key, SectionKind::IndirectExports, entry)?;
            }
            (ExportKind::Star, Some(entry)) => {
                tombstone_entry(program, &table_key, SectionKind::StarExports, entry)?;
            }
            (ExportKind::Star, None) => {
                let service = export
                    .service_name
                    .clone()
                    .ok_or_else(|| ModuleError::BadArgument("service star export lost its service name".to_string()))?;
                let ns_slot = export.service_namespace_import_idx.ok_or_else(|| {
                    ModuleError::BadArgument("service star export lost its import slot".to_string())
                })?;
                // Locate the service local export before touching anything.
                let local_entry = find_service_local_export(program, &table_key, &service)?;
                tombstone_entry(program, &table_key, SectionKind::NamespaceImports, ns_slot)?;
                tombstone_entry(program, &table_key, SectionKind::LocalExports, local_entry)?;
            }
            (_, None) => {
                return Err(ModuleError::BadArgument(
                    "export descriptor has no table slot".to_string(),
                ));
            }
        }

        let node = self.module_mut(module);
        node.exports.remove(index);
        node.dirty = true;
        Ok(())
    }

    /// Join a service name back to its owning star-export descriptor by
    /// scanning the module's export descriptors for a namespace-import slot
    /// whose local-name literal matches.
    pub fn find_star_export(
        &self,
        program: &Program,
        module: ModuleId,
        service_name: &str,
    ) -> Result<Option<usize>, ModuleError> {
        let node = self.module(module);
        let array = program
            .literal_arrays
            .get(&node.table_key)
            .ok_or_else(|| ModuleError::malformed(&node.table_key, "module table array missing"))?;
        let layout = TableLayout::compute(array, &node.table_key)?;

        for (index, export) in node.exports.iter().enumerate() {
            if !export.has_service_import {
                continue;
            }
            let Some(slot) = export.service_namespace_import_idx else {
                continue;
            };
            let offset = layout.entry_field(SectionKind::NamespaceImports, slot, 0);
            if array.literals.get(offset).and_then(|l| l.as_str()) == Some(service_name) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Resolve or create the module-request slot for `target`.
    fn ensure_request(
        &mut self,
        program: &mut Program,
        module: ModuleId,
        target: ModuleId,
    ) -> Result<u16, ModuleError> {
        let node = self.module(module);
        if let Some(found) = node
            .requests
            .iter()
            .position(|r| r.target == Some(target))
        {
            return Ok(found as u16);
        }

        let path = relative_request_path(&node.name, &self.module(target).name);
        let table_key = node.table_key.clone();
        insert_entry(
            program,
            &table_key,
            SectionKind::ModuleRequests,
            vec![Literal::string(&path)],
        )?;

        let node = self.module_mut(module);
        node.requests.push(ModuleRequest {
            path,
            target: Some(target),
        });
        Ok((node.requests.len() - 1) as u16)
    }

    /// `=ens<N>` with N one past the highest existing service index.
    fn next_service_name(&self, module: ModuleId) -> String {
        let next = self
            .module(module)
            .exports
            .iter()
            .filter_map(|e| e.service_name.as_deref())
            .filter_map(|name| name.strip_prefix(SERVICE_EXPORT_PREFIX))
            .filter_map(|digits| digits.parse::<u32>().ok())
            .map(|n| n + 1)
            .max()
            .unwrap_or(0);
        format!("{SERVICE_EXPORT_PREFIX}{next}")
    }

    fn check_mutable(&self, module: ModuleId) -> Result<(), ModuleError> {
        let node = self.module(module);
        if node.external {
            return Err(ModuleError::BadArgument(format!(
                "module `{}` is external and has no table",
                node.name
            )));
        }
        match node.dialect {
            Dialect::Dynamic => Ok(()),
            Dialect::Static => Err(ModuleError::BadArgument(format!(
                "module `{}` uses the static dialect; its tables are managed by the static linker",
                node.name
            ))),
        }
    }
}

/// Append an entry at the end of its section and bump the count literal.
/// Returns the new entry's physical index.
fn insert_entry(
    program: &mut Program,
    table_key: &str,
    kind: SectionKind,
    fields: Vec<Literal>,
) -> Result<u32, ModuleError> {
    debug_assert_eq!(fields.len(), kind.field_width());

    let array = program
        .literal_arrays
        .get_mut(table_key)
        .ok_or_else(|| ModuleError::malformed(table_key, "module table array missing"))?;
    let layout = TableLayout::compute(array, table_key)?;

    let entry = layout.count(kind);
    let position = layout.end(kind);
    array.literals.splice(position..position, fields);
    array.literals[layout.count_index(kind)] = Literal::u32(entry + 1);
    Ok(entry)
}

/// Overwrite the first literal of an entry group with the tombstone
/// sentinel; the remaining fields are compacted away at re-linearization.
fn tombstone_entry(
    program: &mut Program,
    table_key: &str,
    kind: SectionKind,
    entry: u32,
) -> Result<(), ModuleError> {
    let array = program
        .literal_arrays
        .get_mut(table_key)
        .ok_or_else(|| ModuleError::malformed(table_key, "module table array missing"))?;
    let layout = TableLayout::compute(array, table_key)?;

    let offset = layout.entry_field(kind, entry, 0);
    let literal = array.literals.get_mut(offset).ok_or_else(|| {
        ModuleError::malformed(table_key, format!("entry {entry} out of range"))
    })?;
    *literal = Literal::null();
    Ok(())
}

/// Physical index of the live local-export entry carrying a service name.
fn find_service_local_export(
    program: &Program,
    table_key: &str,
    service: &str,
) -> Result<u32, ModuleError> {
    let array = program
        .literal_arrays
        .get(table_key)
        .ok_or_else(|| ModuleError::malformed(table_key, "module table array missing"))?;
    let layout = TableLayout::compute(array, table_key)?;

    decode_section(array, &layout, SectionKind::LocalExports, table_key, true)?
        .into_iter()
        .find(|entry| entry.fields[0].as_str() == Some(service))
        .map(|entry| entry.index)
        .ok_or_else(|| {
            ModuleError::malformed(
                table_key,
                format!("service export `{service}` has no local-export entry"),
            )
        })
}

/// Request string for `target` relative to the importing module's
/// directory. `@`-prefixed package identifiers pass through untouched.
pub(crate) fn relative_request_path(from_module: &str, target: &str) -> String {
    if target.starts_with('@') {
        return target.to_string();
    }

    let from_dir: Vec<&str> = {
        let mut parts: Vec<&str> = from_module.split('/').collect();
        parts.pop();
        parts
    };
    let target_parts: Vec<&str> = target.split('/').collect();

    let common = from_dir
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let ups = from_dir.len() - common;
    let rest = target_parts[common..].join("/");

    if ups == 0 {
        format!("./{rest}")
    } else {
        format!("{}{rest}", "../".repeat(ups))
    }
}
