//! Human-readable module-table dump for debugging and tooling.

use std::fmt::Write as _;

use crate::model::{ExportKind, ImportKind, ModuleId, ModuleNode, ModuleSet};

/// Dump every module in the set, in arena order.
pub fn dump(set: &ModuleSet) -> String {
    let mut out = String::new();
    for id in 0..set.modules.len() {
        if id > 0 {
            out.push('\n');
        }
        out.push_str(&dump_module(set, ModuleId(id as u32)));
    }
    out
}

/// Dump one module's request, import, and export tables.
pub fn dump_module(set: &ModuleSet, module: ModuleId) -> String {
    let node = set.module(module);
    let mut out = String::new();

    writeln!(out, "[module {}]", node.name).unwrap();
    writeln!(out, "dialect = {}", node.dialect.name()).unwrap();
    if node.external {
        writeln!(out, "external = true").unwrap();
        return out;
    }

    writeln!(out, "requests:").unwrap();
    for (i, request) in node.requests.iter().enumerate() {
        writeln!(out, "  {i}: {}", request.path).unwrap();
    }

    writeln!(out, "imports:").unwrap();
    for (i, import) in node.imports.iter().enumerate() {
        match import.kind {
            ImportKind::Regular => {
                let name = import.imported_name.as_deref().unwrap_or("?");
                writeln!(
                    out,
                    "  {i}: regular {} <- {} from {}",
                    import.local_name,
                    name,
                    request_path(node, import.request_idx)
                )
                .unwrap();
            }
            ImportKind::Namespace => {
                writeln!(
                    out,
                    "  {i}: namespace {} from {}",
                    import.local_name,
                    request_path(node, import.request_idx)
                )
                .unwrap();
            }
        }
    }

    writeln!(out, "exports:").unwrap();
    for (i, export) in node.exports.iter().enumerate() {
        match export.kind {
            ExportKind::Local => {
                writeln!(
                    out,
                    "  {i}: local {} as {}",
                    export.local_name.as_deref().unwrap_or("?"),
                    export.export_name.as_deref().unwrap_or("?")
                )
                .unwrap();
            }
            ExportKind::Indirect => {
                let from = export
                    .request_idx
                    .map(|r| request_path(node, r))
                    .unwrap_or("?");
                writeln!(
                    out,
                    "  {i}: indirect {} <- {} from {from}",
                    export.export_name.as_deref().unwrap_or("?"),
                    export.import_name.as_deref().unwrap_or("?")
                )
                .unwrap();
            }
            ExportKind::Star => {
                let from = export
                    .request_idx
                    .map(|r| request_path(node, r))
                    .unwrap_or("?");
                if export.has_service_import {
                    writeln!(
                        out,
                        "  {i}: star as {} via {} from {from}",
                        export.export_name.as_deref().unwrap_or("?"),
                        export.service_name.as_deref().unwrap_or("?")
                    )
                    .unwrap();
                } else {
                    writeln!(out, "  {i}: star from {from}").unwrap();
                }
            }
        }
    }

    out
}

fn request_path(node: &ModuleNode, request: u16) -> &str {
    node.requests
        .get(request as usize)
        .map(|r| r.path.as_str())
        .unwrap_or("?")
}
