//! Per-function bytecode encoding.
//!
//! Translates a symbolic instruction list into raw bytes, resolving labels
//! to bytecode offsets and symbolic ids against the container's index
//! tables. Also derives the per-instruction line/column records and the
//! try/catch range table.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::function::Function;
use crate::ins::{Format, Imm, Ins};

use super::container::ItemContainer;
use super::error::{DependencyKind, EmitError};
use super::items::{CatchItem, TryBlockItem};

/// Encoded size of one instruction: opcode byte plus operands.
pub fn ins_size(ins: &Ins) -> usize {
    1 + ins.opcode.format().operand_size()
}

/// Total encoded size of a function body.
pub fn body_size(function: &Function) -> u32 {
    function.ins.iter().map(|i| ins_size(i) as u32).sum()
}

/// Catch-handler counts per try block, grouped by identical try-range label
/// pair in declaration order. Fixes the code item's try-table size before
/// encoding happens.
pub fn try_shape(function: &Function) -> Vec<u8> {
    let mut groups: IndexMap<(&str, &str), u8> = IndexMap::new();
    for block in &function.catch_blocks {
        *groups
            .entry((&block.try_begin_label, &block.try_end_label))
            .or_default() += 1;
    }
    groups.into_values().collect()
}

/// Result of encoding one function body.
#[derive(Debug)]
pub struct EncodedBody {
    pub bytes: Vec<u8>,
    /// (pc, line, column) per instruction.
    pub lines: Vec<(u32, u32, u32)>,
    pub try_blocks: Vec<TryBlockItem>,
}

/// Encode a function body against the container's index tables.
///
/// Every id referenced here must already be registered; a miss is a
/// `MissingIndexDependency` and aborts the whole emit.
pub fn encode_function(
    function: &Function,
    container: &ItemContainer,
) -> Result<EncodedBody, EmitError> {
    let label_pcs = collect_labels(function);

    let mut bytes = Vec::with_capacity(body_size(function) as usize);
    let mut lines = Vec::with_capacity(function.ins.len());
    let mut pc = 0u32;

    for ins in &function.ins {
        lines.push((pc, ins.debug.line, ins.debug.column));
        encode_ins(ins, pc, function, container, &label_pcs, &mut bytes)?;
        pc += ins_size(ins) as u32;
    }

    let try_blocks = build_try_blocks(function, container, &label_pcs)?;

    Ok(EncodedBody {
        bytes,
        lines,
        try_blocks,
    })
}

fn collect_labels(function: &Function) -> HashMap<&str, u32> {
    let mut pcs = HashMap::new();
    let mut pc = 0u32;
    for ins in &function.ins {
        if let Some(label) = &ins.label {
            pcs.insert(label.as_str(), pc);
        }
        pc += ins_size(ins) as u32;
    }
    pcs
}

fn encode_ins(
    ins: &Ins,
    pc: u32,
    function: &Function,
    container: &ItemContainer,
    label_pcs: &HashMap<&str, u32>,
    out: &mut Vec<u8>,
) -> Result<(), EmitError> {
    out.push(ins.opcode.byte());

    match ins.opcode.format() {
        Format::None => {}
        Format::Imm8 => {
            let imm = int_imm(ins, function, 0)?;
            out.push(imm as u8);
        }
        Format::Imm16 => {
            let imm = int_imm(ins, function, 0)?;
            out.extend_from_slice(&(imm as u16).to_le_bytes());
        }
        Format::Reg8 => {
            let reg = reg(ins, function, 0)?;
            out.push(reg as u8);
        }
        Format::Reg8Reg8 => {
            out.push(reg(ins, function, 0)? as u8);
            out.push(reg(ins, function, 1)? as u8);
        }
        Format::Id16 => {
            let id = resolve_id(ins, function, container)?;
            out.extend_from_slice(&id.to_le_bytes());
        }
        Format::Id16Imm8 => {
            let id = resolve_id(ins, function, container)?;
            out.extend_from_slice(&id.to_le_bytes());
            out.push(int_imm(ins, function, 0)? as u8);
        }
        Format::Jump32 => {
            let target = ins.target.as_deref().unwrap_or("");
            let Some(&target_pc) = label_pcs.get(target) else {
                return Err(EmitError::UndefinedLabel {
                    label: target.to_string(),
                    function: function.name.clone(),
                });
            };
            let rel = target_pc as i64 - pc as i64;
            out.extend_from_slice(&(rel as i32).to_le_bytes());
        }
        Format::Imm64 => {
            let imm = int_imm(ins, function, 0)?;
            out.extend_from_slice(&imm.to_le_bytes());
        }
        Format::FImm64 => {
            let imm = match ins.imms.first() {
                Some(Imm::Float(v)) => *v,
                Some(Imm::Int(v)) => *v as f64,
                None => {
                    return Err(internal(function, ins, "missing float immediate"));
                }
            };
            out.extend_from_slice(&imm.to_bits().to_le_bytes());
        }
    }

    Ok(())
}

fn int_imm(ins: &Ins, function: &Function, idx: usize) -> Result<i64, EmitError> {
    match ins.imms.get(idx) {
        Some(Imm::Int(v)) => Ok(*v),
        _ => Err(internal(function, ins, "missing integer immediate")),
    }
}

fn reg(ins: &Ins, function: &Function, idx: usize) -> Result<u16, EmitError> {
    ins.regs
        .get(idx)
        .copied()
        .ok_or_else(|| internal(function, ins, "missing register operand"))
}

/// Resolve the id operand to its 16-bit table index.
fn resolve_id(ins: &Ins, function: &Function, container: &ItemContainer) -> Result<u16, EmitError> {
    let Some(name) = ins.ids.first() else {
        return Err(internal(function, ins, "missing id operand"));
    };
    let context = format!("function `{}`", function.name);

    if ins.opcode.id_is_method() {
        return container
            .method_id(name)
            .map(|id| id.get())
            .ok_or_else(|| EmitError::missing(DependencyKind::Method, name, &context));
    }
    if ins.opcode.id_is_literal_array() {
        return container
            .literal_array_id(name)
            .map(|id| id.get())
            .ok_or_else(|| EmitError::missing(DependencyKind::LiteralArray, name, &context));
    }
    if ins.opcode.id_is_string() {
        return container
            .string_id(name)
            .map(|id| id.get())
            .ok_or_else(|| EmitError::missing(DependencyKind::String, name, &context));
    }
    Err(internal(function, ins, "opcode has no id operand"))
}

fn internal(function: &Function, ins: &Ins, message: &str) -> EmitError {
    EmitError::Internal {
        function: function.name.clone(),
        message: format!("{message} in `{}`", ins.opcode.mnemonic()),
    }
}

/// Build the try/catch table: one try block per distinct begin/end label
/// pair, handlers in declaration order.
fn build_try_blocks(
    function: &Function,
    container: &ItemContainer,
    label_pcs: &HashMap<&str, u32>,
) -> Result<Vec<TryBlockItem>, EmitError> {
    let mut groups: IndexMap<(&str, &str), TryBlockItem> = IndexMap::new();

    for block in &function.catch_blocks {
        let start_pc = try_label_pc(&block.try_begin_label, function, label_pcs)?;
        let end_pc = try_label_pc(&block.try_end_label, function, label_pcs)?;
        let handler_pc = try_label_pc(&block.catch_begin_label, function, label_pcs)?;

        let exception = match &block.exception_record {
            Some(record) => Some(container.class_id(record).ok_or_else(|| {
                EmitError::missing(
                    DependencyKind::Class,
                    record,
                    &format!("catch block of `{}`", function.name),
                )
            })?),
            None => None,
        };

        let entry = groups
            .entry((&block.try_begin_label, &block.try_end_label))
            .or_insert_with(|| TryBlockItem {
                start_pc,
                length: end_pc.saturating_sub(start_pc),
                catches: Vec::new(),
            });
        entry.catches.push(CatchItem {
            exception,
            handler_pc,
        });
    }

    Ok(groups.into_values().collect())
}

fn try_label_pc(
    label: &str,
    function: &Function,
    label_pcs: &HashMap<&str, u32>,
) -> Result<u32, EmitError> {
    label_pcs
        .get(label)
        .copied()
        .ok_or_else(|| EmitError::UndefinedTryLabel {
            label: label.to_string(),
            function: function.name.clone(),
        })
}
