use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use sce_core::{Command, ListElement, ParamValue, SceError, ScriptType};
use sce_runtime::decode_all;

use crate::run::load_pack;
use crate::DisasmArgs;

pub(crate) fn disasm(args: &DisasmArgs, out: &mut dyn Write) -> Result<i32> {
    let pack = load_pack(&args.pack)?;
    let script_type = ScriptType::from(args.script_type);
    let block = pack.block(script_type, args.script).ok_or_else(|| {
        SceError::new(
            "CLI_SCRIPT_NOT_FOUND",
            format!("{} script {} is not in the pack.", script_type, args.script),
        )
    })?;

    let mut labels_at: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    if let Some(labels) = pack.labels.get(&(script_type, args.script)) {
        for (name, offset) in labels {
            labels_at.entry(*offset).or_default().push(name);
        }
    }

    writeln!(
        out,
        "; {} script {} \"{}\" ({} bytes, {:?})",
        script_type,
        block.id,
        block.description,
        block.bytecode.len(),
        block.codepage
    )?;
    let commands = decode_all(&block.bytecode, pack.table(), block.codepage)
        .with_context(|| format!("decoding {} script {}", script_type, block.id))?;
    for (position, command) in commands {
        for name in labels_at.get(&position).into_iter().flatten() {
            writeln!(out, "{}:", name)?;
        }
        writeln!(out, "{}", disasm_line(position, &command))?;
    }
    Ok(0)
}

pub(crate) fn disasm_line(position: usize, command: &Command) -> String {
    let mut line = format!("{:06} {:>3} {}", position, command.opcode, command.name);
    for param in &command.params {
        line.push(' ');
        line.push_str(&format_param(param));
    }
    line
}

fn format_param(param: &ParamValue) -> String {
    match param {
        ParamValue::Variable(id) => format!("${}", id),
        ParamValue::I8(value) => value.to_string(),
        ParamValue::U8(value) => value.to_string(),
        ParamValue::I16(value) => value.to_string(),
        ParamValue::U16(value) => value.to_string(),
        ParamValue::I32(value) => value.to_string(),
        ParamValue::U32(value) => value.to_string(),
        ParamValue::F32(value) => format!("{:?}", value),
        ParamValue::String(text) => format!("{:?}", text),
        ParamValue::List(items) => {
            let items = items.iter().map(format_element).collect::<Vec<_>>();
            format!("[{}]", items.join(", "))
        }
    }
}

fn format_element(element: &ListElement) -> String {
    match element {
        ListElement::Int(value) => value.to_string(),
        ListElement::Float(value) => format!("{:?}", value),
        ListElement::TaggedInt(value) => format!("#{}", value),
        ListElement::String(text) => format!("{:?}", text),
        ListElement::U16(value) => format!("{}u16", value),
    }
}

#[cfg(test)]
mod disasm_tests {
    use super::*;

    #[test]
    fn disasm_line_marks_variables_and_formats_literals() {
        let command = Command {
            opcode: 72,
            name: "TreasureBoxOpen",
            var_mask: 0b01,
            params: vec![
                ParamValue::Variable(-4),
                ParamValue::List(vec![
                    ListElement::Int(1),
                    ListElement::Float(2.5),
                    ListElement::TaggedInt(3),
                    ListElement::String("key".to_string()),
                    ListElement::U16(9),
                ]),
            ],
        };
        assert_eq!(
            disasm_line(12, &command),
            "000012  72 TreasureBoxOpen $-4 [1, 2.5, #3, \"key\", 9u16]"
        );
    }

    #[test]
    fn disasm_line_without_params_has_no_trailing_space() {
        let command = Command {
            opcode: 50,
            name: "CameraFadeIn",
            var_mask: 0,
            params: Vec::new(),
        };
        assert_eq!(disasm_line(0, &command), "000000  50 CameraFadeIn");
    }
}
