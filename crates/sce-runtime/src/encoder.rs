use sce_core::{Codepage, Command, ListElement, ParamValue, SceError};

use crate::descriptor::{CommandDescriptor, DescriptorTable, ParamKind};

#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }
}

/// Writes `command` in the exact layout `decode_next` reads back.
pub fn encode(
    writer: &mut ByteWriter,
    table: &DescriptorTable,
    command: &Command,
    codepage: Codepage,
) -> Result<(), SceError> {
    let descriptor = table.lookup(command.opcode)?;
    validate(descriptor, command)?;

    writer.write_u16(command.opcode);
    writer.write_u16(command.var_mask);
    for (slot, (kind, value)) in descriptor.params.iter().zip(&command.params).enumerate() {
        match value {
            ParamValue::Variable(id) => writer.write_i16(*id),
            literal => encode_literal(writer, *kind, literal, codepage)
                .map_err(|error| slot_error(descriptor, slot, error))?,
        }
    }
    Ok(())
}

/// Concatenates encoded commands into one script block.
pub fn encode_script(
    table: &DescriptorTable,
    commands: &[Command],
    codepage: Codepage,
) -> Result<Vec<u8>, SceError> {
    let mut writer = ByteWriter::new();
    for command in commands {
        encode(&mut writer, table, command, codepage)?;
    }
    Ok(writer.into_bytes())
}

pub fn encoded_len(
    table: &DescriptorTable,
    command: &Command,
    codepage: Codepage,
) -> Result<usize, SceError> {
    let mut writer = ByteWriter::new();
    encode(&mut writer, table, command, codepage)?;
    Ok(writer.position())
}

/// Builds a validated command by descriptor name.
pub fn build_command(
    table: &DescriptorTable,
    name: &str,
    var_mask: u16,
    params: Vec<ParamValue>,
) -> Result<Command, SceError> {
    let descriptor = table.by_name(name).ok_or_else(|| {
        SceError::new(
            "ENCODE_COMMAND_UNKNOWN",
            format!(
                "Command \"{}\" is not part of the {:?} instruction set.",
                name,
                table.instruction_set()
            ),
        )
    })?;
    let command = Command {
        opcode: descriptor.opcode,
        name: descriptor.name,
        var_mask,
        params,
    };
    validate(descriptor, &command)?;
    Ok(command)
}

fn validate(descriptor: &CommandDescriptor, command: &Command) -> Result<(), SceError> {
    if command.params.len() != descriptor.params.len() {
        return Err(SceError::new(
            "ENCODE_ARITY_MISMATCH",
            format!(
                "{} takes {} parameters, got {}.",
                descriptor.name,
                descriptor.params.len(),
                command.params.len()
            ),
        ));
    }
    for (slot, (kind, value)) in descriptor.params.iter().zip(&command.params).enumerate() {
        let flagged = command.is_variable_slot(slot);
        let matches = match value {
            ParamValue::Variable(_) => flagged,
            literal => !flagged && literal_matches(*kind, literal),
        };
        if !matches {
            return Err(SceError::new(
                "ENCODE_PARAM_KIND_MISMATCH",
                format!(
                    "{} slot {} expects {}{}, got {}.",
                    descriptor.name,
                    slot,
                    if flagged { "a variable reference for " } else { "" },
                    kind.name(),
                    value.type_name()
                ),
            ));
        }
    }
    Ok(())
}

fn literal_matches(kind: ParamKind, value: &ParamValue) -> bool {
    matches!(
        (kind, value),
        (ParamKind::I8, ParamValue::I8(_))
            | (ParamKind::U8, ParamValue::U8(_))
            | (ParamKind::I16, ParamValue::I16(_))
            | (ParamKind::U16, ParamValue::U16(_))
            | (ParamKind::I32, ParamValue::I32(_))
            | (ParamKind::U32, ParamValue::U32(_))
            | (ParamKind::F32, ParamValue::F32(_))
            | (ParamKind::String, ParamValue::String(_))
            | (ParamKind::List, ParamValue::List(_))
    )
}

fn slot_error(descriptor: &CommandDescriptor, slot: usize, error: SceError) -> SceError {
    SceError::new(
        error.code,
        format!("{} slot {}: {}", descriptor.name, slot, error.message),
    )
}

fn encode_literal(
    writer: &mut ByteWriter,
    kind: ParamKind,
    value: &ParamValue,
    codepage: Codepage,
) -> Result<(), SceError> {
    match (kind, value) {
        (ParamKind::I8, ParamValue::I8(value)) => writer.write_i8(*value),
        (ParamKind::U8, ParamValue::U8(value)) => writer.write_u8(*value),
        (ParamKind::I16, ParamValue::I16(value)) => writer.write_i16(*value),
        (ParamKind::U16, ParamValue::U16(value)) => writer.write_u16(*value),
        (ParamKind::I32, ParamValue::I32(value)) => writer.write_i32(*value),
        (ParamKind::U32, ParamValue::U32(value)) => writer.write_u32(*value),
        (ParamKind::F32, ParamValue::F32(value)) => writer.write_f32(*value),
        (ParamKind::String, ParamValue::String(text)) => encode_string(writer, text, codepage)?,
        (ParamKind::List, ParamValue::List(elements)) => encode_list(writer, elements, codepage)?,
        (kind, value) => {
            return Err(SceError::new(
                "ENCODE_PARAM_KIND_MISMATCH",
                format!("expected {}, got {}", kind.name(), value.type_name()),
            ))
        }
    }
    Ok(())
}

fn encode_string(writer: &mut ByteWriter, text: &str, codepage: Codepage) -> Result<(), SceError> {
    let bytes = codepage.encode(text)?;
    let length = u16::try_from(bytes.len()).map_err(|_| {
        SceError::new(
            "ENCODE_STRING_TOO_LONG",
            format!("string of {} bytes exceeds the u16 length prefix", bytes.len()),
        )
    })?;
    writer.write_u16(length);
    writer.write_bytes(&bytes);
    Ok(())
}

// Decoding reverses element order, so elements go out back to front.
fn encode_list(
    writer: &mut ByteWriter,
    elements: &[ListElement],
    codepage: Codepage,
) -> Result<(), SceError> {
    let count = u16::try_from(elements.len()).map_err(|_| {
        SceError::new(
            "ENCODE_LIST_TOO_LONG",
            format!("list of {} elements exceeds the u16 count prefix", elements.len()),
        )
    })?;
    writer.write_u16(count);
    for element in elements.iter().rev() {
        writer.write_u8(element.tag());
        match element {
            ListElement::Int(value) | ListElement::TaggedInt(value) => writer.write_i32(*value),
            ListElement::Float(value) => writer.write_f32(*value),
            ListElement::String(text) => encode_string(writer, text, codepage)?,
            ListElement::U16(value) => writer.write_u16(*value),
        }
    }
    Ok(())
}

#[cfg(test)]
mod encoder_tests {
    use super::*;
    use crate::decoder::decode_next;
    use crate::descriptor::{op, InstructionSet};
    use crate::reader::ByteReader;

    fn table() -> &'static DescriptorTable {
        DescriptorTable::for_instruction_set(InstructionSet::Base)
    }

    #[test]
    fn encodes_header_then_slots() {
        let command = build_command(
            table(),
            "VarSetValue",
            0,
            vec![ParamValue::I16(-3), ParamValue::I32(258)],
        )
        .expect("build");
        let mut writer = ByteWriter::new();
        encode(&mut writer, table(), &command, Codepage::Utf8).expect("encode");
        assert_eq!(
            writer.as_slice(),
            &[6, 0, 0, 0, 0xFD, 0xFF, 0x02, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            encoded_len(table(), &command, Codepage::Utf8).expect("len"),
            10
        );
    }

    #[test]
    fn list_round_trip_preserves_reversed_order_and_tags() {
        let command = build_command(
            table(),
            "DialogueAddSelections",
            0,
            vec![ParamValue::List(vec![
                ListElement::String("Stay".to_string()),
                ListElement::TaggedInt(4),
                ListElement::Float(0.5),
                ListElement::U16(12),
                ListElement::Int(-1),
            ])],
        )
        .expect("build");
        let bytes = encode_script(table(), &[command.clone()], Codepage::Utf8).expect("encode");
        // First element on the wire is the last in the vector.
        assert_eq!(bytes[6], 0);

        let decoded =
            decode_next(&mut ByteReader::new(&bytes), table(), Codepage::Utf8).expect("decode");
        assert_eq!(decoded, command);
    }

    #[test]
    fn variable_slots_must_match_the_mask() {
        let error = build_command(
            table(),
            "VarIsGreaterThan",
            0,
            vec![ParamValue::I16(1), ParamValue::Variable(2)],
        )
        .expect_err("mask does not flag slot 1");
        assert_eq!(error.code, "ENCODE_PARAM_KIND_MISMATCH");

        let command = build_command(
            table(),
            "VarIsGreaterThan",
            0b10,
            vec![ParamValue::I16(1), ParamValue::Variable(2)],
        )
        .expect("flagged variable slot");
        let bytes = encode_script(table(), &[command], Codepage::Utf8).expect("encode");
        assert_eq!(bytes, vec![op::VAR_IS_GREATER_THAN as u8, 0, 2, 0, 1, 0, 2, 0]);
    }

    #[test]
    fn build_rejects_unknown_names_and_wrong_arity() {
        let error = build_command(table(), "ActorEnableGravity", 0, vec![])
            .expect_err("extended-only command");
        assert_eq!(error.code, "ENCODE_COMMAND_UNKNOWN");

        let error = build_command(table(), "RunnerGoto", 0, vec![])
            .expect_err("goto needs an offset");
        assert_eq!(error.code, "ENCODE_ARITY_MISMATCH");

        let error = build_command(
            table(),
            "RunnerGoto",
            0,
            vec![ParamValue::F32(1.0)],
        )
        .expect_err("offset is an i32");
        assert_eq!(error.code, "ENCODE_PARAM_KIND_MISMATCH");
    }

    #[test]
    fn oversized_strings_are_rejected() {
        let command = build_command(
            table(),
            "DialogueRenderText",
            0,
            vec![ParamValue::String("x".repeat(70_000))],
        )
        .expect("kind is valid");
        let error = encode_script(table(), &[command], Codepage::Utf8)
            .expect_err("length prefix overflows");
        assert_eq!(error.code, "ENCODE_STRING_TOO_LONG");
    }

    #[test]
    fn text_the_codepage_cannot_hold_is_rejected() {
        let command = build_command(
            table(),
            "DialogueRenderText",
            0,
            vec![ParamValue::String("景".to_string())],
        )
        .expect("kind is valid");
        let error = encode_script(table(), &[command.clone()], Codepage::Windows1252)
            .expect_err("1252 has no cjk");
        assert_eq!(error.code, "CODEPAGE_UNMAPPABLE");
        let error = encoded_len(table(), &command, Codepage::Windows1252)
            .expect_err("length needs the same encoding");
        assert_eq!(error.code, "CODEPAGE_UNMAPPABLE");

        let selections = build_command(
            table(),
            "DialogueAddSelections",
            0,
            vec![ParamValue::List(vec![ListElement::String("天".to_string())])],
        )
        .expect("kind is valid");
        let error = encode_script(table(), &[selections], Codepage::Windows1252)
            .expect_err("list strings are encoded too");
        assert_eq!(error.code, "CODEPAGE_UNMAPPABLE");
        assert!(encode_script(table(), &[command], Codepage::Gbk).is_ok());
    }
}
