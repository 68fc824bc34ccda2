use std::collections::VecDeque;

use sce_core::{Codepage, Command, ListElement, ParamValue, SceError};

use crate::descriptor::{CommandDescriptor, DescriptorTable, ParamKind};
use crate::reader::ByteReader;

type LiteralDecoder = fn(&mut ByteReader<'_>, Codepage) -> Result<ParamValue, SceError>;

/// Indexed by `ParamKind::index`.
const LITERAL_DECODERS: [LiteralDecoder; ParamKind::COUNT] = [
    decode_i8,
    decode_u8,
    decode_i16,
    decode_u16,
    decode_i32,
    decode_u32,
    decode_f32,
    decode_string_param,
    decode_list,
];

fn decode_i8(reader: &mut ByteReader<'_>, _: Codepage) -> Result<ParamValue, SceError> {
    reader.read_i8().map(ParamValue::I8)
}

fn decode_u8(reader: &mut ByteReader<'_>, _: Codepage) -> Result<ParamValue, SceError> {
    reader.read_u8().map(ParamValue::U8)
}

fn decode_i16(reader: &mut ByteReader<'_>, _: Codepage) -> Result<ParamValue, SceError> {
    reader.read_i16().map(ParamValue::I16)
}

fn decode_u16(reader: &mut ByteReader<'_>, _: Codepage) -> Result<ParamValue, SceError> {
    reader.read_u16().map(ParamValue::U16)
}

fn decode_i32(reader: &mut ByteReader<'_>, _: Codepage) -> Result<ParamValue, SceError> {
    reader.read_i32().map(ParamValue::I32)
}

fn decode_u32(reader: &mut ByteReader<'_>, _: Codepage) -> Result<ParamValue, SceError> {
    reader.read_u32().map(ParamValue::U32)
}

fn decode_f32(reader: &mut ByteReader<'_>, _: Codepage) -> Result<ParamValue, SceError> {
    reader.read_f32().map(ParamValue::F32)
}

fn decode_string_param(
    reader: &mut ByteReader<'_>,
    codepage: Codepage,
) -> Result<ParamValue, SceError> {
    decode_string(reader, codepage).map(ParamValue::String)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub opcode: u16,
    pub var_mask: u16,
}

pub fn decode_header(reader: &mut ByteReader<'_>) -> Result<CommandHeader, SceError> {
    let opcode = reader.read_u16()?;
    let var_mask = reader.read_u16()?;
    Ok(CommandHeader { opcode, var_mask })
}

/// Reads the parameters of `opcode` from `reader`. Bit `i` of `var_mask` makes
/// slot `i` a 16-bit variable reference instead of a literal.
pub fn decode(
    reader: &mut ByteReader<'_>,
    table: &DescriptorTable,
    opcode: u16,
    var_mask: u16,
    codepage: Codepage,
) -> Result<Command, SceError> {
    let descriptor = table.lookup(opcode)?;
    decode_with_descriptor(reader, descriptor, var_mask, codepage)
}

pub fn decode_with_descriptor(
    reader: &mut ByteReader<'_>,
    descriptor: &'static CommandDescriptor,
    var_mask: u16,
    codepage: Codepage,
) -> Result<Command, SceError> {
    let mut params = Vec::with_capacity(descriptor.params.len());
    for (slot, kind) in descriptor.params.iter().enumerate() {
        let value = if var_mask & (1 << slot) != 0 {
            ParamValue::Variable(reader.read_i16()?)
        } else {
            LITERAL_DECODERS[kind.index()](reader, codepage)?
        };
        params.push(value);
    }
    Ok(Command {
        opcode: descriptor.opcode,
        name: descriptor.name,
        var_mask,
        params,
    })
}

/// Header plus parameters of the command at the reader's position.
pub fn decode_next(
    reader: &mut ByteReader<'_>,
    table: &DescriptorTable,
    codepage: Codepage,
) -> Result<Command, SceError> {
    let start = reader.position();
    let header = decode_header(reader)?;
    decode(reader, table, header.opcode, header.var_mask, codepage)
        .map_err(|error| error.with_position(start as u64))
}

/// Every command of a block paired with its byte offset.
pub fn decode_all(
    bytes: &[u8],
    table: &DescriptorTable,
    codepage: Codepage,
) -> Result<Vec<(usize, Command)>, SceError> {
    let mut reader = ByteReader::new(bytes);
    let mut commands = Vec::new();
    while !reader.is_at_end() {
        let position = reader.position();
        commands.push((position, decode_next(&mut reader, table, codepage)?));
    }
    Ok(commands)
}

fn decode_string(reader: &mut ByteReader<'_>, codepage: Codepage) -> Result<String, SceError> {
    let length = reader.read_u16()?;
    let bytes = reader.read_bytes(usize::from(length))?;
    Ok(codepage.decode(bytes))
}

// Elements land in reverse: the last one read ends up first.
fn decode_list(reader: &mut ByteReader<'_>, codepage: Codepage) -> Result<ParamValue, SceError> {
    let count = reader.read_u16()?;
    let mut elements = VecDeque::with_capacity(usize::from(count));
    for _ in 0..count {
        let tag_position = reader.position();
        let element = match reader.read_u8()? {
            0 => ListElement::Int(reader.read_i32()?),
            1 => ListElement::Float(reader.read_f32()?),
            2 => ListElement::TaggedInt(reader.read_i32()?),
            3 => ListElement::String(decode_string(reader, codepage)?),
            4 => ListElement::U16(reader.read_u16()?),
            other => {
                return Err(SceError::at(
                    "DECODE_LIST_TAG_UNKNOWN",
                    format!("List element tag {} is not recognised.", other),
                    tag_position as u64,
                ))
            }
        };
        elements.push_front(element);
    }
    Ok(ParamValue::List(elements.into()))
}
