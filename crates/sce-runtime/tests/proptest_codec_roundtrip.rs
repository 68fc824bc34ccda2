//! Property tests for the command codec and the variable store.

use proptest::prelude::*;
use sce_core::{Codepage, Command, ListElement, ParamValue};
use sce_runtime::{
    decode_all, decode_next, encode_script, ByteReader, CommandDescriptor, DescriptorTable,
    InstructionSet, ParamKind, VariableStore,
};

fn finite_f32() -> impl Strategy<Value = f32> {
    -1.0e6f32..1.0e6f32
}

fn list_element() -> impl Strategy<Value = ListElement> {
    prop_oneof![
        any::<i32>().prop_map(ListElement::Int),
        finite_f32().prop_map(ListElement::Float),
        any::<i32>().prop_map(ListElement::TaggedInt),
        "[a-zA-Z0-9 景天雪]{0,12}".prop_map(ListElement::String),
        any::<u16>().prop_map(ListElement::U16),
    ]
}

fn literal(kind: ParamKind) -> BoxedStrategy<ParamValue> {
    match kind {
        ParamKind::I8 => any::<i8>().prop_map(ParamValue::I8).boxed(),
        ParamKind::U8 => any::<u8>().prop_map(ParamValue::U8).boxed(),
        ParamKind::I16 => any::<i16>().prop_map(ParamValue::I16).boxed(),
        ParamKind::U16 => any::<u16>().prop_map(ParamValue::U16).boxed(),
        ParamKind::I32 => any::<i32>().prop_map(ParamValue::I32).boxed(),
        ParamKind::U32 => any::<u32>().prop_map(ParamValue::U32).boxed(),
        ParamKind::F32 => finite_f32().prop_map(ParamValue::F32).boxed(),
        ParamKind::String => "[a-zA-Z0-9 ,.!?景天雪]{0,32}"
            .prop_map(ParamValue::String)
            .boxed(),
        ParamKind::List => prop::collection::vec(list_element(), 0..8)
            .prop_map(ParamValue::List)
            .boxed(),
    }
}

fn slot(kind: ParamKind) -> BoxedStrategy<(bool, ParamValue)> {
    prop_oneof![
        3 => literal(kind).prop_map(|value| (false, value)),
        1 => any::<i16>().prop_map(|id| (true, ParamValue::Variable(id))),
    ]
    .boxed()
}

fn command(instruction_set: InstructionSet) -> impl Strategy<Value = Command> {
    let descriptors = DescriptorTable::for_instruction_set(instruction_set).descriptors();
    prop::sample::select(descriptors).prop_flat_map(|descriptor: &'static CommandDescriptor| {
        let slots = descriptor
            .params
            .iter()
            .map(|kind| slot(*kind))
            .collect::<Vec<_>>();
        slots.prop_map(move |slots| {
            let mut var_mask = 0u16;
            let mut params = Vec::with_capacity(slots.len());
            for (index, (by_variable, value)) in slots.into_iter().enumerate() {
                if by_variable {
                    var_mask |= 1 << index;
                }
                params.push(value);
            }
            Command {
                opcode: descriptor.opcode,
                name: descriptor.name,
                var_mask,
                params,
            }
        })
    })
}

fn instruction_set() -> impl Strategy<Value = InstructionSet> {
    prop_oneof![Just(InstructionSet::Base), Just(InstructionSet::Extended)]
}

fn codepage() -> impl Strategy<Value = Codepage> {
    prop_oneof![
        Just(Codepage::Utf8),
        Just(Codepage::Gbk),
        Just(Codepage::Big5),
        Just(Codepage::Windows1252)
    ]
}

/// Generated text is ASCII plus a few CJK characters, and only the CJK ones
/// fall outside Windows-1252.
fn fits_codepage(command: &Command, page: Codepage) -> bool {
    if page != Codepage::Windows1252 {
        return true;
    }
    command.params.iter().all(|param| match param {
        ParamValue::String(text) => text.is_ascii(),
        ParamValue::List(elements) => elements.iter().all(|element| match element {
            ListElement::String(text) => text.is_ascii(),
            _ => true,
        }),
        _ => true,
    })
}

proptest! {
    /// Property: decoding an encoded command yields the same command, unless
    /// its text cannot be represented in the codepage
    #[test]
    fn encoded_commands_decode_to_themselves(
        (set, generated) in instruction_set().prop_flat_map(|set| (Just(set), command(set))),
        page in codepage(),
    ) {
        let table = DescriptorTable::for_instruction_set(set);
        let encoded = encode_script(table, std::slice::from_ref(&generated), page);
        if !fits_codepage(&generated, page) {
            prop_assert_eq!(encoded.unwrap_err().code, "CODEPAGE_UNMAPPABLE");
            return Ok(());
        }
        let bytes = encoded.unwrap();
        let mut reader = ByteReader::new(&bytes);
        let decoded = decode_next(&mut reader, table, page).unwrap();

        prop_assert!(reader.is_at_end());
        prop_assert_eq!(decoded, generated);
    }

    /// Property: re-encoding a decoded block reproduces its bytes
    #[test]
    fn decoded_blocks_encode_to_the_same_bytes(
        commands in prop::collection::vec(command(InstructionSet::Extended), 0..12),
    ) {
        let table = DescriptorTable::for_instruction_set(InstructionSet::Extended);
        let bytes = encode_script(table, &commands, Codepage::Utf8).unwrap();
        let decoded = decode_all(&bytes, table, Codepage::Utf8).unwrap();
        let decoded = decoded.into_iter().map(|(_, command)| command).collect::<Vec<_>>();
        let reencoded = encode_script(table, &decoded, Codepage::Utf8).unwrap();

        prop_assert_eq!(reencoded, bytes);
    }

    /// Property: arbitrary bytes never panic the decoder
    #[test]
    fn arbitrary_bytes_dont_crash_decoder(
        random_bytes in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let table = DescriptorTable::for_instruction_set(InstructionSet::Base);
        let _result = decode_all(&random_bytes, table, Codepage::Gbk);
    }

    /// Property: every id reads zero before its first write
    #[test]
    fn unset_variables_read_zero(id in any::<i16>(), seed in any::<u32>()) {
        let store = VariableStore::detached(seed);
        prop_assert_eq!(store.get(id), 0);
    }

    /// Property: random values stay inside the exclusive bound
    #[test]
    fn random_values_respect_bound(max in 1i32..10_000, seed in any::<u32>()) {
        let mut store = VariableStore::detached(seed);
        store.set_random(-1, max);
        let value = store.get(-1);
        prop_assert!((0..max).contains(&value));
    }
}
