//! Pack/unpack round trips and rejection of damaged buffers.

use chrono::{DateTime, TimeDelta};
use ntest::timeout;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use msgscheme_core::codec::{pack, reflection, unpack, Decimal, Record, UnionValue, Value};
use msgscheme_core::config::SchemeConfig;
use msgscheme_core::error::CodecError;
use msgscheme_core::scheme::{
    compile_with_config, BitsDef, EnumDef, MessageDef, PtrVersion, UnionDef,
};

use super::helpers::{all_kinds_source, build, field, single, source, ty};

fn full_record() -> Record {
    let stamp = DateTime::from_timestamp(1_700_000_000, 123_456_000).unwrap();
    Record::new()
        .with("i8", Value::Int(-5))
        .with("i16", Value::Int(-1000))
        .with("i32", Value::Int(70_000))
        .with("i64", Value::Int(-5_000_000_000))
        .with("u8", Value::UInt(200))
        .with("u16", Value::UInt(60_000))
        .with("u32", Value::UInt(4_000_000_000))
        .with("u64", Value::UInt(u64::MAX))
        .with("dbl", 2.5)
        .with("dec", Value::Decimal("1234.5678".parse().unwrap()))
        .with("price", Value::Decimal(Decimal::new(12345, -2)))
        .with("color", Value::Enum("Green".into()))
        .with("flags", Value::Bits(0b101_0010))
        .with("timeout", Value::Duration(TimeDelta::milliseconds(1500)))
        .with("stamp", Value::TimePoint(stamp))
        .with("blob", Value::Bytes(vec![1, 2, 3, 4]))
        .with("code", Value::String("abc".into()))
        .with("name", "hello")
        .with("list", vec![Value::Int(1), Value::Int(-2), Value::Int(3)])
        .with("arr", vec![Value::Int(7), Value::Int(8)])
        .with("sub", Record::new().with("s0", Value::Int(42)))
        .with(
            "subs",
            vec![
                Value::Message(Record::new().with("s0", Value::Int(1))),
                Value::Message(Record::new().with("s0", Value::Int(2))),
            ],
        )
        .with("choice", Value::Union(UnionValue::new("text", "chosen")))
        .with("opt_a", Value::Int(9))
}

#[timeout(5000)]
#[test]
fn test_all_kinds_roundtrip() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    let record = full_record();

    let data = pack(&scheme, msg, &record).unwrap();
    assert!(data.len() > msg.size);

    let unpacked = unpack(&scheme, msg, &data).unwrap();
    assert_eq!(unpacked, record);
    assert!(!unpacked.contains("opt_b"));
    assert!(!unpacked.contains("pmap"));

    // Repacking the unpacked record is byte for byte stable
    assert_eq!(pack(&scheme, msg, &unpacked).unwrap(), data);
}

#[timeout(5000)]
#[test]
fn test_missing_fields_pack_as_zero() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    let data = pack(&scheme, msg, &Record::new()).unwrap();
    assert_eq!(data, vec![0u8; msg.size]);

    let unpacked = unpack(&scheme, msg, &data).unwrap();
    assert_eq!(unpacked.get("name"), Some(&Value::String(String::new())));
    assert_eq!(unpacked.get("list"), Some(&Value::List(Vec::new())));
    assert_eq!(unpacked.get("blob"), Some(&Value::Bytes(vec![0; 4])));
    assert_eq!(
        unpacked.get("choice"),
        Some(&Value::Union(UnionValue::new("num", Value::Int(0))))
    );
}

#[timeout(5000)]
#[test]
fn test_decimal128_specials_roundtrip() {
    let scheme = single("D", vec![field("d", "decimal128")]);
    let msg = scheme.message("D").unwrap();
    let values = [
        Decimal::NaN,
        Decimal::SignalingNaN,
        Decimal::Infinity { negative: true },
        Decimal::Infinity { negative: false },
        Decimal::ZERO,
        Decimal::new(-1, -6176),
        "1234567890123456789012345678901234".parse().unwrap(),
        "-0.000001".parse().unwrap(),
    ];
    for value in values {
        let record = Record::new().with("d", value);
        let data = pack(&scheme, msg, &record).unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(unpack(&scheme, msg, &data).unwrap(), record, "value {}", value);
    }

    let too_precise: Decimal = "12345678901234567890123456789012345".parse().unwrap();
    let result = pack(&scheme, msg, &Record::new().with("d", too_precise));
    assert!(matches!(result, Err(CodecError::Overflow { .. })));
}

#[timeout(5000)]
#[test]
fn test_integer_boundaries() {
    let cases: [(&str, i128, i128); 8] = [
        ("int8", i8::MIN as i128, i8::MAX as i128),
        ("int16", i16::MIN as i128, i16::MAX as i128),
        ("int32", i32::MIN as i128, i32::MAX as i128),
        ("int64", i64::MIN as i128, i64::MAX as i128),
        ("uint8", 0, u8::MAX as i128),
        ("uint16", 0, u16::MAX as i128),
        ("uint32", 0, u32::MAX as i128),
        ("uint64", 0, u64::MAX as i128),
    ];
    for (type_name, min, max) in cases {
        let scheme = single("B", vec![field("v", type_name)]);
        let msg = scheme.message("B").unwrap();
        let unsigned = type_name.starts_with('u');

        for v in [min, max] {
            let value = if unsigned {
                Value::UInt(v as u64)
            } else {
                Value::Int(v as i64)
            };
            let record = Record::new().with("v", value);
            let data = pack(&scheme, msg, &record).unwrap();
            assert_eq!(unpack(&scheme, msg, &data).unwrap(), record, "{} {}", type_name, v);
        }

        for v in [min - 1, max + 1] {
            let record = Record::new().with("v", Decimal::new(v, 0));
            let result = pack(&scheme, msg, &record);
            assert!(
                matches!(result, Err(CodecError::Overflow { .. })),
                "{} {} packed",
                type_name,
                v
            );
        }
    }
}

#[timeout(5000)]
#[test]
fn test_fixed_point_rounding_and_range() {
    let scheme = single("F", vec![field("v", "int8").option("type", "fixed2")]);
    let msg = scheme.message("F").unwrap();

    let data = pack(&scheme, msg, &Record::new().with("v", Decimal::new(1005, -3))).unwrap();
    assert_eq!(data, vec![101]);
    let data = pack(&scheme, msg, &Record::new().with("v", Decimal::new(-1005, -3))).unwrap();
    assert_eq!(data, vec![(-101i8) as u8]);

    let result = pack(&scheme, msg, &Record::new().with("v", Decimal::new(128, -2)));
    assert!(matches!(result, Err(CodecError::Overflow { .. })));
}

#[timeout(5000)]
#[test]
fn test_presence_bits_are_independent() {
    let scheme = single(
        "P",
        vec![
            field("pmap", "uint8").option("pmap", "yes"),
            field("a", "int32").optional(),
            field("b", "int16"),
            field("c", "string").optional(),
            field("d", "int64").optional(),
        ],
    );
    let msg = scheme.message("P").unwrap();

    for mask in 0u8..8 {
        let mut record = Record::new().with("b", Value::Int(-7));
        if mask & 1 != 0 {
            record.set("a", Value::Int(11));
        }
        if mask & 2 != 0 {
            record.set("c", "present");
        }
        if mask & 4 != 0 {
            record.set("d", Value::Int(i64::MIN));
        }
        let data = pack(&scheme, msg, &record).unwrap();
        assert_eq!(data[0], mask);
        assert_eq!(unpack(&scheme, msg, &data).unwrap(), record, "mask {:03b}", mask);

        // A caller supplied pmap value is recomputed
        let mut with_pmap = record.clone();
        with_pmap.set("pmap", Value::UInt(0xff));
        assert_eq!(pack(&scheme, msg, &with_pmap).unwrap(), data);
    }
}

#[timeout(5000)]
#[test]
fn test_unknown_fields_and_names() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();

    let result = pack(&scheme, msg, &Record::new().with("nope", Value::Int(1)));
    assert!(matches!(result, Err(CodecError::UnknownField { .. })));

    let result = pack(&scheme, msg, &Record::new().with("color", Value::Enum("Pink".into())));
    assert!(matches!(result, Err(CodecError::UnknownName { .. })));

    let result = pack(
        &scheme,
        msg,
        &Record::new().with("choice", Value::Union(UnionValue::new("missing", Value::Int(1)))),
    );
    assert!(matches!(result, Err(CodecError::UnknownName { .. })));

    let result = pack(&scheme, msg, &Record::new().with("i8", "text"));
    assert!(matches!(result, Err(CodecError::TypeMismatch { .. })));

    let items: Vec<Value> = (0..5).map(Value::Int).collect();
    let result = pack(&scheme, msg, &Record::new().with("arr", items));
    assert!(matches!(result, Err(CodecError::Overflow { .. })));

    let result = pack(&scheme, msg, &Record::new().with("code", "eight ch"));
    assert!(matches!(result, Err(CodecError::Overflow { .. })));
}

#[timeout(5000)]
#[test]
fn test_unknown_enum_values() {
    let mut src = source(vec![MessageDef::new("E", vec![field("e", "Side"), field("f", "Kind")]).id(1)]);
    src.enums.push(EnumDef::new("Side", ty("int8"), &[("Buy", 1), ("Sell", 2)]));
    src.enums.push(EnumDef::new("Kind", ty("int8"), &[("Limit", 1), ("Other", 0)]).fallback("Other"));
    let scheme = build(&src);
    let msg = scheme.message("E").unwrap();

    let record = unpack(&scheme, msg, &[9, 9]).unwrap();
    assert_eq!(record.get("e"), Some(&Value::Int(9)));
    assert_eq!(record.get("f"), Some(&Value::Enum("Other".into())));

    // Raw values pack unchanged
    let data = pack(&scheme, msg, &Record::new().with("e", Value::Int(9))).unwrap();
    assert_eq!(data, vec![9, 0]);
}

#[timeout(5000)]
#[test]
fn test_pointer_versions_are_equivalent() {
    let src = source(vec![
        MessageDef::new("Sub", vec![field("s0", "int32")]),
        MessageDef::new(
            "M",
            vec![
                field("name", "string"),
                field("list", "*int16"),
                field("subs", "*Sub"),
                field("empty", "*int64"),
            ],
        ),
    ]);
    let record = Record::new()
        .with("name", "pointer")
        .with("list", vec![Value::Int(-1), Value::Int(2), Value::Int(300)])
        .with(
            "subs",
            vec![Value::Message(Record::new().with("s0", Value::Int(5)))],
        )
        .with("empty", Vec::<Value>::new());

    let mut sizes = Vec::new();
    for version in [PtrVersion::Default, PtrVersion::LegacyShort, PtrVersion::LegacyLong] {
        let config = SchemeConfig {
            default_ptr_version: version,
            ..Default::default()
        };
        let scheme = compile_with_config(&src, &config).unwrap();
        let msg = scheme.message("M").unwrap();
        let data = pack(&scheme, msg, &record).unwrap();
        assert_eq!(unpack(&scheme, msg, &data).unwrap(), record, "{}", version);
        sizes.push(msg.size);
    }
    assert_eq!(sizes, vec![32, 16, 32]);
}

#[timeout(5000)]
#[test]
fn test_pointer_wire_layouts() {
    let scheme = single("L", vec![field("l", "*int32")]);
    let msg = scheme.message("L").unwrap();

    // Wider wire entity, elements strided by 8
    let mut data = vec![8, 0, 0, 0, 2, 0, 0, 8];
    data.extend_from_slice(&[1, 0, 0, 0, 0xaa, 0xaa, 0xaa, 0xaa]);
    data.extend_from_slice(&[2, 0, 0, 0, 0xbb, 0xbb, 0xbb, 0xbb]);
    let record = unpack(&scheme, msg, &data).unwrap();
    assert_eq!(
        record.get("l"),
        Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
    );

    // Entity size stored in front of the data
    let mut data = vec![8, 0, 0, 0, 1, 0, 0, 0xff];
    data.extend_from_slice(&[6, 0, 0, 0]);
    data.extend_from_slice(&[5, 0, 0, 0, 0, 0]);
    let record = unpack(&scheme, msg, &data).unwrap();
    assert_eq!(record.get("l"), Some(&Value::List(vec![Value::Int(5)])));

    let narrow = vec![8, 0, 0, 0, 1, 0, 0, 2, 1, 0];
    assert!(matches!(
        unpack(&scheme, msg, &narrow),
        Err(CodecError::Malformed { .. })
    ));

    let past_end = vec![8, 0, 0, 0, 4, 0, 0, 4, 1, 0, 0, 0];
    assert!(matches!(
        unpack(&scheme, msg, &past_end),
        Err(CodecError::Truncated { .. })
    ));

    let zero_offset = vec![0, 0, 0, 0, 1, 0, 0, 4];
    assert!(matches!(
        unpack(&scheme, msg, &zero_offset),
        Err(CodecError::Malformed { .. })
    ));

    let short = single(
        "S",
        vec![field("l", "*int32").option("offset-ptr-type", "legacy-short")],
    );
    let short_msg = short.message("S").unwrap();
    let record = unpack(&short, short_msg, &[4, 0, 1, 0, 9, 0, 0, 0]).unwrap();
    assert_eq!(record.get("l"), Some(&Value::List(vec![Value::Int(9)])));
}

#[timeout(5000)]
#[test]
fn test_damaged_headers_are_rejected() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    let data = pack(&scheme, msg, &full_record()).unwrap();

    let result = unpack(&scheme, msg, &data[..msg.size - 1]);
    assert!(matches!(result, Err(CodecError::Truncated { .. })));

    // Header intact, pointer regions cut off
    let result = unpack(&scheme, msg, &data[..msg.size + 2]);
    assert!(matches!(result, Err(CodecError::Truncated { .. })));
    assert!(reflection(&scheme, msg, &data[..msg.size + 2]).is_err());

    let arr = single("A", vec![field("arr", "int8[2]")]);
    let arr_msg = arr.message("A").unwrap();
    for count in [3u8, 0xff] {
        let result = unpack(&arr, arr_msg, &[count, 0, 0]);
        assert!(matches!(result, Err(CodecError::Malformed { .. })), "count {}", count);
    }

    let mut src = source(vec![MessageDef::new("U", vec![field("u", "Pair")]).id(1)]);
    src.unions.push(UnionDef::new("Pair", vec![field("a", "int8"), field("b", "int8")]));
    let union = build(&src);
    let union_msg = union.message("U").unwrap();
    let result = unpack(&union, union_msg, &[7, 0]);
    assert!(matches!(result, Err(CodecError::Malformed { .. })));
    let result = unpack(&union, union_msg, &[1, 4]).unwrap();
    assert_eq!(
        result.get("u"),
        Some(&Value::Union(UnionValue::new("b", Value::Int(4))))
    );
}

#[timeout(10000)]
#[test]
fn test_random_buffers_never_panic() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..2000 {
        let len = rng.gen_range(0..msg.size * 2);
        let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let unpacked = unpack(&scheme, msg, &data);
        let view = reflection(&scheme, msg, &data);
        assert_eq!(unpacked.is_ok(), view.is_ok());
        if let (Ok(record), Ok(view)) = (unpacked, view) {
            assert_eq!(view.to_record().unwrap(), record);
        }
    }
}

#[timeout(5000)]
#[test]
fn test_every_union_member_roundtrip() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    for member in [
        UnionValue::new("num", Value::Int(i64::MIN)),
        UnionValue::new("num", Value::Int(0)),
        UnionValue::new("text", "member text"),
        UnionValue::new("text", ""),
    ] {
        let record = full_record().with("choice", Value::Union(member.clone()));
        let data = pack(&scheme, msg, &record).unwrap();
        let unpacked = unpack(&scheme, msg, &data).unwrap();
        assert_eq!(
            unpacked.get("choice"),
            Some(&Value::Union(member.clone())),
            "{}",
            member.name
        );
    }
}

#[timeout(5000)]
#[test]
fn test_union_tag_types_roundtrip() {
    for tag_type in ["uint8", "int16", "uint16", "int32", "uint32"] {
        let members = (0..200).map(|i| field(&format!("m{}", i), "int16")).collect();
        let mut union = UnionDef::new("U", members);
        union.options.insert("tag-type".into(), tag_type.into());
        let mut src = source(vec![MessageDef::new("M", vec![field("u", "U")]).id(1)]);
        src.unions.push(union);
        let scheme = build(&src);
        let msg = scheme.message("M").unwrap();

        for index in [0usize, 127, 128, 150, 199] {
            let name = format!("m{}", index);
            let record = Record::new().with(
                "u",
                Value::Union(UnionValue::new(&name, Value::Int(-(index as i64)))),
            );
            let data = pack(&scheme, msg, &record).unwrap();
            assert_eq!(data[0], index as u8);
            assert_eq!(
                unpack(&scheme, msg, &data).unwrap(),
                record,
                "{} {}",
                tag_type,
                name
            );
            let view = reflection(&scheme, msg, &data).unwrap();
            assert_eq!(view.get("u").unwrap().as_union().unwrap().name(), name);
        }
    }
}

#[timeout(5000)]
#[test]
fn test_array_count_types_roundtrip() {
    let cases = [
        ("int8", "uint8[100]", vec![0usize, 1, 100]),
        ("uint8", "uint8[200]", vec![0, 127, 128, 150, 200]),
        ("int16", "uint8[200]", vec![0, 150, 200]),
        ("uint16", "uint8[200]", vec![0, 200]),
        ("int32", "uint8[200]", vec![0, 200]),
    ];
    for (count_type, array, lengths) in cases {
        let scheme = single("M", vec![field("arr", array).option("count-type", count_type)]);
        let msg = scheme.message("M").unwrap();
        for len in lengths {
            let items: Vec<Value> = (0..len).map(|i| Value::UInt(i as u64 % 256)).collect();
            let record = Record::new().with("arr", items);
            let data = pack(&scheme, msg, &record).unwrap();
            assert_eq!(
                unpack(&scheme, msg, &data).unwrap(),
                record,
                "{} {}",
                count_type,
                len
            );
            let view = reflection(&scheme, msg, &data).unwrap();
            assert_eq!(view.get("arr").unwrap().as_list().unwrap().len(), len);
        }
    }
}

#[timeout(5000)]
#[test]
fn test_signed_bits_storage_keeps_top_bit() {
    let mut src = source(vec![MessageDef::new("M", vec![field("f", "B")]).id(1)]);
    src.bits.push(BitsDef::new("B", ty("int64"), &[("low", 0, 1), ("top", 63, 1)]));
    let scheme = build(&src);
    let msg = scheme.message("M").unwrap();

    for raw in [1u64 << 63, (1u64 << 63) | 1, 1, 0] {
        let record = Record::new().with("f", Value::Bits(raw));
        let data = pack(&scheme, msg, &record).unwrap();
        assert_eq!(data, raw.to_le_bytes().to_vec());
        assert_eq!(unpack(&scheme, msg, &data).unwrap(), record);
    }

    let mut src = source(vec![MessageDef::new("M", vec![field("f", "B")]).id(1)]);
    src.bits.push(BitsDef::new("B", ty("int8"), &[("top", 7, 1)]));
    let scheme = build(&src);
    let msg = scheme.message("M").unwrap();
    let record = Record::new().with("f", Value::Bits(0x80));
    let data = pack(&scheme, msg, &record).unwrap();
    assert_eq!(data, vec![0x80]);
    assert_eq!(unpack(&scheme, msg, &data).unwrap(), record);
    assert!(matches!(
        pack(&scheme, msg, &Record::new().with("f", Value::Bits(0x100))),
        Err(CodecError::Overflow { .. })
    ));
}

#[timeout(5000)]
#[test]
fn test_non_utf8_text_unpacks_as_bytes() {
    let scheme = single(
        "M",
        vec![
            field("name", "string"),
            field("code", "byte4").option("type", "string"),
        ],
    );
    let msg = scheme.message("M").unwrap();
    let record = Record::new()
        .with("name", Value::Bytes(vec![0xff, 0xfe, b'a']))
        .with("code", Value::Bytes(vec![0xc3, 0x28]));

    let data = pack(&scheme, msg, &record).unwrap();
    let unpacked = unpack(&scheme, msg, &data).unwrap();
    assert_eq!(unpacked, record);
    assert_eq!(pack(&scheme, msg, &unpacked).unwrap(), data);

    let valid = Record::new().with("name", "ok").with("code", "abc");
    let data = pack(&scheme, msg, &valid).unwrap();
    assert_eq!(unpack(&scheme, msg, &data).unwrap(), valid);
}
