//! Reflection views and textual field values.

use chrono::{DateTime, TimeDelta};
use ntest::timeout;

use msgscheme_core::codec::{from_string, pack, reflection, to_string, unpack, Decimal, Record, UnionValue, Value};
use msgscheme_core::error::{CodecError, ParseError};

use super::helpers::{all_kinds_source, build, field, single};

fn sample() -> Record {
    Record::new()
        .with("i32", Value::Int(-17))
        .with("name", "viewed")
        .with("list", vec![Value::Int(4), Value::Int(5), Value::Int(6)])
        .with("arr", vec![Value::Int(1)])
        .with("sub", Record::new().with("s0", Value::Int(99)))
        .with(
            "subs",
            vec![
                Value::Message(Record::new().with("s0", Value::Int(10))),
                Value::Message(Record::new().with("s0", Value::Int(20))),
            ],
        )
        .with("choice", Value::Union(UnionValue::new("num", Value::Int(-8))))
        .with("opt_b", "optional")
}

#[timeout(5000)]
#[test]
fn test_view_reads_fields_lazily() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    let data = pack(&scheme, msg, &sample()).unwrap();
    let view = reflection(&scheme, msg, &data).unwrap();

    assert_eq!(view.message().name, "All");
    assert_eq!(view.get("i32").unwrap().value().unwrap(), Value::Int(-17));
    assert_eq!(
        view.get("name").unwrap().value().unwrap(),
        Value::String("viewed".into())
    );
    assert!(view.get("nope").is_none());
    assert!(!view.contains("opt_a"));
    assert!(view.contains("opt_b"));

    let list = view.get("list").unwrap().as_list().unwrap();
    assert_eq!(list.len(), 3);
    let items: Vec<Value> = list.iter().map(|item| item.value().unwrap()).collect();
    assert_eq!(items, vec![Value::Int(4), Value::Int(5), Value::Int(6)]);
    assert!(list.get(3).is_none());

    let arr = view.get("arr").unwrap().as_list().unwrap();
    assert_eq!(arr.len(), 1);
    assert!(!arr.is_empty());

    let sub = view.get("sub").unwrap().as_message().unwrap();
    assert_eq!(sub.get("s0").unwrap().value().unwrap(), Value::Int(99));

    let subs = view.get("subs").unwrap().as_list().unwrap();
    let second = subs.get(1).unwrap().as_message().unwrap();
    assert_eq!(second.get("s0").unwrap().value().unwrap(), Value::Int(20));

    let member = view.get("choice").unwrap().as_union().unwrap();
    assert_eq!(member.name(), "num");
    assert_eq!(member.value().unwrap(), Value::Int(-8));

    assert!(matches!(
        view.get("i32").unwrap().as_list(),
        Err(CodecError::TypeMismatch { .. })
    ));
    assert!(view.get("sub").unwrap().as_union().is_err());
}

#[timeout(5000)]
#[test]
fn test_view_matches_unpack() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    let data = pack(&scheme, msg, &sample()).unwrap();
    let view = reflection(&scheme, msg, &data).unwrap();

    assert_eq!(view.to_record().unwrap(), unpack(&scheme, msg, &data).unwrap());

    let names: Vec<&str> = view.fields().map(|f| f.name()).collect();
    assert!(!names.contains(&"pmap"));
    assert!(!names.contains(&"opt_a"));
    assert_eq!(names.first(), Some(&"i8"));
    assert_eq!(names.last(), Some(&"opt_b"));
}

#[timeout(5000)]
#[test]
fn test_parse_integers_and_enums() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    let field = |name: &str| msg.field(name).unwrap();

    assert_eq!(from_string(&scheme, field("i16"), " 0x10 ").unwrap(), Value::Int(16));
    assert_eq!(from_string(&scheme, field("i16"), "-1_000").unwrap(), Value::Int(-1000));
    assert_eq!(from_string(&scheme, field("u8"), "0b11").unwrap(), Value::UInt(3));
    assert!(matches!(
        from_string(&scheme, field("i8"), "200"),
        Err(ParseError::Overflow { .. })
    ));
    assert!(matches!(
        from_string(&scheme, field("u8"), "-1"),
        Err(ParseError::Overflow { .. })
    ));
    assert!(matches!(
        from_string(&scheme, field("i32"), "12abc"),
        Err(ParseError::Syntax { .. })
    ));

    assert_eq!(
        from_string(&scheme, field("color"), "Blue").unwrap(),
        Value::Enum("Blue".into())
    );
    assert_eq!(
        from_string(&scheme, field("color"), "2").unwrap(),
        Value::Enum("Green".into())
    );
    assert_eq!(from_string(&scheme, field("color"), "9").unwrap(), Value::Int(9));
    assert!(matches!(
        from_string(&scheme, field("color"), "Pink"),
        Err(ParseError::UnknownName { .. })
    ));
    assert_eq!(to_string(&scheme, field("color"), &Value::Int(3)), "Blue");
    assert_eq!(to_string(&scheme, field("color"), &Value::Int(9)), "9");
}

#[timeout(5000)]
#[test]
fn test_parse_bits() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();
    let flags = msg.field("flags").unwrap();

    let raw = 0b101_0010;
    assert_eq!(from_string(&scheme, flags, "b | level=5").unwrap(), Value::Bits(raw));
    assert_eq!(from_string(&scheme, flags, "{b, level=5}").unwrap(), Value::Bits(raw));
    assert_eq!(from_string(&scheme, flags, "0x52").unwrap(), Value::Bits(raw));
    assert_eq!(to_string(&scheme, flags, &Value::Bits(raw)), "b | level=5");
    assert_eq!(to_string(&scheme, flags, &Value::Bits(0x101)), "a | 0x100");
    assert_eq!(to_string(&scheme, flags, &Value::Bits(0)), "0");

    assert!(matches!(
        from_string(&scheme, flags, "level=8"),
        Err(ParseError::Overflow { .. })
    ));
    assert!(matches!(
        from_string(&scheme, flags, "a | zzz"),
        Err(ParseError::UnknownName { .. })
    ));
    assert!(matches!(
        from_string(&scheme, flags, "0x10000"),
        Err(ParseError::Overflow { .. })
    ));
}

#[timeout(5000)]
#[test]
fn test_parse_decimals() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();

    let price = msg.field("price").unwrap();
    assert_eq!(
        from_string(&scheme, price, "12.34").unwrap(),
        Value::Decimal(Decimal::new(1234, -2))
    );
    assert_eq!(
        to_string(&scheme, price, &Value::Decimal(Decimal::new(1234, -2))),
        "12.34"
    );

    let dec = msg.field("dec").unwrap();
    assert_eq!(
        from_string(&scheme, dec, "-1.5e3").unwrap(),
        Value::Decimal(Decimal::new(-1500, 0))
    );
    assert_eq!(
        from_string(&scheme, dec, "inf").unwrap(),
        Value::Decimal(Decimal::Infinity { negative: false })
    );
    assert!(matches!(
        from_string(&scheme, dec, "1.2.3"),
        Err(ParseError::Syntax { .. })
    ));

    let dbl = msg.field("dbl").unwrap();
    assert_eq!(from_string(&scheme, dbl, "0.25").unwrap(), Value::Double(0.25));
}

#[timeout(5000)]
#[test]
fn test_parse_time_values() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();

    let delay = msg.field("timeout").unwrap();
    assert_eq!(
        from_string(&scheme, delay, "1.5s").unwrap(),
        Value::Duration(TimeDelta::milliseconds(1500))
    );
    assert_eq!(
        from_string(&scheme, delay, "250").unwrap(),
        Value::Duration(TimeDelta::milliseconds(250))
    );
    assert_eq!(
        to_string(&scheme, delay, &Value::Duration(TimeDelta::milliseconds(1500))),
        "1500ms"
    );

    let stamp = msg.field("stamp").unwrap();
    let expected = DateTime::from_timestamp(1_704_164_645, 500_000_000).unwrap();
    for text in [
        "2024-01-02T03:04:05.5Z",
        "2024-01-02T05:04:05.5+02:00",
        "2024-01-02 03:04:05.5",
        "1704164645500000",
    ] {
        assert_eq!(
            from_string(&scheme, stamp, text).unwrap(),
            Value::TimePoint(expected),
            "{}",
            text
        );
    }
    assert_eq!(
        to_string(&scheme, stamp, &Value::TimePoint(expected)),
        "2024-01-02T03:04:05.500Z"
    );
    assert!(matches!(
        from_string(&scheme, stamp, "yesterday"),
        Err(ParseError::Syntax { .. })
    ));
}

#[timeout(5000)]
#[test]
fn test_time_literals_checked_against_storage() {
    let scheme = single(
        "M",
        vec![
            field("d", "int8")
                .option("type", "duration")
                .option("resolution", "s"),
            field("t", "int32")
                .option("type", "time_point")
                .option("resolution", "s"),
            field("f", "double")
                .option("type", "duration")
                .option("resolution", "s"),
        ],
    );
    let msg = scheme.message("M").unwrap();
    let d = msg.field("d").unwrap();
    let t = msg.field("t").unwrap();

    assert_eq!(
        from_string(&scheme, d, "127s").unwrap(),
        Value::Duration(TimeDelta::seconds(127))
    );
    assert_eq!(
        from_string(&scheme, d, "-2m").unwrap(),
        Value::Duration(TimeDelta::seconds(-120))
    );
    for text in ["1000s", "128", "3m"] {
        assert!(
            matches!(from_string(&scheme, d, text), Err(ParseError::Overflow { .. })),
            "{}",
            text
        );
    }

    assert!(from_string(&scheme, t, "2038-01-19T03:14:07Z").is_ok());
    assert!(matches!(
        from_string(&scheme, t, "2038-01-19T03:14:08Z"),
        Err(ParseError::Overflow { .. })
    ));

    // Floating point storage has no integer range to check
    assert!(from_string(&scheme, msg.field("f").unwrap(), "1000000s").is_ok());
}

#[timeout(5000)]
#[test]
fn test_text_fields_and_unsupported_kinds() {
    let scheme = build(&all_kinds_source());
    let msg = scheme.message("All").unwrap();

    let code = msg.field("code").unwrap();
    assert_eq!(
        from_string(&scheme, code, "ABCDEFG").unwrap(),
        Value::String("ABCDEFG".into())
    );
    assert!(matches!(
        from_string(&scheme, code, "ABCDEFGH"),
        Err(ParseError::Overflow { .. })
    ));

    let name = msg.field("name").unwrap();
    assert_eq!(
        from_string(&scheme, name, "free text").unwrap(),
        Value::String("free text".into())
    );

    for kind in ["sub", "list", "choice"] {
        assert!(
            matches!(
                from_string(&scheme, msg.field(kind).unwrap(), "1"),
                Err(ParseError::Unsupported { .. })
            ),
            "{}",
            kind
        );
    }

    let sub = msg.field("sub").unwrap();
    let record = Record::new().with("s0", Value::Int(5));
    assert_eq!(to_string(&scheme, sub, &Value::Message(record)), "{s0: 5}");

    let list = msg.field("list").unwrap();
    let items = Value::List(vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(to_string(&scheme, list, &items), "[1, 2]");

    let choice = msg.field("choice").unwrap();
    let member = Value::Union(UnionValue::new("text", "hi"));
    assert_eq!(to_string(&scheme, choice, &member), "{text: hi}");
}
