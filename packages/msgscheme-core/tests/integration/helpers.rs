//! Scheme builders shared by the integration tests.

use std::sync::Arc;

use msgscheme_core::config::SchemeConfig;
use msgscheme_core::scheme::{
    compile_with_config, BitsDef, EnumDef, FieldDef, MessageDef, Scheme, SchemeSource, TypeRef,
    UnionDef,
};

pub fn ty(text: &str) -> TypeRef {
    text.parse().unwrap()
}

pub fn field(name: &str, type_expr: &str) -> FieldDef {
    FieldDef::new(name, ty(type_expr))
}

pub fn source(messages: Vec<MessageDef>) -> SchemeSource {
    SchemeSource {
        messages,
        ..Default::default()
    }
}

pub fn build(source: &SchemeSource) -> Arc<Scheme> {
    Arc::new(compile_with_config(source, &SchemeConfig::default()).unwrap())
}

/// Single message scheme `name { fields }` with id 1.
pub fn single(name: &str, fields: Vec<FieldDef>) -> Arc<Scheme> {
    build(&source(vec![MessageDef::new(name, fields).id(1)]))
}

/// Scheme touching every field kind.
///
/// `Sub { s0: int32 }` followed by `All` with id 100.
pub fn all_kinds_source() -> SchemeSource {
    let mut src = source(vec![
        MessageDef::new("Sub", vec![field("s0", "int32")]),
        MessageDef::new(
            "All",
            vec![
                field("pmap", "uint8").option("pmap", "yes"),
                field("i8", "int8"),
                field("i16", "int16"),
                field("i32", "int32"),
                field("i64", "int64"),
                field("u8", "uint8"),
                field("u16", "uint16"),
                field("u32", "uint32"),
                field("u64", "uint64"),
                field("dbl", "double"),
                field("dec", "decimal128"),
                field("price", "int64").option("type", "fixed2"),
                field("color", "Color"),
                field("flags", "Flags"),
                field("timeout", "int64")
                    .option("type", "duration")
                    .option("resolution", "ms"),
                field("stamp", "int64")
                    .option("type", "time_point")
                    .option("resolution", "us"),
                field("blob", "byte4"),
                field("code", "byte8").option("type", "string"),
                field("name", "string"),
                field("list", "*int32"),
                field("arr", "int16[4]"),
                field("sub", "Sub"),
                field("subs", "*Sub"),
                field("choice", "Choice"),
                field("opt_a", "int32").optional(),
                field("opt_b", "string").optional(),
            ],
        )
        .id(100),
    ]);
    src.enums.push(
        EnumDef::new("Color", ty("int8"), &[("Red", 1), ("Green", 2), ("Blue", 3)]),
    );
    src.bits.push(BitsDef::new(
        "Flags",
        ty("uint16"),
        &[("a", 0, 1), ("b", 1, 1), ("level", 4, 3)],
    ));
    src.unions.push(UnionDef::new(
        "Choice",
        vec![field("num", "int64"), field("text", "string")],
    ));
    src
}

/// `Sub { s0 }` and `Data { header, f0: Sub, footer }` with id 10.
pub fn data_scheme(header: &str, sub: &str, footer: &str) -> Arc<Scheme> {
    build(&source(vec![
        MessageDef::new("Sub", vec![field("s0", sub)]),
        MessageDef::new(
            "Data",
            vec![field("header", header), field("f0", "Sub"), field("footer", footer)],
        )
        .id(10),
    ]))
}
