//! Scheme sources, compiled layouts and the layout compiler.

mod compile;
mod error;
mod source;
mod types;
pub(crate) mod validation;

pub use compile::{compile, compile_with_config};
pub use error::LayoutError;
pub use source::{
    BitDef, BitsDef, EnumDef, EnumEntryDef, FieldDef, Import, MessageDef, SchemeSource, TypeRef,
    UnionDef,
};
pub use types::{
    ArrayType, BitEntry, Bits, BitsId, Enum, EnumId, Field, FieldType, Message, MessageId, Options,
    PointerType, PtrVersion, Resolution, Scheme, SubType, Union, UnionId,
};
