//! Binary message schemes.
//!
//! Compiles scheme sources into fixed message layouts, packs and unpacks
//! messages against them, gives lazy reflection access to packed buffers
//! and converts messages between two versions of a scheme.

pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod scheme;

pub use codec::{pack, unpack, Decimal, Record, Value};
pub use config::{FailOn, SchemeConfig};
pub use convert::{Converted, Converter};
pub use error::{CodecError, ConversionError, LayoutError, ParseError};
pub use scheme::{compile, Scheme, SchemeSource};
