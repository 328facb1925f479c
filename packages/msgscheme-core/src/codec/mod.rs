//! Packing, unpacking and reflection of messages.
//!
//! All entry points are pure functions over a compiled [`Scheme`](crate::scheme::Scheme)
//! and a byte slice. Output buffers and records never alias the input.

pub mod decimal;
mod pack;
mod pointer;
pub mod reflection;
pub mod text;
mod time;
mod unpack;
pub mod value;
mod wire;

pub use decimal::Decimal;
pub use pack::pack;
pub use reflection::{reflection, FieldView, ListView, View};
pub use text::{from_string, to_string};
pub use unpack::unpack;
pub use value::{Record, UnionValue, Value};
