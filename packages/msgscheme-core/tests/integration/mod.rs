//! Integration test suite for the scheme compiler, codec and converter.
//!
//! Tests are organized by surface:
//! 1. Pack/unpack round trips and wire level rejection
//! 2. Scheme to scheme conversion
//! 3. Reflection views and textual values

pub mod helpers;
pub mod reflection_text_tests;
pub mod roundtrip_tests;
