//! Scheme compilation and conversion configuration.

use std::fmt;
use std::str::FromStr;

use crate::scheme::PtrVersion;

/// When the converter reports incompatible fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailOn {
    /// Fail while building the conversion plan
    #[default]
    Init,
    /// Fail only when a converted message touches the incompatible field
    Data,
}

impl FromStr for FailOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(FailOn::Init),
            "data" => Ok(FailOn::Data),
            other => Err(format!("unknown fail-on policy '{}'", other)),
        }
    }
}

impl fmt::Display for FailOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailOn::Init => "init",
            FailOn::Data => "data",
        })
    }
}

/// Scheme configuration.
#[derive(Debug, Clone, Default)]
pub struct SchemeConfig {
    /// Offset pointer encoding for list fields without an `offset-ptr-type` option
    pub default_ptr_version: PtrVersion,
    /// Conversion failure policy
    pub fail_on: FailOn,
}
