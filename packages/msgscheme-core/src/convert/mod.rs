//! Scheme-to-scheme message conversion.
//!
//! A [`Converter`] pairs the messages of two compiled schemes (by id, then
//! by name), plans a rule for every common field and then converts packed
//! buffers by unpacking with the source layout, transforming the record and
//! packing with the destination layout. Messages whose layouts are
//! identical are copied byte for byte.

mod apply;
mod plan;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{self, Record};
use crate::config::{FailOn, SchemeConfig};
use crate::error::{CodecError, ConversionError};
use crate::scheme::{Message, MessageId, Scheme};

use plan::{MessagePlan, Planner};

/// Converted message.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    /// Destination message name
    pub name: String,
    /// Destination message id
    pub msgid: Option<i32>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Target {
    /// Byte copy, the layout is the same on both sides
    Pass { name: String, msgid: Option<i32> },
    Plan(usize),
    /// Deferred failure under [`FailOn::Data`]
    Fail(ConversionError),
}

/// Conversion plan between two schemes, shareable across threads.
#[derive(Debug)]
pub struct Converter {
    from: Arc<Scheme>,
    to: Arc<Scheme>,
    policy: FailOn,
    plans: Vec<MessagePlan>,
    targets: HashMap<MessageId, Target>,
}

impl Converter {
    /// Builds a converter.
    ///
    /// # Arguments
    /// * `from` - Source scheme
    /// * `to` - Destination scheme
    /// * `policy` - When incompatible fields are reported
    ///
    /// # Returns
    /// `Result<Converter, ConversionError>`; under [`FailOn::Init`] the first
    /// incompatibility found is returned here.
    pub fn build(from: Arc<Scheme>, to: Arc<Scheme>, policy: FailOn) -> Result<Self, ConversionError> {
        let mut planner = Planner::new(&from, &to, policy);
        let mut targets = HashMap::new();
        let mut passed = 0usize;

        for (index, message) in from.messages.iter().enumerate() {
            let src = MessageId(index);
            let target = match find_destination(&to, message) {
                Some(dst) => {
                    let dst_msg = to.message_at(dst);
                    if dst_msg.fingerprint == message.fingerprint {
                        passed += 1;
                        Target::Pass {
                            name: dst_msg.name.clone(),
                            msgid: dst_msg.msgid,
                        }
                    } else {
                        Target::Plan(planner.message(src, dst)?)
                    }
                }
                None if message.options.get("convert").is_some_and(|v| v == "pass") => {
                    passed += 1;
                    Target::Pass {
                        name: message.name.clone(),
                        msgid: message.msgid,
                    }
                }
                None => {
                    let error = ConversionError::Unmatched {
                        what: "message",
                        name: message.name.clone(),
                    };
                    match planner.defer(error)? {
                        plan::Rule::Fail(error) => Target::Fail(error),
                        _ => continue,
                    }
                }
            };
            targets.insert(src, target);
        }

        debug!(
            messages = targets.len(),
            plans = planner.plans.len(),
            passed,
            deferred = planner.deferred,
            policy = %policy,
            "conversion plan built"
        );
        let plans = planner.plans;
        Ok(Self {
            from,
            to,
            policy,
            plans,
            targets,
        })
    }

    /// Builds a converter with the policy from `config`.
    pub fn from_config(
        from: Arc<Scheme>,
        to: Arc<Scheme>,
        config: &SchemeConfig,
    ) -> Result<Self, ConversionError> {
        Self::build(from, to, config.fail_on)
    }

    pub fn source(&self) -> &Scheme {
        &self.from
    }

    pub fn destination(&self) -> &Scheme {
        &self.to
    }

    pub fn policy(&self) -> FailOn {
        self.policy
    }

    /// Converts a packed source message identified by name.
    pub fn convert(&self, name: &str, data: &[u8]) -> Result<Converted, ConversionError> {
        let message = self.from.message(name).ok_or_else(|| ConversionError::Unmatched {
            what: "message",
            name: name.to_string(),
        })?;
        self.convert_message(message, data)
    }

    /// Converts a packed source message identified by wire id.
    pub fn convert_id(&self, msgid: i32, data: &[u8]) -> Result<Converted, ConversionError> {
        let message = self
            .from
            .message_by_id(msgid)
            .ok_or_else(|| ConversionError::Unmatched {
                what: "message id",
                name: msgid.to_string(),
            })?;
        self.convert_message(message, data)
    }

    /// Converts a source record into a destination record without packing.
    pub fn convert_record(&self, name: &str, record: &Record) -> Result<Record, ConversionError> {
        let target = self.target(name)?;
        match target {
            Target::Pass { .. } => Ok(record.clone()),
            Target::Plan(index) => self.apply_message(*index, record),
            Target::Fail(error) => Err(error.clone()),
        }
    }

    /// Converts many buffers in parallel against this plan.
    ///
    /// Results are returned in input order.
    #[cfg(feature = "parallel")]
    pub fn convert_batch(&self, items: &[(&str, &[u8])]) -> Vec<Result<Converted, ConversionError>> {
        use rayon::prelude::*;

        items
            .par_iter()
            .map(|(name, data)| self.convert(name, data))
            .collect()
    }

    fn target(&self, name: &str) -> Result<&Target, ConversionError> {
        let unmatched = || ConversionError::Unmatched {
            what: "message",
            name: name.to_string(),
        };
        let id = self.from.message_id(name).ok_or_else(unmatched)?;
        self.targets.get(&id).ok_or_else(unmatched)
    }

    fn convert_message(&self, message: &Message, data: &[u8]) -> Result<Converted, ConversionError> {
        let target = self.target(&message.name)?;
        match target {
            Target::Pass { name, msgid } => {
                codec::reflection(&self.from, message, data)?;
                Ok(Converted {
                    name: name.clone(),
                    msgid: *msgid,
                    data: data.to_vec(),
                })
            }
            Target::Plan(index) => {
                let plan = &self.plans[*index];
                let record = codec::unpack(&self.from, message, data)?;
                let converted = self.apply_message(*index, &record)?;
                let dst = self.to.message_at(plan.dst);
                let data = codec::pack(&self.to, dst, &converted).map_err(pack_error)?;
                Ok(Converted {
                    name: dst.name.clone(),
                    msgid: dst.msgid,
                    data,
                })
            }
            Target::Fail(error) => {
                warn!(message = %message.name, error = %error, "deferred conversion failure");
                Err(error.clone())
            }
        }
    }
}

fn find_destination(to: &Scheme, message: &Message) -> Option<MessageId> {
    message
        .msgid
        .and_then(|id| to.message_by_id(id))
        .and_then(|m| to.message_id(&m.name))
        .or_else(|| to.message_id(&message.name))
}

/// Destination capacity problems surface as conversion overflows.
fn pack_error(error: CodecError) -> ConversionError {
    match error {
        CodecError::Overflow {
            field,
            value,
            target,
        } => ConversionError::Overflow {
            field,
            value,
            target,
        },
        other => ConversionError::Codec(other),
    }
}
