/// Error type for scheme loading and layout compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("Alias cycle detected: {}", chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },

    #[error("Message id {msgid} declared by both '{first}' and '{second}'")]
    DuplicateMessageId {
        msgid: i32,
        first: String,
        second: String,
    },

    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Field '{field}' declared twice in message '{message}'")]
    DuplicateField { message: String, field: String },

    #[error("Message '{message}': {optional} optional fields do not fit into pmap field '{pmap}' ({bits} bits)")]
    PmapOverflow {
        message: String,
        pmap: String,
        optional: usize,
        bits: usize,
    },

    #[error("Message '{message}': inlined field '{field}' collides with an existing field")]
    InlineCollision { message: String, field: String },

    #[error("Message '{message}': field '{field}' can not be inlined: {reason}")]
    InvalidInline {
        message: String,
        field: String,
        reason: String,
    },

    #[error("Unknown type '{name}' referenced by '{context}'")]
    UnknownType { context: String, name: String },

    #[error("Invalid option '{key}' = '{value}' on '{context}'")]
    InvalidOption {
        context: String,
        key: String,
        value: String,
    },

    #[error("Invalid type for '{context}': {message}")]
    InvalidType { context: String, message: String },

    #[error("Enum '{name}': value {value} of '{entry}' does not fit underlying type")]
    EnumValueRange {
        name: String,
        entry: String,
        value: i128,
    },

    #[error("Bits '{name}': entry '{entry}' (offset={offset}, size={size}) exceeds {width} bits")]
    BitsRange {
        name: String,
        entry: String,
        offset: u32,
        size: u32,
        width: u32,
    },

    #[error("Union '{name}': {members} members do not fit into tag type {tag}")]
    UnionTagRange {
        name: String,
        members: usize,
        tag: String,
    },

    #[error("Message '{message}': pmap field '{field}' must be an unsigned integer or byte blob")]
    InvalidPmap { message: String, field: String },

    #[error("Message '{message}': pmap field '{field}' can not be optional")]
    OptionalPmap { message: String, field: String },

    #[error("Message '{message}' declares more than one pmap field")]
    MultiplePmap { message: String },

    #[error("Message '{message}' has optional fields but no pmap field")]
    MissingPmap { message: String },

    #[error("Failed to load scheme source: {0}")]
    Load(String),
}
