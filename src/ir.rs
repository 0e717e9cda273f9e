// Strongly-typed validator IR for codegen. Literal payloads stay as serde_json values.
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Any,                     // unconstrained
    Never,                   // nothing validates (empty enum, `false` schema)
    Null,                    // exactly null
    Bool,
    Number  { integer: bool, bounds: NumBounds },
    String  { format: Option<StrFormat>, pattern: Option<String>, min_len: Option<u64>, max_len: Option<u64> },
    Enum(Vec<String>),       // string literal set, ≥ 2 members
    Literal(Value),          // primitive literal
    Array {
        item: Box<Ty>,
        min_items: Option<u64>,
        max_items: Option<u64>,
    },
    Tuple(Vec<Ty>),
    Object {
        fields: Vec<Field>,  // declaration order, kept for deterministic codegen
        extra: Extra,
    },
    Record(Box<Ty>),         // open object, string keys
    Union(Vec<Ty>),
    Intersection(Vec<Ty>),
    Ref(String),             // another generated declaration, by name
    Nullable(Box<Ty>),
    Described { inner: Box<Ty>, description: String },
    Defaulted { inner: Box<Ty>, default: Value },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumBounds {
    pub min: Option<Number>,
    pub max: Option<Number>,
    pub exclusive_min: Option<Number>,
    pub exclusive_max: Option<Number>,
    pub multiple_of: Option<Number>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrFormat {
    Email,
    Url,
    Uuid,
    DateTime,
    Date,
    Time,
}

impl StrFormat {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "email" => Some(Self::Email),
            "uri" | "url" => Some(Self::Url),
            "uuid" => Some(Self::Uuid),
            "date-time" => Some(Self::DateTime),
            "date" => Some(Self::Date),
            "time" => Some(Self::Time),
            _ => None,
        }
    }
}

/// What an object does with keys it does not declare.
#[derive(Debug, Clone, PartialEq)]
pub enum Extra {
    Strip,
    Loose,
    Strict,
    Catchall(Box<Ty>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    pub required: bool,
}

impl Ty {
    pub fn union(mut arms: Vec<Ty>) -> Ty {
        match arms.len() {
            0 => Ty::Never,
            1 => arms.remove(0),
            _ => Ty::Union(arms),
        }
    }

    /// A defaulted value never needs `.optional()`.
    pub fn has_default(&self) -> bool {
        match self {
            Ty::Defaulted { .. } => true,
            Ty::Described { inner, .. } => inner.has_default(),
            _ => false,
        }
    }
}
