//! Slot values and their wire text.
//!
//! A positional value array is a `[Option<Value>]`: one slot per header,
//! property and body part, `None` meaning "no value". [`PartType`] says how a
//! slot maps onto wire text.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::contract::ContractInstance;
use crate::error::{OpwireError, Result};
use crate::xml::XmlElement;

/// One slot of a positional value array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Binary data, also used for raw-stream bodies.
    Bytes(Bytes),
    /// Preformed XML.
    Xml(XmlElement),
    /// Header content that carries its own header attributes.
    Header(Box<HeaderValue>),
    /// Aggregate (typed message) instance.
    Contract(ContractInstance),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Xml(_) => "xml",
            Value::Header(_) => "header",
            Value::Contract(_) => "contract",
        }
    }

    /// Wrap an aggregate instance.
    pub fn contract<T: crate::contract::MessageContract>(instance: T) -> Self {
        Value::Contract(ContractInstance::new(instance))
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_contract(&self) -> Option<&ContractInstance> {
        match self {
            Value::Contract(c) => Some(c),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

impl From<XmlElement> for Value {
    fn from(v: XmlElement) -> Self {
        Value::Xml(v)
    }
}

impl From<HeaderValue> for Value {
    fn from(v: HeaderValue) -> Self {
        Value::Header(Box::new(v))
    }
}

fn mismatch(expected: &str, found: &Value) -> OpwireError {
    OpwireError::Format(format!(
        "expected {} value, found {}",
        expected,
        found.kind()
    ))
}

impl TryFrom<Value> for bool {
    type Error = OpwireError;

    fn try_from(v: Value) -> Result<Self> {
        v.as_bool().ok_or_else(|| mismatch("bool", &v))
    }
}

impl TryFrom<Value> for i64 {
    type Error = OpwireError;

    fn try_from(v: Value) -> Result<Self> {
        v.as_i64().ok_or_else(|| mismatch("int", &v))
    }
}

impl TryFrom<Value> for f64 {
    type Error = OpwireError;

    fn try_from(v: Value) -> Result<Self> {
        v.as_f64().ok_or_else(|| mismatch("float", &v))
    }
}

impl TryFrom<Value> for String {
    type Error = OpwireError;

    fn try_from(v: Value) -> Result<Self> {
        match v {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl TryFrom<Value> for Bytes {
    type Error = OpwireError;

    fn try_from(v: Value) -> Result<Self> {
        match v {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

/// Convert a slot into `T`, using `T::default()` for an empty slot.
///
/// Handy inside member setters:
///
/// ```
/// use opwire::value::{slot_or_default, Value};
///
/// let id: i64 = slot_or_default(Some(Value::Int(7))).unwrap();
/// assert_eq!(id, 7);
/// let missing: String = slot_or_default(None).unwrap();
/// assert!(missing.is_empty());
/// ```
pub fn slot_or_default<T>(slot: Option<Value>) -> Result<T>
where
    T: TryFrom<Value, Error = OpwireError> + Default,
{
    match slot {
        Some(v) => T::try_from(v),
        None => Ok(T::default()),
    }
}

/// Header content plus optional per-value header attributes.
///
/// Any attribute left as `None` falls back to the header description.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderValue {
    /// The header's content.
    pub content: Option<Value>,
    /// Overrides the described must-understand flag.
    pub must_understand: Option<bool>,
    /// Overrides the described relay flag.
    pub relay: Option<bool>,
    /// Overrides the described actor.
    pub actor: Option<String>,
}

impl HeaderValue {
    /// Content without overrides.
    pub fn new(content: impl Into<Value>) -> Self {
        Self {
            content: Some(content.into()),
            must_understand: None,
            relay: None,
            actor: None,
        }
    }

    pub fn with_must_understand(mut self, must_understand: bool) -> Self {
        self.must_understand = Some(must_understand);
        self
    }

    pub fn with_relay(mut self, relay: bool) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// How a part's value is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartType {
    /// `true` / `false`.
    Bool,
    /// Decimal 64-bit integer.
    Int,
    /// Double precision number, `INF`/`-INF`/`NaN` for the special values.
    Float,
    /// Plain text.
    Text,
    /// Base64 binary.
    Bytes,
    /// Preformed XML element.
    Xml,
    /// Raw stream; the whole body is handed to the stream codec.
    Stream,
}

impl PartType {
    /// `xsi:type` value used by SOAP encoding, if the type has one.
    pub fn xsd_name(self) -> Option<&'static str> {
        match self {
            PartType::Bool => Some("xsd:boolean"),
            PartType::Int => Some("xsd:long"),
            PartType::Float => Some("xsd:double"),
            PartType::Text => Some("xsd:string"),
            PartType::Bytes | PartType::Stream => Some("xsd:base64Binary"),
            PartType::Xml => None,
        }
    }

    #[inline]
    pub fn is_stream(self) -> bool {
        self == PartType::Stream
    }

    /// Render a value as element text.
    pub fn to_text(self, value: &Value) -> Result<String> {
        match (self, value) {
            (PartType::Bool, Value::Bool(b)) => Ok(if *b { "true" } else { "false" }.to_string()),
            (PartType::Int, Value::Int(i)) => Ok(i.to_string()),
            (PartType::Float, Value::Float(f)) => Ok(format_float(*f)),
            (PartType::Text, Value::Text(s)) => Ok(s.clone()),
            (PartType::Bytes | PartType::Stream, Value::Bytes(b)) => Ok(STANDARD.encode(b)),
            (PartType::Xml, _) => Err(OpwireError::Format(
                "xml parts are written as elements, not text".to_string(),
            )),
            (ty, other) => Err(mismatch(&ty.to_string(), other)),
        }
    }

    /// Parse element text into a value of this type.
    pub fn from_text(self, text: &str) -> Result<Value> {
        match self {
            PartType::Bool => match text.trim() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                other => Err(OpwireError::Format(format!(
                    "'{}' is not a valid boolean",
                    other
                ))),
            },
            PartType::Int => text.trim().parse::<i64>().map(Value::Int).map_err(|e| {
                OpwireError::Format(format!("'{}' is not a valid integer: {}", text.trim(), e))
            }),
            PartType::Float => parse_float(text.trim()).map(Value::Float),
            PartType::Text => Ok(Value::Text(text.to_string())),
            PartType::Bytes | PartType::Stream => {
                Ok(Value::Bytes(Bytes::from(STANDARD.decode(text.trim())?)))
            }
            PartType::Xml => Err(OpwireError::Format(
                "xml parts are read as elements, not text".to_string(),
            )),
        }
    }

    /// Read the value carried by `element`: its first child element for
    /// [`PartType::Xml`], its text otherwise.
    pub fn from_element(self, element: XmlElement) -> Result<Option<Value>> {
        match self {
            PartType::Xml => Ok(element.into_child_elements().into_iter().next().map(Value::Xml)),
            ty => ty.from_text(&element.text()).map(Some),
        }
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartType::Bool => "bool",
            PartType::Int => "int",
            PartType::Float => "float",
            PartType::Text => "text",
            PartType::Bytes => "bytes",
            PartType::Xml => "xml",
            PartType::Stream => "stream",
        };
        f.write_str(name)
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "INF".to_string()
    } else if f == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        f.to_string()
    }
}

fn parse_float(text: &str) -> Result<f64> {
    match text {
        "NaN" => Ok(f64::NAN),
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        _ => text
            .parse::<f64>()
            .map_err(|e| OpwireError::Format(format!("'{}' is not a valid number: {}", text, e))),
    }
}
