//! The Field Type Registry: scalar codecs looked up by type token.
//!
//! Every scalar field names a type token, like `"String"` or `"Number"`. When a document is built,
//! the token is resolved to a [`Codec`], which checks the incoming value and coerces it into the
//! canonical form for that type. A [`TypeRegistry`] starts out with the built-in codecs:
//!
//! - `String` - strings. Numbers and booleans are converted to their string form.
//! - `Number` - integers and floats. Strings holding a number are parsed.
//! - `Boolean` - booleans. The strings `"true"`/`"false"` and the numbers `0`/`1` are accepted.
//! - `Buffer` - binary data.
//! - `ObjectId` - UUIDs. Strings holding a UUID are parsed.
//! - `Mixed` - passes any value through unchanged.
//!
//! Null is never handed to a codec; whether a field may be null is decided by its
//! [`FieldOptions`][crate::field::FieldOptions].

use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Validates and coerces scalar values of one type.
///
/// Codecs are shared between threads building documents at the same time, so they must not
/// depend on mutable state.
pub trait Codec: Send + Sync {
    /// The type token this codec is registered under.
    fn name(&self) -> &str;

    /// Check a value, returning it in canonical form or a reason it was rejected.
    fn cast(&self, value: Value) -> Result<Value, String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    fn name(&self) -> &str {
        "String"
    }

    fn cast(&self, value: Value) -> Result<Value, String> {
        match value {
            Value::Str(_) => Ok(value),
            Value::Int(v) => Ok(Value::Str(v.to_string())),
            Value::F64(v) => Ok(Value::Str(v.to_string())),
            Value::Bool(v) => Ok(Value::Str(v.to_string())),
            Value::Id(v) => Ok(Value::Str(v.to_string())),
            other => Err(format!("expected String, got {}", other.kind_name())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NumberCodec;

impl Codec for NumberCodec {
    fn name(&self) -> &str {
        "Number"
    }

    fn cast(&self, value: Value) -> Result<Value, String> {
        match value {
            Value::Int(_) => Ok(value),
            Value::F64(v) if v.is_finite() => Ok(value),
            Value::F64(_) => Err("Number must be finite".to_string()),
            Value::Bool(v) => Ok(Value::Int(v as i64)),
            Value::Str(ref s) => {
                let s = s.trim();
                if let Ok(v) = s.parse::<i64>() {
                    Ok(Value::Int(v))
                } else if let Ok(v) = s.parse::<f64>() {
                    if v.is_finite() {
                        Ok(Value::F64(v))
                    } else {
                        Err("Number must be finite".to_string())
                    }
                } else {
                    Err(format!("{:?} is not a number", s))
                }
            }
            other => Err(format!("expected Number, got {}", other.kind_name())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BooleanCodec;

impl Codec for BooleanCodec {
    fn name(&self) -> &str {
        "Boolean"
    }

    fn cast(&self, value: Value) -> Result<Value, String> {
        match value {
            Value::Bool(_) => Ok(value),
            Value::Int(0) => Ok(Value::Bool(false)),
            Value::Int(1) => Ok(Value::Bool(true)),
            Value::Str(ref s) if s == "true" => Ok(Value::Bool(true)),
            Value::Str(ref s) if s == "false" => Ok(Value::Bool(false)),
            other => Err(format!("expected Boolean, got {:?}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BufferCodec;

impl Codec for BufferCodec {
    fn name(&self) -> &str {
        "Buffer"
    }

    fn cast(&self, value: Value) -> Result<Value, String> {
        match value {
            Value::Bin(_) => Ok(value),
            other => Err(format!("expected Buffer, got {}", other.kind_name())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectIdCodec;

impl Codec for ObjectIdCodec {
    fn name(&self) -> &str {
        "ObjectId"
    }

    fn cast(&self, value: Value) -> Result<Value, String> {
        match value {
            Value::Id(_) => Ok(value),
            Value::Str(ref s) => Uuid::parse_str(s)
                .map(Value::Id)
                .map_err(|e| format!("{:?} is not an ObjectId: {}", s, e)),
            other => Err(format!("expected ObjectId, got {}", other.kind_name())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MixedCodec;

impl Codec for MixedCodec {
    fn name(&self) -> &str {
        "Mixed"
    }

    fn cast(&self, value: Value) -> Result<Value, String> {
        Ok(value)
    }
}

/// Maps type tokens to the codecs that handle them.
#[derive(Clone)]
pub struct TypeRegistry {
    codecs: BTreeMap<String, Arc<dyn Codec>>,
}

impl TypeRegistry {
    /// Make a registry holding all of the built-in codecs.
    pub fn new() -> Self {
        Self::empty()
            .with(StringCodec)
            .with(NumberCodec)
            .with(BooleanCodec)
            .with(BufferCodec)
            .with(ObjectIdCodec)
            .with(MixedCodec)
    }

    /// Make a registry with no codecs at all.
    pub fn empty() -> Self {
        Self {
            codecs: BTreeMap::new(),
        }
    }

    /// Add a codec, replacing any codec already registered under the same name.
    pub fn with(mut self, codec: impl Codec + 'static) -> Self {
        self.insert(codec);
        self
    }

    /// Add a codec, replacing any codec already registered under the same name.
    pub fn insert(&mut self, codec: impl Codec + 'static) {
        self.codecs.insert(codec.name().to_string(), Arc::new(codec));
    }

    /// Look up the codec for a type token.
    pub fn resolve(&self, token: &str) -> Option<&dyn Codec> {
        self.codecs.get(token).map(|c| c.as_ref())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.codecs.contains_key(token)
    }

    /// Iterate over the registered type tokens.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(|k| k.as_str())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}
