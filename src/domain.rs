use crate::error::RemoteQueryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The value shapes a property can take on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    /// Plain strings and string-encoded enumerations.
    Text(String),
    Timestamp(DateTime<Utc>),
    List(Vec<RawValue>),
    /// A data object with its type name and fields.
    Data {
        type_name: String,
        fields: Vec<DynamicProperty>,
    },
    /// A value the exporter has no reading for; holds its type name.
    Unsupported(String),
}

impl RawValue {
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Float(_) => "float",
            RawValue::Int(_) => "int",
            RawValue::Bool(_) => "bool",
            RawValue::Text(_) => "text",
            RawValue::Timestamp(_) => "timestamp",
            RawValue::List(_) => "list",
            RawValue::Data { .. } => "data",
            RawValue::Unsupported(_) => "unsupported",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RawValue]> {
        match self {
            RawValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// A field of a data object.
    pub fn field(&self, name: &str) -> Option<&RawValue> {
        match self {
            RawValue::Data { fields, .. } => {
                fields.iter().find(|f| f.name == name).map(|f| &f.value)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Float(v) => write!(f, "{}", v),
            RawValue::Int(v) => write!(f, "{}", v),
            RawValue::Bool(v) => write!(f, "{}", v),
            RawValue::Text(v) => write!(f, "{}", v),
            RawValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            RawValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            RawValue::Data { type_name, .. } | RawValue::Unsupported(type_name) => {
                write!(f, "<{}>", type_name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicProperty {
    pub name: String,
    pub value: RawValue,
}

impl DynamicProperty {
    pub fn new(name: impl Into<String>, value: RawValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectRef {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// One managed object returned by a property query.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectContent {
    pub obj: ManagedObjectRef,
    pub properties: Vec<DynamicProperty>,
}

impl ObjectContent {
    pub fn property(&self, name: &str) -> Option<&RawValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// The remote management endpoint. Session sign-in and sign-out belong to
/// whoever constructs the source.
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Host name of the endpoint, used as a label by plugins.
    fn endpoint(&self) -> &str;

    /// Opens a recursive container view over the root folder, filtered to `kinds`.
    async fn create_container_view(
        &self,
        kinds: &[&str],
    ) -> Result<ManagedObjectRef, RemoteQueryError>;

    async fn destroy_view(&self, view: &ManagedObjectRef) -> Result<(), RemoteQueryError>;

    /// Retrieves `paths` for every object of type `kind` reachable through `view`.
    async fn retrieve_properties(
        &self,
        view: &ManagedObjectRef,
        kind: &str,
        paths: &[String],
    ) -> Result<Vec<ObjectContent>, RemoteQueryError>;
}
