use bytes::Bytes;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Metadata key carrying the routing hint for the delivery component.
pub const DESTINATION_HINT: &str = "destination-hint";

/// Caller-owned value carried from a work item to its report untouched.
pub struct Opaque(Box<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

/// Unit of data submitted to the forwarder.
#[derive(Debug)]
pub struct WorkItem {
    /// Message body, forwarded byte for byte
    pub payload: Bytes,
    /// Per-item routing metadata
    pub metadata: HashMap<String, String>,
    /// Passed through to the report without interpretation
    pub opaque: Option<Opaque>,
}

impl WorkItem {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            metadata: HashMap::new(),
            opaque: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_opaque(mut self, opaque: Opaque) -> Self {
        self.opaque = Some(opaque);
        self
    }

    pub fn destination_hint(&self) -> Option<&str> {
        self.metadata.get(DESTINATION_HINT).map(String::as_str)
    }
}

/// Delivery outcome for one work item.
#[derive(Debug)]
pub struct Report {
    /// 0 on success
    pub code: u32,
    /// Human readable outcome
    pub status: String,
    /// Opaque value of the originating item
    pub opaque: Option<Opaque>,
}

impl Report {
    pub fn success(opaque: Option<Opaque>) -> Self {
        Self {
            code: 0,
            status: "OK".to_string(),
            opaque,
        }
    }

    pub fn failure(code: u32, status: impl Into<String>, opaque: Option<Opaque>) -> Self {
        Self {
            code,
            status: status.into(),
            opaque,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}
