//! Serialization seam for request and reply values.
//!
//! The runtime never picks a wire format. A request or reply type only has to implement
//! [`Serialize`], [`Deserialize`] and [`WithContentType`]; every such type is then a
//! [`Message`], the object safe view the dispatch path works with.

use crate::errors::BoxError;
use bytes::Bytes;
use std::any::Any;
use std::convert::Infallible;
use std::fmt;

const APPLICATION_JSON: &str = "application/json";
const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

pub trait Serialize {
    type Error: std::error::Error + Send + Sync + 'static;

    fn serialize(&self) -> Result<Bytes, Self::Error>;
}

pub trait Deserialize
where
    Self: Sized,
{
    type Error: std::error::Error + Send + Sync + 'static;

    fn deserialize(bytes: &mut Bytes) -> Result<Self, Self::Error>;
}

pub trait WithContentType {
    fn content_type() -> &'static str;
}

/// Type erased request or reply value.
///
/// Requests are allocated by the runtime and decoded in place through [`Message::merge`],
/// replies are encoded by the transport through [`Message::encode`].
pub trait Message: Any + Send + 'static {
    fn encode(&self) -> Result<Bytes, BoxError>;

    /// Replace the contents of this value with the decoded `bytes`.
    fn merge(&mut self, bytes: &mut Bytes) -> Result<(), BoxError>;

    fn content_type(&self) -> &'static str;

    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T> Message for T
where
    T: Serialize + Deserialize + WithContentType + Send + 'static,
{
    fn encode(&self) -> Result<Bytes, BoxError> {
        self.serialize().map_err(Into::into)
    }

    fn merge(&mut self, bytes: &mut Bytes) -> Result<(), BoxError> {
        *self = T::deserialize(bytes)?;
        Ok(())
    }

    fn content_type(&self) -> &'static str {
        T::content_type()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl dyn Message {
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Message>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    /// Take ownership of the concrete value, `None` if this is not a `T`.
    pub fn downcast<T: Message>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast().ok()
    }
}

impl fmt::Debug for dyn Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.type_name())
            .finish_non_exhaustive()
    }
}

// --- Unit type

impl Serialize for () {
    type Error = Infallible;

    fn serialize(&self) -> Result<Bytes, Self::Error> {
        Ok(Bytes::new())
    }
}

impl Deserialize for () {
    type Error = Infallible;

    fn deserialize(_: &mut Bytes) -> Result<Self, Self::Error> {
        Ok(())
    }
}

impl WithContentType for () {
    fn content_type() -> &'static str {
        ""
    }
}

// --- Raw payloads, passed through untouched

macro_rules! impl_raw_payloads {
    ($($ty:ty => $encode:expr),* $(,)?) => {
        $(
            impl Serialize for $ty {
                type Error = Infallible;

                fn serialize(&self) -> Result<Bytes, Self::Error> {
                    Ok(($encode)(self))
                }
            }

            impl Deserialize for $ty {
                type Error = Infallible;

                fn deserialize(bytes: &mut Bytes) -> Result<Self, Self::Error> {
                    Ok(<$ty>::from(std::mem::take(bytes)))
                }
            }

            impl WithContentType for $ty {
                fn content_type() -> &'static str {
                    APPLICATION_OCTET_STREAM
                }
            }
        )*
    };
}

impl_raw_payloads!(
    Vec<u8> => |v: &Vec<u8>| Bytes::copy_from_slice(v),
    Bytes => Bytes::clone,
);

// --- Primitives, JSON encoded

macro_rules! impl_json_primitives {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Serialize for $ty {
                type Error = serde_json::Error;

                fn serialize(&self) -> Result<Bytes, Self::Error> {
                    serde_json::to_vec(&self).map(Bytes::from)
                }
            }

            impl Deserialize for $ty {
                type Error = serde_json::Error;

                fn deserialize(bytes: &mut Bytes) -> Result<Self, Self::Error> {
                    serde_json::from_slice(bytes)
                }
            }

            impl WithContentType for $ty {
                fn content_type() -> &'static str {
                    APPLICATION_JSON
                }
            }
        )*
    };
}

impl_json_primitives!(String, bool, u32, u64, i32, i64, f64);

// --- Json wrapper

/// Wrapper encoding `T` as JSON through `serde`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Json<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> Serialize for Json<T>
where
    T: serde::Serialize,
{
    type Error = serde_json::Error;

    fn serialize(&self) -> Result<Bytes, Self::Error> {
        serde_json::to_vec(&self.0).map(Bytes::from)
    }
}

impl<T> Deserialize for Json<T>
where
    for<'a> T: serde::Deserialize<'a>,
{
    type Error = serde_json::Error;

    fn deserialize(bytes: &mut Bytes) -> Result<Self, Self::Error> {
        serde_json::from_slice(bytes).map(Json)
    }
}

impl<T> WithContentType for Json<T> {
    fn content_type() -> &'static str {
        APPLICATION_JSON
    }
}
