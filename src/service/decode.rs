//! Decode seam between a transport and the request a handler allocates.

use crate::errors::BoxError;
use crate::serde::Message;
use bytes::Bytes;

/// Fills a freshly allocated request in place.
///
/// Any `FnMut(&mut dyn Message) -> Result<(), BoxError>` closure is a decoder, see
/// [`decode_with`] for a helper that pins down the closure signature.
pub trait Decoder {
    fn decode(&mut self, target: &mut dyn Message) -> Result<(), BoxError>;
}

impl<F> Decoder for F
where
    F: FnMut(&mut dyn Message) -> Result<(), BoxError>,
{
    fn decode(&mut self, target: &mut dyn Message) -> Result<(), BoxError> {
        self(target)
    }
}

/// Decoder merging a raw payload into the target.
#[derive(Debug, Clone, Default)]
pub struct PayloadDecoder(Bytes);

impl PayloadDecoder {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self(payload.into())
    }
}

impl Decoder for PayloadDecoder {
    fn decode(&mut self, target: &mut dyn Message) -> Result<(), BoxError> {
        target.merge(&mut self.0)
    }
}

/// Build a decoder from a closure.
pub fn decode_with<F>(f: F) -> F
where
    F: FnMut(&mut dyn Message) -> Result<(), BoxError>,
{
    f
}
