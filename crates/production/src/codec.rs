//! Message framing for the ABCI socket transport.
//!
//! # Wire Format
//!
//! ```text
//! [length: u32 big-endian][payload: JSON-encoded Request or Response]
//! ```
//!
//! Requests and responses are adjacently tagged (`{"type": ..., "value": ...}`),
//! so the message type travels inside the payload. Frames larger than
//! [`MAX_FRAME_LENGTH`] are rejected.
//!
//! A payload that is not valid JSON is yielded as an `Err` item rather than
//! a stream error: the frame was consumed whole, so the stream stays usable.
//! Only I/O failures and oversized frames end the stream.

use abci_proxy_types::abci::{Request, Response};
use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Largest accepted frame payload.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Errors that can occur during framing.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decoded frame: the message, or why its payload did not parse.
pub type Decoded<D> = Result<D, serde_json::Error>;

/// Length-delimited JSON codec decoding `D` and encoding `E`.
pub struct AbciCodec<D, E> {
    inner: LengthDelimitedCodec,
    _marker: PhantomData<fn() -> (D, E)>,
}

/// Codec for the side that receives requests.
pub type ServerCodec = AbciCodec<Request, Response>;

/// Codec for the side that sends requests.
pub type ClientCodec = AbciCodec<Response, Request>;

impl<D, E> AbciCodec<D, E> {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .big_endian()
                .length_field_type::<u32>()
                .max_frame_length(MAX_FRAME_LENGTH)
                .new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<D, E> Default for AbciCodec<D, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DeserializeOwned, E> Decoder for AbciCodec<D, E> {
    type Item = Decoded<D>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Decoded<D>>, CodecError> {
        Ok(self
            .inner
            .decode(src)?
            .map(|frame| serde_json::from_slice(&frame)))
    }
}

impl<D, E: Serialize> Encoder<E> for AbciCodec<D, E> {
    type Error = CodecError;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), CodecError> {
        let payload = serde_json::to_vec(&item)?;
        self.inner.encode(Bytes::from(payload), dst)?;
        Ok(())
    }
}
