//! # Request Decoders & Response Encoders
//!
//! Generated commands never read or print payloads themselves. They receive a [`Decoder`]
//! bound to the request stream and an [`Encoder`] bound to the response stream, both
//! resolved by format name from a [`Formats`] registry.
//!
//! ## How it works
//!
//! 1. A [`DecoderMaker`] (or [`EncoderMaker`]) is registered under a format name such as
//!    `json` or `xml`.
//! 2. When a round trip starts, the maker for the selected format is handed the concrete
//!    stream (a request file, stdin, stdout) and returns a bound [`Decoder`]/[`Encoder`].
//! 3. The command decodes into the request message, performs the call, and encodes the
//!    response message.
//!
//! Payloads are `prost_reflect::DynamicMessage` values, so every format speaks the
//! protobuf schema of the message being exchanged. Generated message types go through
//! [`Decoder::decode_message`] and [`Encoder::encode_message`], which transcode via
//! `prost_reflect::ReflectMessage`.
pub mod json;
pub mod xml;

use crate::BoxError;
use prost_reflect::{DynamicMessage, ReflectMessage};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::{Read, Write};
use std::sync::Arc;

/// A readable stream a decoder takes ownership of.
pub type Input = Box<dyn Read + Send>;

/// A writable stream an encoder takes ownership of.
pub type Output = Box<dyn Write + Send>;

type DecodeFn = Box<dyn FnOnce(&mut DynamicMessage) -> Result<(), CodecError> + Send>;
type EncodeFn = Box<dyn FnMut(&DynamicMessage) -> Result<(), CodecError> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to decode {format} payload: '{source}'")]
    Decode {
        format: String,
        #[source]
        source: BoxError,
    },
    #[error("Failed to encode {format} payload: '{source}'")]
    Encode {
        format: String,
        #[source]
        source: BoxError,
    },
    #[error("Failed to write payload: '{0}'")]
    Io(#[from] std::io::Error),
    #[error("Failed to transcode message: '{0}'")]
    Transcode(#[from] prost::DecodeError),
}

impl CodecError {
    pub fn decode(format: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CodecError::Decode {
            format: format.into(),
            source: source.into(),
        }
    }

    pub fn encode(format: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CodecError::Encode {
            format: format.into(),
            source: source.into(),
        }
    }
}

/// A single-use request decoder bound to one stream.
///
/// Decoding consumes the decoder, which drops (and therefore closes) any stream it owns,
/// whether decoding succeeded or not.
pub struct Decoder {
    decode: Option<DecodeFn>,
}

impl Decoder {
    pub fn new<F>(decode: F) -> Self
    where
        F: FnOnce(&mut DynamicMessage) -> Result<(), CodecError> + Send + 'static,
    {
        Self {
            decode: Some(Box::new(decode)),
        }
    }

    /// A decoder that succeeds without touching its target.
    pub fn noop() -> Self {
        Self { decode: None }
    }

    pub fn is_noop(&self) -> bool {
        self.decode.is_none()
    }

    /// Decodes the bound payload into `target`, replacing its contents.
    pub fn decode(self, target: &mut DynamicMessage) -> Result<(), CodecError> {
        match self.decode {
            Some(decode) => decode(target),
            None => Ok(()),
        }
    }

    /// Decodes the bound payload into a generated message type.
    pub fn decode_message<T>(self, target: &mut T) -> Result<(), CodecError>
    where
        T: ReflectMessage + Default,
    {
        if self.is_noop() {
            return Ok(());
        }

        let mut message = target.transcode_to_dynamic();
        self.decode(&mut message)?;
        *target = message.transcode_to::<T>()?;
        Ok(())
    }
}

impl Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("noop", &self.is_noop())
            .finish()
    }
}

/// A response encoder bound to one stream.
pub struct Encoder {
    encode: Option<EncodeFn>,
}

impl Encoder {
    pub fn new<F>(encode: F) -> Self
    where
        F: FnMut(&DynamicMessage) -> Result<(), CodecError> + Send + 'static,
    {
        Self {
            encode: Some(Box::new(encode)),
        }
    }

    /// An encoder that accepts every message and writes nothing.
    pub fn noop() -> Self {
        Self { encode: None }
    }

    pub fn is_noop(&self) -> bool {
        self.encode.is_none()
    }

    pub fn encode(&mut self, message: &DynamicMessage) -> Result<(), CodecError> {
        match self.encode.as_mut() {
            Some(encode) => encode(message),
            None => Ok(()),
        }
    }

    /// Encodes a generated message type.
    pub fn encode_message<T: ReflectMessage>(&mut self, message: &T) -> Result<(), CodecError> {
        if self.is_noop() {
            return Ok(());
        }
        self.encode(&message.transcode_to_dynamic())
    }
}

impl Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("noop", &self.is_noop())
            .finish()
    }
}

/// Binds a [`Decoder`] to a concrete input stream.
pub trait DecoderMaker: Send + Sync {
    fn make_decoder(&self, input: Input) -> Decoder;
}

impl<F> DecoderMaker for F
where
    F: Fn(Input) -> Decoder + Send + Sync,
{
    fn make_decoder(&self, input: Input) -> Decoder {
        self(input)
    }
}

/// Binds an [`Encoder`] to a concrete output stream.
pub trait EncoderMaker: Send + Sync {
    fn make_encoder(&self, output: Output) -> Encoder;
}

impl<F> EncoderMaker for F
where
    F: Fn(Output) -> Encoder + Send + Sync,
{
    fn make_encoder(&self, output: Output) -> Encoder {
        self(output)
    }
}

/// A registry of makers keyed by format name.
///
/// The underlying map is shared between clones and copied on the first write, so a
/// registry handed to one configuration can never observe entries added through another.
pub struct Formats<M: ?Sized> {
    makers: Arc<BTreeMap<String, Arc<M>>>,
}

impl<M: ?Sized> Formats<M> {
    pub fn new() -> Self {
        Self {
            makers: Arc::new(BTreeMap::new()),
        }
    }

    /// Adds or replaces the maker for `format`.
    pub fn insert(&mut self, format: impl Into<String>, maker: Arc<M>) {
        Arc::make_mut(&mut self.makers).insert(format.into(), maker);
    }

    /// Returns a new registry with `maker` added, leaving `self` untouched.
    pub fn with(&self, format: impl Into<String>, maker: Arc<M>) -> Self {
        let mut next = self.clone();
        next.insert(format, maker);
        next
    }

    pub fn get(&self, format: &str) -> Option<&Arc<M>> {
        self.makers.get(format)
    }

    pub fn contains(&self, format: &str) -> bool {
        self.makers.contains_key(format)
    }

    /// Registered format names in lexicographic order.
    pub fn names(&self) -> Vec<&str> {
        self.makers.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.makers.is_empty()
    }
}

impl<M: ?Sized> Clone for Formats<M> {
    fn clone(&self) -> Self {
        Self {
            makers: Arc::clone(&self.makers),
        }
    }
}

impl<M: ?Sized> Default for Formats<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized> Debug for Formats<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.makers.keys()).finish()
    }
}

/// Request formats available out of the box: `json`, `xml`.
pub fn builtin_decoders() -> Formats<dyn DecoderMaker> {
    let mut formats: Formats<dyn DecoderMaker> = Formats::new();
    formats.insert("json", Arc::new(json::JsonDecoderMaker));
    formats.insert("xml", Arc::new(xml::XmlDecoderMaker));
    formats
}

/// Response formats available out of the box: `json`, `prettyjson`, `xml`, `prettyxml`.
pub fn builtin_encoders() -> Formats<dyn EncoderMaker> {
    let mut formats: Formats<dyn EncoderMaker> = Formats::new();
    formats.insert("json", Arc::new(json::JsonEncoderMaker::plain()));
    formats.insert("prettyjson", Arc::new(json::JsonEncoderMaker::pretty()));
    formats.insert("xml", Arc::new(xml::XmlEncoderMaker::plain()));
    formats.insert("prettyxml", Arc::new(xml::XmlEncoderMaker::pretty()));
    formats
}
