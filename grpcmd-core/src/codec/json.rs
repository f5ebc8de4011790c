//! # JSON Format
//!
//! Uses the canonical protobuf JSON mapping (`lowerCamelCase` field names, enums by name,
//! 64-bit integers as strings) provided by `prost-reflect` on top of `serde_json`.
use super::{CodecError, Decoder, DecoderMaker, Encoder, EncoderMaker, Input, Output};
use prost_reflect::{DynamicMessage, ReflectMessage, SerializeOptions};
use serde_json::ser::PrettyFormatter;
use std::io::{BufReader, Write};

/// Decodes a single JSON document into the target message.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoderMaker;

impl DecoderMaker for JsonDecoderMaker {
    fn make_decoder(&self, input: Input) -> Decoder {
        Decoder::new(move |target: &mut DynamicMessage| {
            let mut de = serde_json::Deserializer::from_reader(BufReader::new(input));
            let message = DynamicMessage::deserialize(target.descriptor(), &mut de)
                .map_err(|e| CodecError::decode("json", e))?;
            de.end().map_err(|e| CodecError::decode("json", e))?;

            *target = message;
            Ok(())
        })
    }
}

/// Writes each message as one JSON document followed by a newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoderMaker {
    pretty: bool,
}

impl JsonEncoderMaker {
    pub fn plain() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl EncoderMaker for JsonEncoderMaker {
    fn make_encoder(&self, mut output: Output) -> Encoder {
        let pretty = self.pretty;
        let options = SerializeOptions::new();

        Encoder::new(move |message: &DynamicMessage| {
            let result = if pretty {
                let formatter = PrettyFormatter::with_indent(b"  ");
                let mut ser = serde_json::Serializer::with_formatter(&mut output, formatter);
                message.serialize_with_options(&mut ser, &options)
            } else {
                let mut ser = serde_json::Serializer::new(&mut output);
                message.serialize_with_options(&mut ser, &options)
            };
            result.map_err(|e| CodecError::encode("json", e))?;

            writeln!(output)?;
            output.flush()?;
            Ok(())
        })
    }
}
