//! # XML Format
//!
//! Messages are written with their short name as the root element and one child element
//! per populated field; repeated fields repeat the element and map fields hold one child
//! element per key. Decoding ignores the root element's name.
//!
//! XML carries no types of its own, so decoding reads the document into an element tree
//! and maps it onto the protobuf JSON representation using the target message schema:
//! each element is matched to a field by its proto or JSON name and its text is typed by
//! the field's kind.
use super::{CodecError, Decoder, DecoderMaker, Encoder, EncoderMaker, Input, Output};
use prost_reflect::{
    DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, ReflectMessage, SerializeOptions,
};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Number, Value as JsonValue};
use std::io::{BufRead, BufReader, Write};

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("Malformed XML: '{0}'")]
    Syntax(#[from] quick_xml::Error),
    #[error("Document has no root element")]
    MissingRoot,
    #[error("Unexpected closing tag")]
    UnbalancedTag,
    #[error("Message '{message}' has no field '{element}'")]
    UnknownField { message: String, element: String },
    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlDecoderMaker;

impl DecoderMaker for XmlDecoderMaker {
    fn make_decoder(&self, input: Input) -> Decoder {
        Decoder::new(move |target: &mut DynamicMessage| {
            let descriptor = target.descriptor();
            let root = read_document(BufReader::new(input))
                .map_err(|e| CodecError::decode("xml", e))?;
            let json = message_to_json(&descriptor, &root)
                .map_err(|e| CodecError::decode("xml", e))?;
            let message = DynamicMessage::deserialize(descriptor, json)
                .map_err(|e| CodecError::decode("xml", e))?;

            *target = message;
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Default::default()
        }
    }
}

fn read_document<R: BufRead>(input: R) -> Result<Element, XmlError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut open: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(tag) => open.push(Element::named(tag.local_name().as_ref())),
            Event::Empty(tag) => {
                let element = Element::named(tag.local_name().as_ref());
                match open.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = root.or(Some(element)),
                }
            }
            Event::Text(text) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let element = open.pop().ok_or(XmlError::UnbalancedTag)?;
                match open.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = root.or(Some(element)),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or(XmlError::MissingRoot)
}

fn find_field(
    descriptor: &MessageDescriptor,
    element: &str,
) -> Result<FieldDescriptor, XmlError> {
    descriptor
        .get_field_by_name(element)
        .or_else(|| descriptor.get_field_by_json_name(element))
        .ok_or_else(|| XmlError::UnknownField {
            message: descriptor.full_name().to_string(),
            element: element.to_string(),
        })
}

fn message_to_json(
    descriptor: &MessageDescriptor,
    element: &Element,
) -> Result<JsonValue, XmlError> {
    let mut object = Map::new();

    for child in &element.children {
        let field = find_field(descriptor, &child.name)?;
        let key = field.json_name().to_string();

        if field.is_map() {
            let entries = map_to_json(&field, child)?;
            if let JsonValue::Object(map) = object
                .entry(key)
                .or_insert_with(|| JsonValue::Object(Map::new()))
            {
                map.extend(entries);
            }
        } else if field.is_list() {
            let value = kind_to_json(&field, &field.kind(), child)?;
            if let JsonValue::Array(items) = object
                .entry(key)
                .or_insert_with(|| JsonValue::Array(Vec::new()))
            {
                items.push(value);
            }
        } else {
            object.insert(key, kind_to_json(&field, &field.kind(), child)?);
        }
    }

    Ok(JsonValue::Object(object))
}

fn map_to_json(
    field: &FieldDescriptor,
    element: &Element,
) -> Result<Map<String, JsonValue>, XmlError> {
    let Kind::Message(entry) = field.kind() else {
        return Ok(Map::new());
    };
    let value_field = entry.map_entry_value_field();

    element
        .children
        .iter()
        .map(|child| {
            let value = kind_to_json(field, &value_field.kind(), child)?;
            Ok((child.name.clone(), value))
        })
        .collect()
}

fn kind_to_json(
    field: &FieldDescriptor,
    kind: &Kind,
    element: &Element,
) -> Result<JsonValue, XmlError> {
    let text = element.text.as_str();
    let invalid = || XmlError::InvalidValue {
        field: field.full_name().to_string(),
        value: text.to_string(),
    };

    let value = match kind {
        // Well-known types such as Timestamp are written as plain text.
        Kind::Message(_) if element.children.is_empty() && !text.is_empty() => {
            JsonValue::String(text.to_string())
        }
        Kind::Message(message) => message_to_json(message, element)?,
        Kind::Bool => JsonValue::Bool(text.parse().map_err(|_| invalid())?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            JsonValue::Number(text.parse::<i32>().map_err(|_| invalid())?.into())
        }
        Kind::Uint32 | Kind::Fixed32 => {
            JsonValue::Number(text.parse::<u32>().map_err(|_| invalid())?.into())
        }
        // 64-bit integers travel as strings in the JSON mapping.
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 | Kind::Uint64 | Kind::Fixed64 => {
            JsonValue::String(text.to_string())
        }
        Kind::Float | Kind::Double => match text.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(number) => JsonValue::Number(number),
            // NaN and the infinities are spelled out.
            None => JsonValue::String(text.to_string()),
        },
        Kind::Enum(_) => match text.parse::<i32>() {
            Ok(number) => JsonValue::Number(number.into()),
            Err(_) => JsonValue::String(text.to_string()),
        },
        Kind::String | Kind::Bytes => JsonValue::String(text.to_string()),
    };

    Ok(value)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlEncoderMaker {
    pretty: bool,
}

impl XmlEncoderMaker {
    pub fn plain() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl EncoderMaker for XmlEncoderMaker {
    fn make_encoder(&self, mut output: Output) -> Encoder {
        let pretty = self.pretty;
        let options = SerializeOptions::new();

        Encoder::new(move |message: &DynamicMessage| {
            let descriptor = message.descriptor();
            let mut document = String::new();

            let mut ser =
                quick_xml::se::Serializer::with_root(&mut document, Some(descriptor.name()))
                    .map_err(|e| CodecError::encode("xml", e))?;
            if pretty {
                ser.indent(' ', 2);
            }
            message
                .serialize_with_options(ser, &options)
                .map_err(|e| CodecError::encode("xml", e))?;

            output.write_all(document.as_bytes())?;
            writeln!(output)?;
            output.flush()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::{SharedBuffer, echo_request_descriptor, field};
    use prost_reflect::{DescriptorPool, MapKey, Value};
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, MessageOptions,
        field_descriptor_proto::{Label, Type},
    };
    use std::io::Cursor;

    fn typed(field: FieldDescriptorProto, type_name: &str) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..field
        }
    }

    /// `demo.Profile` with scalar, enum, repeated, nested and map fields.
    fn profile_descriptor() -> MessageDescriptor {
        let mood = EnumDescriptorProto {
            name: Some("Mood".to_string()),
            value: vec![
                EnumValueDescriptorProto {
                    name: Some("MOOD_UNSPECIFIED".to_string()),
                    number: Some(0),
                    ..Default::default()
                },
                EnumValueDescriptorProto {
                    name: Some("HAPPY".to_string()),
                    number: Some(1),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let address = DescriptorProto {
            name: Some("Address".to_string()),
            field: vec![
                field("city", "city", 1, Type::String, Label::Optional),
                field("zip", "zip", 2, Type::Uint32, Label::Optional),
            ],
            ..Default::default()
        };
        let scores_entry = DescriptorProto {
            name: Some("ScoresEntry".to_string()),
            field: vec![
                field("key", "key", 1, Type::String, Label::Optional),
                field("value", "value", 2, Type::Int64, Label::Optional),
            ],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let profile = DescriptorProto {
            name: Some("Profile".to_string()),
            field: vec![
                field("display_name", "displayName", 1, Type::String, Label::Optional),
                field("age", "age", 2, Type::Int32, Label::Optional),
                field("active", "active", 3, Type::Bool, Label::Optional),
                typed(
                    field("mood", "mood", 4, Type::Enum, Label::Optional),
                    ".demo.Mood",
                ),
                field("tags", "tags", 5, Type::String, Label::Repeated),
                typed(
                    field("address", "address", 6, Type::Message, Label::Optional),
                    ".demo.Profile.Address",
                ),
                typed(
                    field("scores", "scores", 7, Type::Message, Label::Repeated),
                    ".demo.Profile.ScoresEntry",
                ),
                field("visits", "visits", 8, Type::Int64, Label::Optional),
                field("ratio", "ratio", 9, Type::Double, Label::Optional),
            ],
            nested_type: vec![address, scores_entry],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("demo.proto".to_string()),
            package: Some("demo".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![profile],
            enum_type: vec![mood],
            ..Default::default()
        };

        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_proto(file).unwrap();
        pool.get_message_by_name("demo.Profile").unwrap()
    }

    fn decode(descriptor: MessageDescriptor, payload: &str) -> Result<DynamicMessage, CodecError> {
        let mut message = DynamicMessage::new(descriptor);
        XmlDecoderMaker
            .make_decoder(Box::new(Cursor::new(payload.to_string())))
            .decode(&mut message)?;
        Ok(message)
    }

    fn encode(maker: XmlEncoderMaker, message: &DynamicMessage) -> String {
        let buffer = SharedBuffer::default();
        maker
            .make_encoder(Box::new(buffer.clone()))
            .encode(message)
            .unwrap();
        buffer.contents()
    }

    fn tags(message: &DynamicMessage) -> Vec<String> {
        message
            .get_field_by_name("tags")
            .unwrap()
            .as_list()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_encode_uses_message_name_as_root() {
        let mut message = DynamicMessage::new(echo_request_descriptor());
        message.set_field_by_name("message", Value::String("hi".to_string()));

        assert_eq!(
            encode(XmlEncoderMaker::plain(), &message),
            "<EchoRequest><message>hi</message></EchoRequest>\n"
        );
    }

    #[test]
    fn test_pretty_encode_indents_children() {
        let mut message = DynamicMessage::new(echo_request_descriptor());
        message.set_field_by_name("message", Value::String("hi".to_string()));

        assert!(
            encode(XmlEncoderMaker::pretty(), &message).contains("\n  <message>hi</message>\n")
        );
    }

    #[test]
    fn test_decode_string_field() {
        let message = decode(
            echo_request_descriptor(),
            "<EchoRequest><message>from xml</message></EchoRequest>",
        )
        .unwrap();

        assert_eq!(
            message.get_field_by_name("message").unwrap().as_str(),
            Some("from xml")
        );
    }

    #[test]
    fn test_decode_types_scalars_by_field_kind() {
        let message = decode(
            profile_descriptor(),
            "<Profile><age>36</age><active>true</active><mood>HAPPY</mood>\
             <visits>12</visits><ratio>0.5</ratio></Profile>",
        )
        .unwrap();

        assert_eq!(message.get_field_by_name("age").unwrap().as_i32(), Some(36));
        assert_eq!(message.get_field_by_name("active").unwrap().as_bool(), Some(true));
        assert_eq!(
            message.get_field_by_name("mood").unwrap().as_enum_number(),
            Some(1)
        );
        assert_eq!(message.get_field_by_name("visits").unwrap().as_i64(), Some(12));
        assert_eq!(message.get_field_by_name("ratio").unwrap().as_f64(), Some(0.5));
    }

    #[test]
    fn test_decode_enum_by_number() {
        let message = decode(profile_descriptor(), "<Profile><mood>1</mood></Profile>").unwrap();

        assert_eq!(
            message.get_field_by_name("mood").unwrap().as_enum_number(),
            Some(1)
        );
    }

    #[test]
    fn test_decode_repeated_field() {
        let single = decode(
            echo_request_descriptor(),
            "<EchoRequest><tags>a</tags></EchoRequest>",
        )
        .unwrap();
        assert_eq!(tags(&single), vec!["a"]);

        let several = decode(
            echo_request_descriptor(),
            "<EchoRequest><tags>a</tags><count>3</count><tags>b</tags></EchoRequest>",
        )
        .unwrap();
        assert_eq!(tags(&several), vec!["a", "b"]);
        assert_eq!(several.get_field_by_name("count").unwrap().as_i32(), Some(3));
    }

    #[test]
    fn test_decode_nested_message_and_map() {
        let message = decode(
            profile_descriptor(),
            "<Profile><address><city>Paris</city><zip>75001</zip></address>\
             <scores><math>3</math><art>5</art></scores></Profile>",
        )
        .unwrap();

        let address = message.get_field_by_name("address").unwrap();
        let address = address.as_message().unwrap();
        assert_eq!(address.get_field_by_name("city").unwrap().as_str(), Some("Paris"));
        assert_eq!(address.get_field_by_name("zip").unwrap().as_u32(), Some(75001));

        let scores = message.get_field_by_name("scores").unwrap();
        let scores = scores.as_map().unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(
            scores.get(&MapKey::String("math".to_string())),
            Some(&Value::I64(3))
        );
    }

    #[test]
    fn test_decode_accepts_json_field_names() {
        let message = decode(
            profile_descriptor(),
            "<Profile><displayName>Ada</displayName></Profile>",
        )
        .unwrap();

        assert_eq!(
            message.get_field_by_name("display_name").unwrap().as_str(),
            Some("Ada")
        );
    }

    #[test]
    fn test_decode_rejects_unknown_element() {
        let err = decode(profile_descriptor(), "<Profile><nickname>x</nickname></Profile>")
            .unwrap_err();

        assert!(matches!(err, CodecError::Decode { ref format, .. } if format == "xml"));
        assert!(err.to_string().contains("no field 'nickname'"));
    }

    #[test]
    fn test_decode_rejects_mistyped_value() {
        let err = decode(profile_descriptor(), "<Profile><age>old</age></Profile>").unwrap_err();

        assert!(err.to_string().contains("Invalid value 'old'"));
    }

    #[test]
    fn test_decode_empty_document() {
        assert!(decode(profile_descriptor(), "").is_err());
    }

    #[test]
    fn test_decode_reads_back_encoded_messages() {
        let mut echo = DynamicMessage::new(echo_request_descriptor());
        echo.set_field_by_name("message", Value::String("hi".to_string()));
        echo.set_field_by_name("count", Value::I32(7));
        echo.set_field_by_name(
            "tags",
            Value::List(vec![
                Value::String("a".to_string()),
                Value::String("b".to_string()),
            ]),
        );

        let document = encode(XmlEncoderMaker::plain(), &echo);
        assert_eq!(decode(echo_request_descriptor(), &document).unwrap(), echo);

        let mut profile = DynamicMessage::new(profile_descriptor());
        profile.set_field_by_name("display_name", Value::String("Ada".to_string()));
        profile.set_field_by_name("active", Value::Bool(true));
        profile.set_field_by_name("mood", Value::EnumNumber(1));
        profile.set_field_by_name("visits", Value::I64(12));

        let document = encode(XmlEncoderMaker::pretty(), &profile);
        assert_eq!(decode(profile_descriptor(), &document).unwrap(), profile);
    }
}
