//! Embedded schema for `grpc.health.v1`.
//!
//! Only the unary `Check` method is described; `Watch` streams and is not offered.
use grpcmd_core::prost_reflect::{DescriptorError, DescriptorPool, ServiceDescriptor};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};

pub const HEALTH_SERVICE: &str = "grpc.health.v1.Health";

fn field(name: &str, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        json_name: Some(name.to_string()),
        number: Some(1),
        r#type: Some(ty as i32),
        label: Some(Label::Optional as i32),
        ..Default::default()
    }
}

fn serving_status() -> EnumDescriptorProto {
    let values = ["UNKNOWN", "SERVING", "NOT_SERVING", "SERVICE_UNKNOWN"];

    EnumDescriptorProto {
        name: Some("ServingStatus".to_string()),
        value: values
            .iter()
            .zip(0..)
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn health_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("grpc/health/v1/health.proto".to_string()),
        package: Some("grpc.health.v1".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            DescriptorProto {
                name: Some("HealthCheckRequest".to_string()),
                field: vec![field("service", Type::String)],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("HealthCheckResponse".to_string()),
                field: vec![FieldDescriptorProto {
                    type_name: Some(
                        ".grpc.health.v1.HealthCheckResponse.ServingStatus".to_string(),
                    ),
                    ..field("status", Type::Enum)
                }],
                enum_type: vec![serving_status()],
                ..Default::default()
            },
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("Health".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("Check".to_string()),
                input_type: Some(".grpc.health.v1.HealthCheckRequest".to_string()),
                output_type: Some(".grpc.health.v1.HealthCheckResponse".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Builds the descriptor pool and returns the health service, if present.
pub fn health_service() -> Result<Option<ServiceDescriptor>, DescriptorError> {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(health_file())?;
    Ok(pool.get_service_by_name(HEALTH_SERVICE))
}
