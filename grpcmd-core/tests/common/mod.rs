#![allow(dead_code)]

use grpcmd_core::codec::{Encoder, EncoderMaker, Output, json::JsonEncoderMaker};
use grpcmd_core::prost_reflect::{DescriptorPool, MethodDescriptor};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tonic::{Request, Status, service::interceptor::InterceptedService};

fn field(name: &str, json_name: &str, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        json_name: Some(json_name.to_string()),
        number: Some(1),
        r#type: Some(ty as i32),
        label: Some(Label::Optional as i32),
        ..Default::default()
    }
}

fn enum_value(name: &str, number: i32) -> EnumValueDescriptorProto {
    EnumValueDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        ..Default::default()
    }
}

/// The unary part of `grpc/health/v1/health.proto`.
pub fn health_check_method() -> MethodDescriptor {
    let status = FieldDescriptorProto {
        type_name: Some(".grpc.health.v1.HealthCheckResponse.ServingStatus".to_string()),
        ..field("status", "status", Type::Enum)
    };

    let file = FileDescriptorProto {
        name: Some("grpc/health/v1/health.proto".to_string()),
        package: Some("grpc.health.v1".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            DescriptorProto {
                name: Some("HealthCheckRequest".to_string()),
                field: vec![field("service", "service", Type::String)],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("HealthCheckResponse".to_string()),
                field: vec![status],
                enum_type: vec![EnumDescriptorProto {
                    name: Some("ServingStatus".to_string()),
                    value: vec![
                        enum_value("UNKNOWN", 0),
                        enum_value("SERVING", 1),
                        enum_value("NOT_SERVING", 2),
                        enum_value("SERVICE_UNKNOWN", 3),
                    ],
                    ..Default::default()
                }],
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
    };

    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(file)
        .expect("Failed to build health descriptor");
    pool.get_service_by_name("grpc.health.v1.Health")
        .and_then(|service| service.methods().find(|m| m.name() == "Check"))
        .expect("Check method not found")
}

/// Headers received by the test server, one entry per request.
#[derive(Clone, Default)]
pub struct SeenHeaders(Arc<Mutex<Vec<Option<String>>>>);

impl SeenHeaders {
    pub fn authorization(&self) -> Vec<Option<String>> {
        self.0.lock().unwrap().clone()
    }
}

/// Starts a health server on an ephemeral local port.
///
/// The default service reports `SERVING`; `grpcmd.Down` reports `NOT_SERVING`.
pub async fn start_health_server() -> (SocketAddr, SeenHeaders) {
    let (reporter, service) = tonic_health::server::health_reporter();
    reporter
        .set_service_status("grpcmd.Down", tonic_health::ServingStatus::NotServing)
        .await;

    let seen = SeenHeaders::default();
    let recorder = seen.clone();
    let service = InterceptedService::new(service, move |request: Request<()>| {
        let auth = request
            .metadata()
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        recorder.0.lock().unwrap().push(auth);
        Ok::<_, Status>(request)
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _reporter = reporter;
        Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    (addr, seen)
}

/// Starts a TLS health server on an ephemeral local port, presenting the `server.pem`
/// fixture (valid for `localhost` and `127.0.0.1`, issued by `ca.pem`).
///
/// With `require_client_cert` the server only accepts clients presenting a certificate
/// issued by `ca.pem`.
pub async fn start_tls_health_server(require_client_cert: bool) -> SocketAddr {
    let (reporter, service) = tonic_health::server::health_reporter();
    let read = |name: &str| std::fs::read(fixture(name)).unwrap();

    let mut tls =
        ServerTlsConfig::new().identity(Identity::from_pem(read("server.pem"), read("server.key")));
    if require_client_cert {
        tls = tls.client_ca_root(Certificate::from_pem(read("ca.pem")));
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _reporter = reporter;
        Server::builder()
            .tls_config(tls)
            .unwrap()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    addr
}

/// An encoder target that can be inspected after the round trip.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// An encoder maker writing plain JSON here instead of to the given output.
    pub fn maker(&self) -> impl Fn(Output) -> Encoder + Send + Sync + 'static {
        let sink = self.clone();
        move |_stdout: Output| JsonEncoderMaker::plain().make_encoder(Box::new(sink.clone()))
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
