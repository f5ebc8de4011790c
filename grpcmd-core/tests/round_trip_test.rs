use common::{Captured, health_check_method, start_health_server};
use grpcmd_core::config::{Config, ConfigBuilder, Opt, options};
use grpcmd_core::grpc::client::DynamicClient;
use grpcmd_core::prost_reflect::DynamicMessage;
use grpcmd_core::transport::{DialError, DialOptions};
use grpcmd_core::{BoxError, CallError, Context, RoundTripError, round_trip};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::Code;
use tonic::transport::{Channel, Endpoint};

mod common;

fn request_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn capture_config(addr: SocketAddr, captured: &Captured, extra: Vec<Opt>) -> Config {
    ConfigBuilder::from_defaults()
        .apply_all([
            options::with_server_addr(addr.to_string()),
            options::with_output_encoder("capture", captured.maker()),
            options::with_response_format("capture"),
        ])
        .apply_all(extra)
        .build()
}

async fn check(config: &Config) -> Result<(), RoundTripError> {
    let ctx = config.context().unwrap();

    round_trip(&ctx, config, |conn, decoder, mut encoder| async move {
        let method = health_check_method();
        let mut request = DynamicMessage::new(method.input());
        decoder.decode(&mut request)?;

        let response = DynamicClient::new(conn).unary(&method, request).await??;
        encoder.encode(&response)?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_check_reports_serving() {
    let (addr, _) = start_health_server().await;
    let captured = Captured::default();
    let file = request_file(".json", r#"{"service": ""}"#);

    let config = capture_config(
        addr,
        &captured,
        vec![options::with_request_file(file.path().to_str().unwrap())],
    );
    check(&config).await.unwrap();

    assert_eq!(captured.contents(), "{\"status\":\"SERVING\"}\n");
}

#[tokio::test]
async fn test_xml_request_file_selects_xml_decoder() {
    let (addr, _) = start_health_server().await;
    let captured = Captured::default();
    let file = request_file(
        ".xml",
        "<HealthCheckRequest><service>grpcmd.Down</service></HealthCheckRequest>",
    );

    let config = capture_config(
        addr,
        &captured,
        vec![
            options::with_request_file(file.path().to_str().unwrap()),
            options::with_request_format("json"),
        ],
    );
    check(&config).await.unwrap();

    assert_eq!(captured.contents(), "{\"status\":\"NOT_SERVING\"}\n");
}

#[tokio::test]
async fn test_remote_error_is_reported() {
    let (addr, _) = start_health_server().await;
    let captured = Captured::default();
    let file = request_file(".json", r#"{"service": "grpcmd.Missing"}"#);

    let config = capture_config(
        addr,
        &captured,
        vec![options::with_request_file(file.path().to_str().unwrap())],
    );
    let err = check(&config).await.unwrap_err();

    match err {
        RoundTripError::Call(CallError::Status(status)) => assert_eq!(status.code(), Code::NotFound),
        other => panic!("unexpected error: {other}"),
    }
    assert!(captured.contents().is_empty());
}

#[tokio::test]
async fn test_pre_dialer_metadata_reaches_the_server() {
    let (addr, seen) = start_health_server().await;
    let captured = Captured::default();

    let config = capture_config(
        addr,
        &captured,
        vec![options::with_pre_dialer(
            |_: &Context, options: &mut DialOptions| -> Result<(), BoxError> {
                options.append_metadata("authorization", "Bearer secret");
                Ok(())
            },
        )],
    );
    check(&config).await.unwrap();

    assert_eq!(seen.authorization(), vec![Some("Bearer secret".to_string())]);
    assert_eq!(captured.contents(), "{\"status\":\"SERVING\"}\n");
}

#[tokio::test]
async fn test_failing_pre_dialer_prevents_the_call() {
    let (addr, seen) = start_health_server().await;
    let captured = Captured::default();

    let config = capture_config(
        addr,
        &captured,
        vec![options::with_pre_dialer(
            |_: &Context, _: &mut DialOptions| -> Result<(), BoxError> {
                Err("token expired".into())
            },
        )],
    );
    let err = check(&config).await.unwrap_err();

    assert!(matches!(err, RoundTripError::Dial(DialError::PreDialer(_))));
    assert!(seen.authorization().is_empty());
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = capture_config(addr, &Captured::default(), vec![]);
    let err = check(&config).await.unwrap_err();

    assert!(matches!(
        err,
        RoundTripError::Dial(DialError::ConnectionFailed { .. })
    ));
}

#[tokio::test]
async fn test_injected_connection_is_used() {
    let (addr, seen) = start_health_server().await;
    let captured = Captured::default();
    let target = format!("http://{addr}");

    let config = capture_config(
        // Never dialed: the supplier's channel wins.
        "127.0.0.1:1".parse().unwrap(),
        &captured,
        vec![options::with_connection_supplier(Arc::new(
            move || -> Result<Channel, BoxError> {
                Ok(Endpoint::from_shared(target.clone())?.connect_lazy())
            },
        ))],
    );
    check(&config).await.unwrap();

    assert_eq!(seen.authorization(), vec![None]);
    assert_eq!(captured.contents(), "{\"status\":\"SERVING\"}\n");
}

#[tokio::test]
async fn test_flags_drive_the_round_trip() {
    let (addr, _) = start_health_server().await;
    let captured = Captured::default();
    let file = request_file(".json", r#"{"service": "grpcmd.Down"}"#);

    let mut config = ConfigBuilder::from_defaults()
        .apply_all(options::with_default_flags())
        .apply(&options::with_output_encoder("capture", captured.maker()))
        .build();

    let addr = addr.to_string();
    let command = config.bind_flags(clap::Command::new("check"));
    let matches = command
        .try_get_matches_from([
            "check",
            "-s",
            addr.as_str(),
            "-f",
            file.path().to_str().unwrap(),
            "-o",
            "capture",
            "--timeout",
            "10s",
        ])
        .unwrap();
    config.apply_flags(&matches).unwrap();

    check(&config).await.unwrap();

    assert_eq!(captured.contents(), "{\"status\":\"NOT_SERVING\"}\n");
}
