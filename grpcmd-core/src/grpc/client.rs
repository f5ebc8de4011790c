//! # Dynamic gRPC Client
//!
//! Wraps `tonic::client::Grpc` so a unary method can be called with nothing more than its
//! descriptor. The HTTP/2 path (`/package.Service/Method`) is built at runtime and the
//! payloads travel through [`DynamicCodec`].
//!
//! Metadata is not handled here: headers belong to the [`Connection`], which attaches
//! them to every call.
use super::codec::DynamicCodec;
use crate::{BoxError, transport::Connection};
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::str::FromStr;
use tonic::client::GrpcService;

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid gRPC path '{path}': '{source}'")]
    InvalidPath {
        path: String,
        #[source]
        source: http::uri::InvalidUri,
    },
}

pub struct DynamicClient<S = Connection> {
    client: tonic::client::Grpc<S>,
}

impl<S> DynamicClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }

    /// Performs a unary call of `method` with `request`.
    ///
    /// # Returns
    /// * `Ok(Ok(DynamicMessage))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to send the request.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        request: DynamicMessage,
    ) -> Result<Result<DynamicMessage, tonic::Status>, GrpcRequestError> {
        self.client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method)?;

        match self
            .client
            .unary(tonic::Request::new(request), path, codec)
            .await
        {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }
}

fn http_path(method: &MethodDescriptor) -> Result<http::uri::PathAndQuery, GrpcRequestError> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path)
        .map_err(|source| GrpcRequestError::InvalidPath { path, source })
}
