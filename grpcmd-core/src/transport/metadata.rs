//! Request metadata (headers) attached to every call made over a [`Connection`](super::Connection).
use std::str::FromStr;
use tonic::{
    Request, Status,
    metadata::{
        Ascii, MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    service::Interceptor,
};

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

/// Appends a fixed set of validated headers to each outgoing request.
#[derive(Debug, Clone, Default)]
pub struct MetadataInjector {
    headers: Vec<(MetadataKey<Ascii>, MetadataValue<Ascii>)>,
}

impl MetadataInjector {
    /// Validates `headers`; the first invalid key or value fails the whole set.
    pub fn new(headers: &[(String, String)]) -> Result<Self, MetadataError> {
        let headers = headers
            .iter()
            .map(|(k, v)| {
                let key = MetadataKey::from_str(k).map_err(|source| MetadataError::InvalidKey {
                    key: k.clone(),
                    source,
                })?;
                let value =
                    MetadataValue::from_str(v).map_err(|source| MetadataError::InvalidValue {
                        key: k.clone(),
                        source,
                    })?;
                Ok((key, value))
            })
            .collect::<Result<_, MetadataError>>()?;

        Ok(Self { headers })
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl Interceptor for MetadataInjector {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        for (key, value) in &self.headers {
            request.metadata_mut().append(key.clone(), value.clone());
        }
        Ok(request)
    }
}
