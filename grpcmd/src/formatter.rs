use colored::*;
use grpcmd_core::{CallError, RoundTripError, round_trip::ResolveError, tonic::Status};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<&Status> for FormattedString {
    fn from(status: &Status) -> Self {
        FormattedString(format!(
            "{} code={:?} message={:?}",
            "gRPC Failed:".red().bold(),
            status.code(),
            status.message()
        ))
    }
}

impl From<&RoundTripError> for FormattedString {
    fn from(err: &RoundTripError) -> Self {
        let title = match err {
            RoundTripError::Call(CallError::Status(status)) => return FormattedString::from(status),
            RoundTripError::Resolve(ResolveError::OpenRequestFile { .. }) => "Request Error:",
            RoundTripError::Resolve(_) => "Format Error:",
            RoundTripError::Dial(_) => "Connection Error:",
            RoundTripError::Call(_) => "Call Failed:",
            RoundTripError::DeadlineExceeded => "Timeout:",
        };
        FormattedString(format!("{}\n\n'{}'", title.red().bold(), err))
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<RoundTripError>() {
            return FormattedString::from(err);
        }
        FormattedString(format!("{}\n\n'{:#}'", "Error:".red().bold(), err))
    }
}
