//! # `grpc.health.v1.Health` commands
//!
//! One subcommand per unary method. Each builds on the shared [`Config`]: the configuration
//! flags are bound onto the method command, applied once parsed, and the call runs as a
//! single round trip.
use crate::descriptor;
use anyhow::{Context as _, anyhow};
use clap::{Arg, ArgMatches, Command};
use grpcmd_core::grpc::client::DynamicClient;
use grpcmd_core::prost_reflect::{DynamicMessage, MethodDescriptor, ServiceDescriptor, Value};
use grpcmd_core::{Config, round_trip};

const SERVICE_FIELD: &str = "service";

pub struct HealthCommands {
    service: ServiceDescriptor,
}

impl HealthCommands {
    pub fn new() -> anyhow::Result<Self> {
        let service = descriptor::health_service()
            .context("Invalid embedded health schema")?
            .ok_or_else(|| anyhow!("'{}' missing from schema", descriptor::HEALTH_SERVICE))?;
        Ok(Self { service })
    }

    fn method(&self, name: &str) -> anyhow::Result<MethodDescriptor> {
        self.service
            .methods()
            .find(|m| m.name() == name)
            .ok_or_else(|| anyhow!("Method '{name}' not found in '{}'", self.service.full_name()))
    }

    pub fn command(&self, config: &Config) -> Command {
        let check = Command::new(config.command_name("Check"))
            .about("Checks whether the server, or one of its services, is serving")
            .arg(
                Arg::new(SERVICE_FIELD)
                    .long(config.flag_name("Service"))
                    .help("service to check; empty checks the server as a whole"),
            );

        Command::new(config.command_name(self.service.name()))
            .about(format!("Calls {}", self.service.full_name()))
            .subcommand_required(true)
            .subcommand(config.bind_flags(check))
    }

    pub async fn run(&self, matches: &ArgMatches, config: &mut Config) -> anyhow::Result<()> {
        match matches.subcommand() {
            Some((name, sub)) if name == config.command_name("Check") => {
                self.check(sub, config).await
            }
            Some((name, _)) => Err(anyhow!("Unknown health command '{name}'")),
            None => Err(anyhow!("Missing health command")),
        }
    }

    async fn check(&self, matches: &ArgMatches, config: &mut Config) -> anyhow::Result<()> {
        config.apply_flags(matches)?;
        let method = self.method("Check")?;
        let service = matches.get_one::<String>(SERVICE_FIELD).cloned();

        tracing::debug!(?config, "running Check");
        let ctx = config.context()?;

        round_trip(&ctx, config, |conn, decoder, mut encoder| async move {
            let mut request = DynamicMessage::new(method.input());
            decoder.decode(&mut request)?;
            if let Some(service) = service {
                request.set_field_by_name(SERVICE_FIELD, Value::String(service));
            }

            let response = DynamicClient::new(conn).unary(&method, request).await??;
            encoder.encode(&response)?;
            Ok(())
        })
        .await?;

        Ok(())
    }
}
