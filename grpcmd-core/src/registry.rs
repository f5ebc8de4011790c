//! # Process-wide Defaults
//!
//! Formats, flag binders and pre-dial hooks registered here become part of every
//! configuration built afterwards with [`Config::build`](crate::Config::build).
//!
//! Registration belongs to process initialization, before any command runs. Building a
//! configuration takes a snapshot of the defaults, so a configuration never observes a
//! registration made after it was built; configurations built concurrently only ever read.
use crate::{
    codec::{DecoderMaker, EncoderMaker},
    config::{ConfigBuilder, flags::FlagBinder},
    transport::PreDialer,
};
use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};

static DEFAULTS: Lazy<RwLock<ConfigBuilder>> = Lazy::new(|| RwLock::new(ConfigBuilder::builtin()));

fn update(f: impl FnOnce(&mut ConfigBuilder)) {
    let mut defaults = DEFAULTS.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut defaults);
}

pub(crate) fn snapshot() -> ConfigBuilder {
    DEFAULTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Makes `format` available as a request format; replaces any earlier registration.
pub fn register_input_decoder(format: impl Into<String>, maker: impl DecoderMaker + 'static) {
    let format = format.into();
    tracing::debug!(format = %format, "registering input decoder");
    update(|defaults| {
        defaults
            .settings_mut()
            .decoders
            .insert(format, Arc::new(maker));
    });
}

/// Makes `format` available as a response format; replaces any earlier registration.
pub fn register_output_encoder(format: impl Into<String>, maker: impl EncoderMaker + 'static) {
    let format = format.into();
    tracing::debug!(format = %format, "registering output encoder");
    update(|defaults| {
        defaults
            .settings_mut()
            .encoders
            .insert(format, Arc::new(maker));
    });
}

pub fn register_flag_binder(binder: impl FlagBinder + 'static) {
    update(|defaults| defaults.settings_mut().flag_binders.push(Arc::new(binder)));
}

pub fn register_pre_dialer(dialer: impl PreDialer + 'static) {
    update(|defaults| defaults.settings_mut().pre_dialers.push(Arc::new(dialer)));
}
