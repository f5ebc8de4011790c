//! # Dynamic Unary Calls
//!
//! Building blocks for invoking a method known only through its
//! `prost_reflect::MethodDescriptor`, exchanging `DynamicMessage` values instead of
//! generated request and response types. Pairs naturally with the [`Decoder`](crate::codec::Decoder)
//! and [`Encoder`](crate::codec::Encoder) handed to a round-trip callback, which speak the
//! same message type.
pub mod client;
pub mod codec;
