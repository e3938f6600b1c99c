//! Observability setup for Switchboard: structured logging via
//! `tracing-subscriber` and optional OpenTelemetry span export.

pub mod tracing_setup;
