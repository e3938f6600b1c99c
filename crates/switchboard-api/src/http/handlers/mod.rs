//! HTTP request handlers.

pub mod account;
pub mod message;
pub mod send;
pub mod status;
pub mod webhook;
pub mod ws;
