//! Core of the lnstream wallet: a supervisor for the local payment node, a client for the
//! invoice relay, and the engine that drives stream payments on top of both.

pub mod config;

pub mod gateway;

pub mod notify;

pub mod persist;

pub mod prettify;

pub mod relay;

pub mod rpc_server;

pub mod stream;

pub mod util;

pub use lnstream_util::GIT_DESC;
