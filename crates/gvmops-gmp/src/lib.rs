//! **gvmops-gmp** — minimal client for the Greenbone Management Protocol.
//!
//! GMP is the XML command/response protocol spoken by the vulnerability
//! management console, usually over TLS on port 9390. This crate covers
//! exactly the surface the gvmops tools need: authentication, asset
//! queries and host creation, task/report listing, delta report retrieval
//! and report tagging.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Configuration and the handle types parsed out of responses |
//! | [`error`] | Error type and result alias |
//! | [`xml`] | Generic XML element tree with slash-path queries |
//! | [`protocol`] | GMP command serialisation and the status envelope |
//! | [`transport`] | TCP/TLS transport and the exchange trait |
//! | [`client`] | Typed operations over a transport |

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod xml;

pub use client::GmpClient;
pub use error::{GmpError, GmpResult};
pub use transport::{GmpTransport, TlsTransport};
pub use types::GmpConfig;
