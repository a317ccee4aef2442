//! Programmable HTTP stub server.
//!
//! Stubs are declared in YAML, matched against inbound requests in
//! declaration order and answered with canned, redirected, recorded or
//! round-robin responses. The configuration and every file it references
//! are polled for changes and swapped in atomically.

pub mod admin;
pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod matching;
pub mod metrics;
pub mod request;
pub mod resolver;
pub mod scanner;
pub mod server;
pub mod service;
pub mod store;
pub mod stub;
pub mod transport;

pub use config::{ParsedConfig, Settings, StubParser, YamlParser};
pub use error::{ParseError, ReloadError, TransportError};
pub use matching::{MatchOutcome, MatchingEngine};
pub use request::IncomingRequest;
pub use resolver::{ResponseDescriptor, ResponseKind};
pub use service::{ReloadSource, Reloader, StubService};
pub use store::{Snapshot, StubStore};
pub use transport::{HttpTransport, OutboundRequest, ReqwestTransport, TransportResponse};
