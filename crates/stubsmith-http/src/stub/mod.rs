//! Stub data model: what a configured stub matches and what it answers with.

mod authorization;
mod lifecycle;
mod pattern;
mod request;
mod response;

pub use authorization::Authorization;
pub use lifecycle::{ResponseCycler, StubHttpLifecycle};
pub use pattern::Pattern;
pub use request::{BodyPattern, ExternalBody, StubRequest};
pub use response::{Callback, ResponseBody, StubResponse};
