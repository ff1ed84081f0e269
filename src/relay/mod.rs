// Relay Module - cross-origin media relay
//
// Handles:
// - `/api/proxy` query validation and untrusted header parsing
// - Origin fetch with browser-like default headers
// - Streaming the origin body back with permissive CORS
// - Optional target allow-listing

mod error;
mod guard;
mod handler;
mod request;

pub use error::RelayError;
pub use guard::{AllowAllTargets, DomainAllowList, TargetGuard};
pub use handler::{MediaRelay, DEFAULT_CONTENT_TYPE};
pub use request::{parse_extra_headers, RelayQuery, RelayRequest};
