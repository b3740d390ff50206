//! Pushed platform events: signature checks, parsing and the typed model.

#[allow(clippy::module_inception)]
mod events;
mod parser;
mod signature;

pub use events::{InviteEvent, MemberEvent, PlatformEvent};
pub use parser::{ParseError, parse_event};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_signature,
};
