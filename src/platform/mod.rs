//! Platform collaborators: API traits, errors and the REST client.
//!
//! - [`api`]: the traits the engine is constructed with
//! - [`error`]: transient / not-found / permanent classification
//! - [`client`]: `reqwest`-based implementation of all three traits

mod api;
mod client;
mod error;

pub use api::{Channel, ChannelResolver, Notifier, PlatformApi, Result};
pub use client::HttpPlatformClient;
pub use error::{PlatformApiError, PlatformErrorKind};
