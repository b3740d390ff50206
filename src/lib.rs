//! Invite Tracker - attributes community joins to the invitations that
//! produced them.
//!
//! The engine watches invitation use counts, records who invited whom in a
//! durable ledger, flags members who leave suspiciously soon after joining,
//! and posts join/leave notifications to a configured channel.

pub mod config;
pub mod dedupe;
pub mod engine;
pub mod events;
pub mod invites;
pub mod lifecycle;
pub mod notify;
pub mod persistence;
pub mod platform;
pub mod server;
pub mod settings;
pub mod types;

#[cfg(test)]
mod test_utils;
