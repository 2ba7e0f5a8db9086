//! Reference backend for Pentagon challenge-response authentication.
//!
//! Speaks the JSON-over-WebSocket protocol defined in `pentagon_proto::wire`:
//! it enrolls identities, runs one challenge session per connection and
//! reports the verification result after the last round.

pub mod challenge;
pub mod cleanup;
pub mod config;
pub mod connection;
pub mod primes;
pub mod ratelimit;
pub mod registry;
pub mod server;
pub mod state;
