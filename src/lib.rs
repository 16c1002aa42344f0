//! poll-echo: a single-threaded, readiness-multiplexed TCP echo service.
//!
//! The server watches a listening socket plus a bounded set of client
//! sockets through one level-triggered readiness query, accepts new
//! connections, and answers every received chunk with a fixed prefix
//! followed by the chunk. The console client multiplexes terminal input and
//! the server socket the same way.

pub mod client;
pub mod config;
pub mod runtime;
pub mod shutdown;
