// The core module contains the domain logic and the ports it depends on.
// Nothing in here knows about HTTP, OAuth or the stdio protocol.

#[path = "session/mod.rs"]
pub mod session;

#[path = "tools/mod.rs"]
pub mod tools;

#[path = "workspace/mod.rs"]
pub mod workspace;

#[cfg(test)]
#[path = "testing.rs"]
pub mod testing;
