//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! POST /register (server_name, server_url)
//!     → prefix_for_name ("/" + name)
//!     → registry.rs (upsert route, evict cached handler)
//!
//! Incoming Request (path)
//!     → registry.rs (snapshot prefixes)
//!     → matcher.rs (longest segment-aligned prefix)
//!     → router.rs (cached handler or build-once, then delegate)
//!     → NoMatch → 404
//! ```
//!
//! # Design Decisions
//! - Routes are mutable at runtime; matching runs on a point-in-time snapshot
//! - Deterministic: longest prefix wins regardless of registration order
//! - Handlers are built lazily and at most once per registration

pub mod matcher;
pub mod registry;
pub mod router;

pub use matcher::{longest_match, PathPrefixMatcher};
pub use registry::{Registration, RouteRegistry};
pub use router::Dispatcher;

/// Names that would collide with the gateway's own endpoints.
pub const RESERVED_NAMES: &[&str] = &["register", "overview"];

/// Derive the route prefix for a server name.
///
/// Surrounding slashes are trimmed. The result is rejected if it is empty,
/// reserved, or contains characters that cannot appear in a path prefix.
pub fn prefix_for_name(name: &str) -> Result<String, String> {
    let name = name.trim().trim_matches('/');
    if name.is_empty() {
        return Err("server name must not be empty".to_string());
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c == '?' || c == '#')
    {
        return Err(format!("server name '{}' contains invalid characters", name));
    }
    let first_segment = name.split('/').next().unwrap_or(name);
    if RESERVED_NAMES.contains(&first_segment) {
        return Err(format!("server name '{}' is reserved", name));
    }
    Ok(format!("/{}", name))
}
