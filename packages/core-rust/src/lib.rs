//! request-builder core: definition vocabulary, URL and payload templating,
//! mock-override lookup and SQL text helpers.
//!
//! Everything here is synchronous and transport-agnostic; the `request-builder`
//! crate layers the compiler, module registry and transports on top.

pub mod definition;
pub mod mock;
pub mod payload;
pub mod request;
pub mod sql;
pub mod template;
pub mod types;

pub use definition::{NodeKind, NodeView};
pub use mock::MockOverrides;
pub use payload::Body;
pub use request::{FinalRequest, RequestTemplate};
pub use sql::BoundQuery;
pub use types::{GlobalSettings, Method, RequestObject};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
