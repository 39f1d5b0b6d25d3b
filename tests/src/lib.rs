//! # Connector Hub Test Suite
//!
//! Cross-crate integration and concurrency tests.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs        # Shared test sources and fixtures
//!     ├── lifecycle.rs      # State machine contract through real providers
//!     ├── subscriptions.rs  # Registry bookkeeping under contention
//!     ├── directory.rs      # Cross-provider resolution and browse
//!     └── install.rs        # Single-flight install/reload
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p connector-tests
//! cargo test -p connector-tests integration::subscriptions::
//! ```

pub mod integration;
