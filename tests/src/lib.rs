//! # Endpoints Proxy Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # End-to-end flows through the HTTP router
//! └── benches/           # Routing and transformation benchmarks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p endpoints-tests
//!
//! # Benchmarks
//! cargo bench -p endpoints-tests
//! ```

pub mod integration;
