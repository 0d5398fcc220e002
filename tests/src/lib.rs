//! # NHB Core Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── integration/      # Cross-crate block-processing flows
//! │   ├── engine_flows.rs
//! │   ├── ledger_invariants.rs
//! │   └── pos_stream.rs
//! └── support.rs        # Shared fixtures
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p nhb-tests
//!
//! # By category
//! cargo test -p nhb-tests integration::
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
pub mod support;
