//! Cross-crate integration flows.

mod engine_flows;
mod ledger_invariants;
mod pos_stream;
