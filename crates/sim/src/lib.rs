//! scripted actors and behaviour scenarios for the tally ledger

pub mod context;
pub mod scenarios;

pub use context::{Actor, Session};

use tally_core::LedgerConfig;

pub struct SimulationPresets;

impl SimulationPresets {
    pub fn local() -> LedgerConfig {
        LedgerConfig::default()
    }

    /// Tight limits and a tiny notification buffer, so subscribers lag and
    /// have to catch up from the store.
    pub fn constrained() -> LedgerConfig {
        LedgerConfig {
            max_transfer_lines: 4,
            max_message_size: 64,
            max_memo_len: 32,
            notification_buffer: 2,
            ..LedgerConfig::default()
        }
    }
}
