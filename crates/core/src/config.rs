use serde::{Deserialize, Serialize};

use crate::types::{MAX_MEMO_LEN, MAX_MESSAGE_SIZE, MAX_TRANSFER_LINES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub shard: u64,
    pub realm: u64,
    /// First number handed out for every entity kind.
    pub first_entity_num: u64,
    pub max_transfer_lines: usize,
    pub max_message_size: usize,
    pub max_memo_len: usize,
    /// Capacity of the topic notification channel. Lagging subscribers
    /// recover from the store, so this only bounds wake-ups.
    pub notification_buffer: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            shard: 0,
            realm: 0,
            first_entity_num: 1001,
            max_transfer_lines: MAX_TRANSFER_LINES,
            max_message_size: MAX_MESSAGE_SIZE,
            max_memo_len: MAX_MEMO_LEN,
            notification_buffer: 1024,
        }
    }
}
