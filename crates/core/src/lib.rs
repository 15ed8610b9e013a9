pub mod account;
pub mod clock;
pub mod config;
pub mod error;
pub mod hash;
pub mod key;
pub mod ledger;
pub mod signer;
pub mod store;
pub mod subscription;
pub mod token;
pub mod topic;
pub mod transaction;
pub mod types;

pub use account::{Account, AccountBalance, SupplyType, Token, TokenInfo, Topic, TopicInfo, TopicMessage};
pub use clock::{Clock, LogicalClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use key::{Key, SignerSet};
pub use ledger::Ledger;
pub use signer::{Credential, KeyProvisioner, PoseidonOracle, Signature, SigningOracle};
pub use subscription::TopicSubscription;
pub use token::{TokenCreate, TokenUpdate, TransferLine};
pub use transaction::{Transaction, TransactionBody, TransactionId, TransactionReceipt, TransactionState};
pub use types::{AccountId, Amount, Asset, Delta, EntityId, EntityRef, PublicKey, Timestamp, TokenId, TopicId};
