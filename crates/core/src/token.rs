//! Token creation, minting, association and multi-asset transfers.
//!
//! Every function here validates against the store first and mutates only
//! once all checks passed, so a returned error means the store is untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::account::{SupplyType, Token};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::key::{authorize, authorize_required, validate_optional, Key, SignerSet};
use crate::store::LedgerStore;
use crate::types::{AccountId, Amount, Asset, Delta, EntityKind, EntityRef, TokenId};

/// Parameters of a new token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenCreate {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: Amount,
    pub supply_type: SupplyType,
    pub max_supply: Option<Amount>,
    pub treasury: AccountId,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
}

impl TokenCreate {
    /// Infinite supply, zero decimals, nothing minted, no keys.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, treasury: AccountId) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: 0,
            initial_supply: 0,
            supply_type: SupplyType::Infinite,
            max_supply: None,
            treasury,
            admin_key: None,
            supply_key: None,
        }
    }

    pub fn decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn initial_supply(mut self, amount: Amount) -> Self {
        self.initial_supply = amount;
        self
    }

    pub fn finite(mut self, max_supply: Amount) -> Self {
        self.supply_type = SupplyType::Finite;
        self.max_supply = Some(max_supply);
        self
    }

    pub fn admin_key(mut self, key: Key) -> Self {
        self.admin_key = Some(key);
        self
    }

    pub fn supply_key(mut self, key: Key) -> Self {
        self.supply_key = Some(key);
        self
    }
}

/// Admin-gated edits; `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUpdate {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// One signed movement of an asset on one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub account: AccountId,
    pub asset: Asset,
    pub delta: Delta,
}

impl TransferLine {
    pub fn hbar(account: AccountId, delta: Delta) -> Self {
        Self {
            account,
            asset: Asset::Hbar,
            delta,
        }
    }

    pub fn token(token: TokenId, account: AccountId, delta: Delta) -> Self {
        Self {
            account,
            asset: Asset::Token(token),
            delta,
        }
    }
}

pub(crate) fn check_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidTransaction(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(LedgerError::InvalidTransaction(format!(
            "{field} is {} bytes, limit is {max_len}",
            value.len()
        )));
    }
    Ok(())
}

fn check_supply(params: &TokenCreate) -> Result<()> {
    match (params.supply_type, params.max_supply) {
        (SupplyType::Infinite, Some(max)) => Err(LedgerError::InvalidSupplyConfiguration(format!(
            "infinite supply token cannot declare max supply {max}"
        ))),
        (SupplyType::Infinite, None) => Ok(()),
        (SupplyType::Finite, None) => Err(LedgerError::InvalidSupplyConfiguration(
            "finite supply token requires a max supply".into(),
        )),
        (SupplyType::Finite, Some(0)) => Err(LedgerError::InvalidSupplyConfiguration(
            "max supply must be positive".into(),
        )),
        (SupplyType::Finite, Some(max)) if params.initial_supply > max => {
            Err(LedgerError::InvalidSupplyConfiguration(format!(
                "initial supply {} exceeds max supply {}",
                params.initial_supply, max
            )))
        }
        (SupplyType::Finite, Some(_)) => Ok(()),
    }
}

/// Creates the token and credits `initial_supply` to the treasury, which is
/// associated implicitly.
pub fn create(store: &mut LedgerStore, params: TokenCreate, config: &LedgerConfig) -> Result<TokenId> {
    check_text("token name", &params.name, config.max_memo_len)?;
    check_text("token symbol", &params.symbol, config.max_memo_len)?;
    check_supply(&params)?;
    validate_optional(params.admin_key.as_ref())?;
    validate_optional(params.supply_key.as_ref())?;
    let mut treasury = store.get_account(&params.treasury)?.clone();

    let id = TokenId::from(store.next_id(EntityKind::Token));
    treasury.token_balances.insert(id, params.initial_supply);
    store.put_account(treasury);
    store.put_token(Token {
        id,
        name: params.name,
        symbol: params.symbol,
        decimals: params.decimals,
        supply_type: params.supply_type,
        total_supply: params.initial_supply,
        max_supply: params.max_supply,
        treasury: params.treasury,
        admin_key: params.admin_key,
        supply_key: params.supply_key,
    });
    Ok(id)
}

/// Mints into the treasury and returns the new total supply. A token
/// without supply key can never mint.
pub fn mint(store: &mut LedgerStore, token_id: &TokenId, amount: Amount, signers: &SignerSet) -> Result<Amount> {
    let token = store.get_token(token_id)?;
    if amount == 0 {
        return Err(LedgerError::InvalidAmount {
            token: *token_id,
            amount,
        });
    }
    authorize_required(token.supply_key.as_ref(), signers, EntityRef::Token(*token_id))?;

    let exceeded = || LedgerError::SupplyLimitExceeded {
        token: *token_id,
        current: token.total_supply,
        requested: amount,
        max_supply: token.max_supply.unwrap_or(Amount::MAX),
    };
    if token.headroom().is_some_and(|room| amount > room) {
        return Err(exceeded());
    }
    let new_supply = token.total_supply.checked_add(amount).ok_or_else(exceeded)?;

    let treasury_id = token.treasury;
    let mut token = token.clone();
    let mut treasury = store.get_account(&treasury_id)?.clone();
    let held = treasury.token_balance(token_id).unwrap_or(0);
    // held <= total_supply, so this cannot overflow once new_supply fits
    treasury.token_balances.insert(*token_id, held + amount);
    token.total_supply = new_supply;

    store.put_account(treasury);
    store.put_token(token);
    Ok(new_supply)
}

/// Returns `true` when a new zero balance was created.
pub fn associate(store: &mut LedgerStore, account_id: &AccountId, token_id: &TokenId) -> Result<bool> {
    store.get_token(token_id)?;
    let account = store.account_mut(account_id)?;
    if account.is_associated(token_id) {
        return Ok(false);
    }
    account.token_balances.insert(*token_id, 0);
    Ok(true)
}

pub fn update(
    store: &mut LedgerStore,
    token_id: &TokenId,
    update: TokenUpdate,
    signers: &SignerSet,
    config: &LedgerConfig,
) -> Result<()> {
    let token = store.get_token(token_id)?;
    authorize_required(token.admin_key.as_ref(), signers, EntityRef::Token(*token_id))?;
    if let Some(name) = &update.name {
        check_text("token name", name, config.max_memo_len)?;
    }
    if let Some(symbol) = &update.symbol {
        check_text("token symbol", symbol, config.max_memo_len)?;
    }

    let mut token = token.clone();
    if let Some(name) = update.name {
        token.name = name;
    }
    if let Some(symbol) = update.symbol {
        token.symbol = symbol;
    }
    store.put_token(token);
    Ok(())
}

/// Applies a batch of line items as one unit and returns the net movement
/// per (account, asset).
///
/// Checks run in this order: batch shape, zero sum per asset, existence and
/// association of every named account, signatures of every net-debited
/// account, resulting balances.
pub fn transfer(
    store: &mut LedgerStore,
    lines: &[TransferLine],
    signers: &SignerSet,
    config: &LedgerConfig,
) -> Result<Vec<TransferLine>> {
    if lines.is_empty() {
        return Err(LedgerError::InvalidTransaction("transfer has no line items".into()));
    }
    if lines.len() > config.max_transfer_lines {
        return Err(LedgerError::InvalidTransaction(format!(
            "transfer has {} line items, limit is {}",
            lines.len(),
            config.max_transfer_lines
        )));
    }

    let mut sums: BTreeMap<Asset, i128> = BTreeMap::new();
    for line in lines {
        *sums.entry(line.asset).or_default() += i128::from(line.delta);
    }
    if let Some((asset, imbalance)) = sums.into_iter().find(|(_, sum)| *sum != 0) {
        return Err(LedgerError::Unbalanced { asset, imbalance });
    }

    // every named account counts here, even one whose lines cancel out
    let involved: BTreeSet<(AccountId, Asset)> = lines.iter().map(|line| (line.account, line.asset)).collect();
    for (account, asset) in &involved {
        store.get_account(account)?;
        if let Asset::Token(token) = asset {
            store.get_token(token)?;
        }
    }
    for (account, asset) in &involved {
        if let Asset::Token(token) = asset {
            if !store.get_account(account)?.is_associated(token) {
                return Err(LedgerError::NotAssociated {
                    account: *account,
                    token: *token,
                });
            }
        }
    }

    let mut net: BTreeMap<(AccountId, Asset), i128> = BTreeMap::new();
    for line in lines {
        *net.entry((line.account, line.asset)).or_default() += i128::from(line.delta);
    }
    net.retain(|_, delta| *delta != 0);

    let debited: BTreeSet<AccountId> = net
        .iter()
        .filter(|(_, delta)| **delta < 0)
        .map(|((account, _), _)| *account)
        .collect();
    for account_id in &debited {
        let account = store.get_account(account_id)?;
        authorize(Some(&account.key), signers, EntityRef::Account(*account_id))?;
    }

    let mut updates = Vec::with_capacity(net.len());
    let mut applied = Vec::with_capacity(net.len());
    for (&(account_id, asset), &delta) in &net {
        let account = store.get_account(&account_id)?;
        let balance = match asset {
            Asset::Hbar => account.hbar_balance,
            Asset::Token(token) => account.token_balance(&token).unwrap_or(0),
        };
        let insufficient = || LedgerError::InsufficientBalance {
            account: account_id,
            asset,
            balance,
            delta,
        };
        let next = Amount::try_from(i128::from(balance) + delta).map_err(|_| insufficient())?;
        let delta = Delta::try_from(delta).map_err(|_| insufficient())?;
        updates.push((account_id, asset, next));
        applied.push(TransferLine {
            account: account_id,
            asset,
            delta,
        });
    }

    for (account_id, asset, value) in updates {
        let account = store.account_mut(&account_id)?;
        match asset {
            Asset::Hbar => account.hbar_balance = value,
            Asset::Token(token) => {
                account.token_balances.insert(token, value);
            }
        }
    }
    Ok(applied)
}
