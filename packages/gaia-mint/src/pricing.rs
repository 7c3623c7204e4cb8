//! Mint price selection.

use near_primitives::types::AccountId;
use near_token::NearToken;
use std::str::FromStr;

/// Price of one mint, as a human-readable NEAR amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintPrice(String);

impl MintPrice {
    pub fn free() -> Self {
        Self("0".into())
    }

    pub fn new(near: impl Into<String>) -> Self {
        Self(near.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_free(&self) -> bool {
        matches!(self.to_token(), Ok(t) if t.as_yoctonear() == 0)
    }

    pub fn to_token(&self) -> Result<NearToken, crate::Error> {
        NearToken::from_str(&format!("{} NEAR", self.0.trim()))
            .map_err(|e| crate::Error::Decode(format!("invalid NEAR amount {:?}: {e:?}", self.0)))
    }

    /// Amount to attach to the mint call, in yoctoNEAR.
    pub fn to_yocto(&self) -> Result<u128, crate::Error> {
        self.to_token().map(|t| t.as_yoctonear())
    }
}

impl std::fmt::Display for MintPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} NEAR", self.0)
    }
}

/// Price for the next mint.
///
/// Free while `supply <= free_limit`. Past that, `paid_price` unless the
/// account is on the discount list, which keeps it free.
pub fn mint_price(
    supply: u64,
    free_limit: u64,
    paid_price: &str,
    discount_list: &[AccountId],
    account_id: &AccountId,
) -> MintPrice {
    if supply <= free_limit || discount_list.contains(account_id) {
        MintPrice::free()
    } else {
        MintPrice::new(paid_price)
    }
}
