//! # Contract Definitions
//!
//! The game token is an ERC-20 with a holder-initiated `burn`. Only the calls
//! the draw engine needs are declared.

// sol! output carries no docs.
#![allow(missing_docs)]

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};

use crate::error::{ChainError, ChainResult};

sol! {
    /// Burnable game token.
    #[derive(Debug)]
    interface IGameToken {
        /// Emitted on mint, transfer and burn.
        event Transfer(address indexed from, address indexed to, uint256 value);

        /// Balance of `account`.
        function balanceOf(address account) external view returns (uint256);

        /// Destroys `amount` of the caller's tokens.
        function burn(uint256 amount) external;

        /// Tokens in circulation.
        function totalSupply() external view returns (uint256);
    }
}

/// Calldata for `balanceOf(account)`.
#[must_use]
pub fn encode_balance_of(account: Address) -> Vec<u8> {
    IGameToken::balanceOfCall { account }.abi_encode()
}

/// Decodes the return data of `balanceOf`.
///
/// # Errors
///
/// Returns [`ChainError::Abi`] if the data is not a single `uint256`.
pub fn decode_balance(data: &[u8]) -> ChainResult<U256> {
    Ok(IGameToken::balanceOfCall::abi_decode_returns(data, true)?._0)
}

/// Calldata for `burn(amount)`.
#[must_use]
pub fn encode_burn(amount: u64) -> Vec<u8> {
    IGameToken::burnCall {
        amount: U256::from(amount),
    }
    .abi_encode()
}

/// ABI encoding of a single `uint256` return value.
#[must_use]
pub fn encode_uint_return(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}

/// Narrows a token amount to `u64`, saturating.
#[must_use]
pub fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_limbs()[0]
    }
}

/// Rejects calldata whose selector is unknown.
///
/// # Errors
///
/// Returns [`ChainError::Abi`] for short or unrecognised calldata.
pub fn selector(data: &[u8]) -> ChainResult<[u8; 4]> {
    let selector: [u8; 4] = data
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| ChainError::Abi("calldata shorter than a selector".to_string()))?;

    if [
        IGameToken::balanceOfCall::SELECTOR,
        IGameToken::burnCall::SELECTOR,
        IGameToken::totalSupplyCall::SELECTOR,
    ]
    .contains(&selector)
    {
        Ok(selector)
    } else {
        Err(ChainError::Abi(format!(
            "unknown selector 0x{}",
            alloy_primitives::hex::encode(selector)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_match_erc20() {
        assert_eq!(IGameToken::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(IGameToken::burnCall::SELECTOR, [0x42, 0x96, 0x6c, 0x68]);
    }

    #[test]
    fn test_burn_calldata() {
        let data = encode_burn(10);
        assert_eq!(data.len(), 4 + 32);
        let call = IGameToken::burnCall::abi_decode(&data, true).unwrap();
        assert_eq!(call.amount, U256::from(10));
    }

    #[test]
    fn test_balance_return() {
        let encoded = encode_uint_return(U256::from(1234));
        assert_eq!(decode_balance(&encoded).unwrap(), U256::from(1234));
        assert!(decode_balance(&encoded[..31]).is_err());
    }

    #[test]
    fn test_saturating_u64() {
        assert_eq!(saturating_u64(U256::from(7)), 7);
        assert_eq!(saturating_u64(U256::MAX), u64::MAX);
    }

    #[test]
    fn test_unknown_selector() {
        assert!(selector(&[1, 2, 3, 4]).is_err());
        assert!(selector(&[1]).is_err());
        assert_eq!(
            selector(&encode_burn(1)).unwrap(),
            IGameToken::burnCall::SELECTOR
        );
    }
}
