use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::trace;

use crate::{
    errors::BalanceError,
    models::token::{Token, TokenAmount},
};

/// Running per-token totals used to propagate worst case amounts through a build.
///
/// Every mutation must leave every total non-negative; a violation means a step consumed more
/// than a previous step could guarantee and is reported as an error, never clamped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balances {
    totals: BTreeMap<Token, Decimal>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_amounts<'a>(
        amounts: impl IntoIterator<Item = &'a TokenAmount>,
    ) -> Result<Self, BalanceError> {
        let mut balances = Self::new();
        balances.add_many(amounts)?;
        Ok(balances)
    }

    pub fn add(&mut self, amount: &TokenAmount) -> Result<(), BalanceError> {
        self.apply(&amount.token, amount.amount)
    }

    pub fn subtract(&mut self, amount: &TokenAmount) -> Result<(), BalanceError> {
        self.apply(&amount.token, -amount.amount)
    }

    pub fn add_many<'a>(
        &mut self,
        amounts: impl IntoIterator<Item = &'a TokenAmount>,
    ) -> Result<(), BalanceError> {
        amounts
            .into_iter()
            .try_for_each(|a| self.add(a))
    }

    pub fn subtract_many<'a>(
        &mut self,
        amounts: impl IntoIterator<Item = &'a TokenAmount>,
    ) -> Result<(), BalanceError> {
        amounts
            .into_iter()
            .try_for_each(|a| self.subtract(a))
    }

    /// Current total of `token`, zero if never seen.
    pub fn get(&self, token: &Token) -> Decimal {
        self.totals
            .get(token)
            .copied()
            .unwrap_or_default()
    }

    pub fn get_amount(&self, token: &Token) -> TokenAmount {
        TokenAmount::new(token.clone(), self.get(token))
    }

    pub fn is_non_zero(&self, token: &Token) -> bool {
        !self.get(token).is_zero()
    }

    /// Snapshot of all non-zero totals.
    pub fn amounts(&self) -> Vec<TokenAmount> {
        self.totals
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(token, amount)| TokenAmount::new(token.clone(), *amount))
            .collect()
    }

    fn apply(&mut self, token: &Token, delta: Decimal) -> Result<(), BalanceError> {
        let current = self.get(token);
        let next = current + delta;
        if next.is_sign_negative() && !next.is_zero() {
            return Err(BalanceError::Negative { token: token.to_string(), balance: next });
        }
        trace!(token = %token.symbol, %current, %next, "Balance update");
        self.totals.insert(token.clone(), next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{models::Chain, Bytes};

    fn token(address: &str, symbol: &str) -> Token {
        Token::new(&Bytes::from_str(address).unwrap(), symbol, 18, Chain::Optimism)
    }

    fn usdc() -> Token {
        token("0x0b2c639c533813f4aa9d7837caf62653d097ff85", "USDC")
    }

    fn op() -> Token {
        token("0x4200000000000000000000000000000000000042", "OP")
    }

    #[test]
    fn test_add_subtract() {
        let mut balances = Balances::from_amounts(&[TokenAmount::new(usdc(), dec!(10))]).unwrap();

        balances
            .subtract(&TokenAmount::new(usdc(), dec!(4)))
            .unwrap();
        balances
            .add(&TokenAmount::new(op(), dec!(2.5)))
            .unwrap();

        assert_eq!(balances.get(&usdc()), dec!(6));
        assert_eq!(balances.get(&op()), dec!(2.5));
        assert_eq!(balances.get(&Chain::Optimism.native_token()), Decimal::ZERO);
        assert!(balances.is_non_zero(&op()));
    }

    #[test]
    fn test_key_is_case_insensitive() {
        let mut balances = Balances::new();
        balances
            .add(&TokenAmount::new(
                token("0x0B2C639C533813F4AA9D7837CAF62653D097FF85", "USDC"),
                dec!(1),
            ))
            .unwrap();

        assert_eq!(balances.get(&usdc()), dec!(1));
    }

    #[test]
    fn test_negative_result_fails_and_keeps_state() {
        let mut balances = Balances::from_amounts(&[TokenAmount::new(usdc(), dec!(1))]).unwrap();

        let err = balances
            .subtract(&TokenAmount::new(usdc(), dec!(1.000001)))
            .unwrap_err();

        assert!(matches!(err, BalanceError::Negative { balance, .. } if balance == dec!(-0.000001)));
        assert_eq!(balances.get(&usdc()), dec!(1));
        assert!(balances
            .subtract(&TokenAmount::new(op(), dec!(0.1)))
            .is_err());
    }

    #[test]
    fn test_non_negative_over_sequences() {
        let ops = [dec!(5), dec!(-3), dec!(-2), dec!(7), dec!(-8), dec!(1)];
        let mut balances = Balances::new();
        let mut expected = Decimal::ZERO;

        for delta in ops {
            let amount = TokenAmount::new(usdc(), delta.abs());
            let result = if delta.is_sign_negative() {
                balances.subtract(&amount)
            } else {
                balances.add(&amount)
            };
            if expected + delta < Decimal::ZERO {
                assert!(result.is_err());
            } else {
                result.unwrap();
                expected += delta;
            }
            assert!(balances.get(&usdc()) >= Decimal::ZERO);
            assert_eq!(balances.get(&usdc()), expected);
        }
    }

    #[test]
    fn test_amounts_skips_zero() {
        let mut balances = Balances::from_amounts(&[
            TokenAmount::new(usdc(), dec!(3)),
            TokenAmount::new(op(), dec!(1)),
        ])
        .unwrap();
        balances
            .subtract(&TokenAmount::new(usdc(), dec!(3)))
            .unwrap();

        assert_eq!(balances.amounts(), vec![TokenAmount::new(op(), dec!(1))]);
    }
}
