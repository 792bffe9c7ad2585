//! Collaborators and bookkeeping shared by every strategy.

use std::{fmt, sync::Arc};

use rust_decimal::Decimal;
use zap_common::{
    errors::{InputError, ZapError},
    models::{
        quote::{ZapOption, ZapQuote, ZapQuoteStep},
        token::{InputTokenAmount, Token, TokenAllowance, TokenAmount},
        vault::Vault,
        zap::{ZapAction, ZapOrder, ZapStep},
        Address, Chain, ChainConfig,
    },
    traits::{
        BridgeProvider, PoolStateReader, StateSnapshot, SwapAggregator, VaultAdapter,
        VaultZapRequest,
    },
    zap::{
        math::{highest_fee, quote_price_impact, slip_by},
        order::{assemble_order, OrderParams},
        Balances,
    },
};

use super::{ComposableStrategy, StepContext, UserlessZapBreakdown};
use crate::{config::ZapSettings, vault::adapter_for};

/// External collaborators handed to every strategy.
pub struct ZapHelpers {
    pub state: Arc<dyn StateSnapshot>,
    pub aggregator: Arc<dyn SwapAggregator>,
    pub pools: Arc<dyn PoolStateReader>,
    pub bridge: Option<Arc<dyn BridgeProvider>>,
    pub settings: ZapSettings,
}

impl fmt::Debug for ZapHelpers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZapHelpers")
            .field("bridge", &self.bridge.as_ref().map(|b| b.id().to_string()))
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ZapHelpers {
    pub fn chain_config(&self, chain: Chain) -> Result<ChainConfig, ZapError> {
        self.state
            .chain_config(chain)
            .ok_or_else(|| ZapError::Config(format!("no zap contracts on {chain}")))
    }

    /// The zap router of `chain`; every step is called from it.
    pub fn router(&self, chain: Chain) -> Result<Address, ZapError> {
        Ok(self.chain_config(chain)?.zap_router)
    }

    pub fn vault(&self, id: &str) -> Result<Vault, ZapError> {
        self.state
            .vault(id)
            .ok_or_else(|| ZapError::Config(format!("unknown vault {id}")))
    }

    pub fn vault_adapter(&self, vault: &Vault) -> Result<Arc<dyn VaultAdapter>, ZapError> {
        adapter_for(vault)
    }

    pub fn bridge(&self) -> Result<Arc<dyn BridgeProvider>, ZapError> {
        self.bridge
            .clone()
            .ok_or_else(|| ZapError::Config("no bridge configured".to_string()))
    }
}

/// Checks inputs against the tokens an option expects. Runs before any external call.
pub fn validate_inputs(inputs: &[InputTokenAmount], expected: &[Token]) -> Result<(), ZapError> {
    if inputs.len() != expected.len() {
        return Err(InputError::WrongInputCount { expected: expected.len(), actual: inputs.len() }.into());
    }
    for input in inputs {
        if input.amount <= Decimal::ZERO {
            return Err(InputError::ZeroAmount { token: input.token.to_string() }.into());
        }
    }
    // Each expected token is matched by exactly one input.
    let mut matched = vec![false; expected.len()];
    for (input, token) in inputs.iter().zip(expected) {
        let slot = expected
            .iter()
            .enumerate()
            .position(|(idx, candidate)| !matched[idx] && *candidate == input.token);
        match slot {
            Some(idx) => matched[idx] = true,
            None => {
                return Err(InputError::TokenMismatch {
                    expected: token.to_string(),
                    actual: input.token.to_string(),
                }
                .into())
            }
        }
    }
    Ok(())
}

/// Slippage must lie in `[0, 1)`.
pub fn validate_slippage(slippage: Decimal) -> Result<(), ZapError> {
    if slippage < Decimal::ZERO || slippage >= Decimal::ONE {
        return Err(InputError::InvalidSlippage { slippage }.into());
    }
    Ok(())
}

pub fn unsupported_route(option: &ZapOption) -> ZapError {
    ZapError::route_not_found(format!("{} cannot serve option {}", option.strategy_id, option.id))
}

/// Fills in the derived parts of a quote: fee, price impact, allowances and the trailing
/// `Unused` step for returned dust.
pub fn finalize_quote(mut quote: ZapQuote, helpers: &ZapHelpers) -> Result<ZapQuote, ZapError> {
    quote
        .steps
        .retain(|step| !matches!(step, ZapQuoteStep::Unused { .. }));
    quote
        .returned
        .retain(|amount| amount.is_positive());
    if !quote.returned.is_empty() {
        quote
            .steps
            .push(ZapQuoteStep::Unused { outputs: quote.returned.clone() });
    }
    quote.fee = highest_fee(&quote.steps);

    let inputs: Vec<TokenAmount> = quote
        .inputs
        .iter()
        .map(InputTokenAmount::as_token_amount)
        .collect();
    quote.price_impact =
        quote_price_impact(&inputs, &quote.outputs, &quote.returned, helpers.state.as_ref());

    let spender = helpers
        .chain_config(quote.option.chain)?
        .token_manager;
    quote.allowances = quote
        .inputs
        .iter()
        .filter(|input| !input.token.is_native())
        .map(|input| TokenAllowance {
            token: input.token.clone(),
            amount: input.amount,
            spender: spender.clone(),
        })
        .collect();
    Ok(quote)
}

/// Smallest ratio of what the ledger holds to what was quoted, over `quoted`.
pub fn input_ratio(quoted: &[TokenAmount], balances: &Balances) -> Decimal {
    quoted
        .iter()
        .filter(|q| q.is_positive())
        .map(|q| balances.get(&q.token) / q.amount)
        .min()
        .unwrap_or(Decimal::ONE)
}

/// Fails with `QuoteChanged` when `actual` is below the quoted output scaled by `ratio` and
/// reduced by `tolerance`.
pub fn check_min_output(
    quoted: &TokenAmount,
    ratio: Decimal,
    actual: &TokenAmount,
    tolerance: Decimal,
) -> Result<(), ZapError> {
    let expected = slip_by(quoted.amount * ratio.min(Decimal::ONE), tolerance, quoted.token.decimals);
    if actual.amount < expected {
        return Err(ZapError::QuoteChanged {
            token: quoted.token.to_string(),
            expected,
            actual: actual.amount,
        });
    }
    Ok(())
}

/// The ledger's amount of `token` as an input that consumes the live balance.
pub fn ledger_input(balances: &Balances, token: &Token) -> InputTokenAmount {
    InputTokenAmount::new(token.clone(), balances.get(token), true)
}

/// The first step of the given kind in a quote.
pub fn find_step<T>(quote: &ZapQuote, f: impl Fn(&ZapQuoteStep) -> Option<T>) -> Option<T> {
    quote.steps.iter().find_map(f)
}

/// Builds a complete order from a composable strategy's breakdown, seeding a fresh ledger
/// with the quote inputs.
pub async fn build_order(
    strategy: &dyn ComposableStrategy,
    action: ZapAction,
    quote: &ZapQuote,
    ctx: &StepContext,
) -> Result<ZapOrder, ZapError> {
    ctx.validate()?;
    let balances = seed_balances(&quote.inputs)?;
    let breakdown = match action {
        ZapAction::Deposit => {
            strategy
                .fetch_deposit_userless_breakdown(quote, ctx.slippage, balances)
                .await?
        }
        ZapAction::Withdraw => {
            strategy
                .fetch_withdraw_userless_breakdown(quote, ctx.slippage, balances)
                .await?
        }
    };
    close_order(quote, &quote.outputs, ctx, breakdown)
}

/// A ledger holding exactly the given inputs.
pub fn seed_balances(inputs: &[InputTokenAmount]) -> Result<Balances, ZapError> {
    let seed: Vec<TokenAmount> = inputs
        .iter()
        .map(InputTokenAmount::as_token_amount)
        .collect();
    Ok(Balances::from_amounts(&seed)?)
}

/// Turns a breakdown into an order paying out `wanted`, sweeping every other token the quote
/// or the breakdown touched back to the recipient.
pub fn close_order(
    quote: &ZapQuote,
    wanted: &[TokenAmount],
    ctx: &StepContext,
    breakdown: UserlessZapBreakdown,
) -> Result<ZapOrder, ZapError> {
    let chain = quote.option.chain;
    let dust: Vec<Token> = quote
        .all_tokens()
        .into_iter()
        .chain(breakdown.expected_tokens)
        .chain(
            breakdown
                .balances
                .amounts()
                .into_iter()
                .map(|a| a.token),
        )
        .filter(|token| token.chain == chain)
        .collect();
    assemble_order(
        &OrderParams { user: &ctx.user, recipient: &ctx.recipient, slippage: ctx.slippage },
        &breakdown.inputs,
        wanted,
        dust.iter(),
        breakdown.steps,
    )
}

/// Deposits the ledger's whole balance of the vault's deposit token.
pub async fn vault_deposit_leg(
    adapter: &dyn VaultAdapter,
    balances: &mut Balances,
    router: &Address,
    slippage: Decimal,
) -> Result<ZapStep, ZapError> {
    let input = ledger_input(balances, adapter.deposit_token());
    let request = VaultZapRequest { inputs: vec![input.clone()], from: router.clone(), slippage };
    let zap = adapter.fetch_zap_deposit(&request).await?;
    balances.subtract(&input.as_token_amount())?;
    balances.add_many(&zap.min_outputs)?;
    Ok(zap.zap)
}

/// Withdraws the ledger's whole balance of the vault's share token.
pub async fn vault_withdraw_leg(
    adapter: &dyn VaultAdapter,
    balances: &mut Balances,
    router: &Address,
    slippage: Decimal,
) -> Result<ZapStep, ZapError> {
    let input = ledger_input(balances, adapter.share_token());
    let request = VaultZapRequest { inputs: vec![input.clone()], from: router.clone(), slippage };
    let zap = adapter.fetch_zap_withdraw(&request).await?;
    balances.subtract(&input.as_token_amount())?;
    balances.add_many(&zap.min_outputs)?;
    Ok(zap.zap)
}

/// Quote side of a vault deposit: the shares minted for `assets`.
pub fn vault_deposit_quote(
    adapter: &dyn VaultAdapter,
    assets: &TokenAmount,
) -> Result<(ZapQuoteStep, TokenAmount), ZapError> {
    let shares = adapter.convert_to_shares(assets)?;
    let step = ZapQuoteStep::Deposit { inputs: vec![assets.clone()], output: shares.clone() };
    Ok((step, shares))
}

/// Quote side of a vault withdrawal: the assets redeemed for `shares`.
pub fn vault_withdraw_quote(
    adapter: &dyn VaultAdapter,
    shares: &TokenAmount,
) -> Result<(ZapQuoteStep, TokenAmount), ZapError> {
    let assets = adapter.convert_to_assets(shares)?;
    let step = ZapQuoteStep::Withdraw { input: shares.clone(), outputs: vec![assets.clone()] };
    Ok((step, assets))
}

/// Copies a wrapped strategy's quote into a wrapping quote, without its `Unused` step.
pub fn inner_steps(quote: &ZapQuote) -> impl Iterator<Item = ZapQuoteStep> + '_ {
    quote
        .steps
        .iter()
        .filter(|step| !matches!(step, ZapQuoteStep::Unused { .. }))
        .cloned()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;
    use rust_decimal_macros::dec;
    use zap_common::{models::Chain, Bytes};

    use super::*;

    fn token(last: &str) -> Token {
        Token::new(&Bytes::from_str(&format!("0x{:0>40}", last)).unwrap(), last, 18, Chain::Base)
    }

    #[rstest]
    #[case::zero(vec![InputTokenAmount::new(token("a0"), dec!(0), false)], "Input amount")]
    #[case::negative(vec![InputTokenAmount::new(token("a0"), dec!(-1), false)], "Input amount")]
    #[case::count(vec![], "Expected 1")]
    #[case::mismatch(vec![InputTokenAmount::new(token("b0"), dec!(1), false)], "Token mismatch")]
    fn test_validate_inputs(#[case] inputs: Vec<InputTokenAmount>, #[case] message: &str) {
        let err = validate_inputs(&inputs, &[token("a0")]).unwrap_err();

        assert!(err.to_string().contains(message), "{err}");
    }

    #[test]
    fn test_duplicate_inputs_fail_validation() {
        let inputs = [
            InputTokenAmount::new(token("a0"), dec!(2000), false),
            InputTokenAmount::new(token("a0"), dec!(2000), false),
        ];

        let err = validate_inputs(&inputs, &[token("a0"), token("b0")]).unwrap_err();

        assert!(
            matches!(err, ZapError::InvalidInput(InputError::TokenMismatch { .. })),
            "{err}"
        );
    }

    #[test]
    fn test_inputs_in_any_order_pass_validation() {
        let inputs = [
            InputTokenAmount::new(token("b0"), dec!(1), false),
            InputTokenAmount::new(token("a0"), dec!(1), false),
        ];

        assert!(validate_inputs(&inputs, &[token("a0"), token("b0")]).is_ok());
    }

    #[rstest]
    #[case::zero(dec!(0), true)]
    #[case::typical(dec!(0.005), true)]
    #[case::negative(dec!(-0.05), false)]
    #[case::whole(dec!(1), false)]
    #[case::above_one(dec!(1.5), false)]
    fn test_validate_slippage(#[case] slippage: Decimal, #[case] valid: bool) {
        let result = validate_slippage(slippage);

        match result {
            Ok(()) => assert!(valid),
            Err(err) => {
                assert!(!valid, "{err}");
                assert!(matches!(err, ZapError::InvalidInput(InputError::InvalidSlippage { .. })));
            }
        }
    }

    #[test]
    fn test_check_min_output() {
        let quoted = TokenAmount::new(token("a0"), dec!(100));

        // ledger holds 95% of the quoted input, so 95 minus 1% is expected
        let ok = check_min_output(&quoted, dec!(0.95), &TokenAmount::new(token("a0"), dec!(94.05)), dec!(0.01));
        let stale = check_min_output(&quoted, dec!(0.95), &TokenAmount::new(token("a0"), dec!(94)), dec!(0.01));

        assert!(ok.is_ok());
        assert!(stale.unwrap_err().is_stale_quote());
    }

    #[test]
    fn test_input_ratio() {
        let balances = Balances::from_amounts(&[
            TokenAmount::new(token("a0"), dec!(9)),
            TokenAmount::new(token("b0"), dec!(4)),
        ])
        .unwrap();

        let ratio = input_ratio(
            &[TokenAmount::new(token("a0"), dec!(10)), TokenAmount::new(token("b0"), dec!(5))],
            &balances,
        );

        assert_eq!(ratio, dec!(0.8));
        assert_eq!(input_ratio(&[], &balances), Decimal::ONE);
    }
}
