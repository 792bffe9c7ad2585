//! Zaps that reach a vault from another chain, or leave it to another chain, over a burn and
//! mint bridge.
//!
//! The vault side of the route is served by a composable sibling strategy of the same vault.
//! Its order is encoded into the hook data of the burn and runs on the other chain once the
//! bridged funds are minted there.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use futures03::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use zap_common::{
    errors::ZapError,
    models::{
        quote::{
            BridgeQuote, OptionRoute, SelectionOrder, StrategyId, SwapVia, ZapOption, ZapQuote,
            ZapQuoteStep,
        },
        token::{InputTokenAmount, Token, TokenAmount},
        vault::Vault,
        zap::{ZapAction, ZapOrder, ZapStep},
        Chain,
    },
    traits::BridgeProvider,
    zap::{
        order::{assemble_order, OrderParams},
        Balances,
    },
    Bytes,
};
use zap_ethereum::calls::router::execute_order_data;

use super::{
    helpers::{
        check_min_output, close_order, finalize_quote, inner_steps, seed_balances,
        unsupported_route, validate_inputs, ZapHelpers,
    },
    swap::{aggregator_quote_step, fetch_best_quote, fetch_quoted_swap_leg, fetch_supported_tokens, fetch_swap_leg},
    ComposableStrategy, StepContext, Strategy, StrategyLink, StrategyResolver,
    UserlessZapBreakdown, ZapStrategy,
};

fn bridge_step(quote: &BridgeQuote) -> ZapQuoteStep {
    ZapQuoteStep::Bridge {
        from: quote.from.clone(),
        to: quote.to.clone(),
        from_chain: quote.from.token.chain,
        to_chain: quote.to.token.chain,
        fee: quote.fee.clone(),
        time_estimate: quote.time_estimate,
    }
}

fn as_input(amount: &TokenAmount) -> InputTokenAmount {
    InputTokenAmount::new(amount.token.clone(), amount.amount, false)
}

/// How much of the quoted bridge output a fresh bridge quote still delivers.
fn bridged_ratio(quoted: &TokenAmount, fresh: &TokenAmount) -> Decimal {
    if quoted.is_positive() {
        fresh.amount / quoted.amount
    } else {
        Decimal::ONE
    }
}

fn cross_chain_route(option: &ZapOption) -> Result<(Chain, Chain, &Token), ZapError> {
    match &option.route {
        OptionRoute::CrossChain { source_chain, dest_chain, bridge_token } => {
            Ok((*source_chain, *dest_chain, bridge_token))
        }
        _ => Err(unsupported_route(option)),
    }
}

pub struct CrossChainStrategy {
    vault: Vault,
    /// Chains on the far side of the bridge.
    remote_chains: Vec<Chain>,
    bridge: Arc<dyn BridgeProvider>,
    helpers: Arc<ZapHelpers>,
    siblings: StrategyLink<Vec<Arc<Strategy>>>,
}

impl fmt::Debug for CrossChainStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossChainStrategy")
            .field("vault", &self.vault.id)
            .field("remote_chains", &self.remote_chains)
            .field("bridge", &self.bridge.id())
            .field("siblings", &self.siblings)
            .finish()
    }
}

impl CrossChainStrategy {
    pub fn new(
        vault: Vault,
        source_chains: &[Chain],
        helpers: Arc<ZapHelpers>,
        resolver: Weak<dyn StrategyResolver>,
    ) -> Result<Self, ZapError> {
        let bridge = helpers.bridge()?;
        if bridge.bridge_token(vault.chain).is_none() {
            return Err(ZapError::Config(format!(
                "bridge does not reach {} of vault {}",
                vault.chain, vault.id
            )));
        }
        let candidates = if source_chains.is_empty() { &Chain::ALL[..] } else { source_chains };
        let remote_chains: Vec<Chain> = candidates
            .iter()
            .copied()
            .filter(|chain| *chain != vault.chain && bridge.bridge_token(*chain).is_some())
            .collect();
        if remote_chains.is_empty() {
            return Err(ZapError::Config(format!("no chain can bridge to vault {}", vault.id)));
        }
        Ok(Self { vault, remote_chains, bridge, helpers, siblings: StrategyLink::new(resolver) })
    }

    fn vault_bridge_token(&self) -> Result<Token, ZapError> {
        self.bridge
            .bridge_token(self.vault.chain)
            .ok_or_else(|| ZapError::route_not_found(format!("bridge left {}", self.vault.chain)))
    }

    async fn siblings(&self) -> Result<&Vec<Arc<Strategy>>, ZapError> {
        self.siblings
            .ensure_linked(|resolver| {
                let siblings: Vec<Arc<Strategy>> = resolver
                    .strategies(&self.vault.id)?
                    .into_iter()
                    .filter(|s| s.as_composable().is_some())
                    .collect();
                debug!(vault = %self.vault.id, siblings = siblings.len(), "Linked cross-chain strategy");
                Ok(siblings)
            })
            .await
    }

    /// The first sibling offering an option that starts (deposit) or ends (withdraw) with
    /// exactly `bridged`.
    async fn find_sibling(
        &self,
        action: ZapAction,
        bridged: &Token,
    ) -> Result<(&dyn ComposableStrategy, ZapOption), ZapError> {
        let siblings: Vec<&dyn ComposableStrategy> = self
            .siblings()
            .await?
            .iter()
            .filter_map(|s| s.as_composable())
            .collect();
        let options = join_all(siblings.iter().map(|s| async move {
            match action {
                ZapAction::Deposit => s.fetch_deposit_options().await,
                ZapAction::Withdraw => s.fetch_withdraw_options().await,
            }
        }))
        .await;
        siblings
            .into_iter()
            .zip(options)
            .find_map(|(strategy, options)| {
                let options = options
                    .map_err(|err| debug!(strategy = %strategy.id(), error = %err, "Sibling options failed"))
                    .ok()?;
                let option = options.into_iter().find(|o| {
                    let tokens = match action {
                        ZapAction::Deposit => &o.input_tokens,
                        ZapAction::Withdraw => &o.output_tokens,
                    };
                    tokens.as_slice() == std::slice::from_ref(bridged)
                })?;
                Some((strategy, option))
            })
            .ok_or_else(|| {
                ZapError::route_not_found(format!(
                    "no strategy of {} handles bridged {bridged}",
                    self.vault.id
                ))
            })
    }

    /// The sibling that produced `option`.
    async fn sibling_for(&self, option: &ZapOption) -> Result<&dyn ComposableStrategy, ZapError> {
        self.siblings()
            .await?
            .iter()
            .filter_map(|s| s.as_composable())
            .find(|s| s.id() == option.strategy_id)
            .ok_or_else(|| unsupported_route(option))
    }

    fn option(
        &self,
        action: ZapAction,
        remote_token: Token,
        selection_order: SelectionOrder,
        bridge_token: Token,
    ) -> ZapOption {
        let share = self.vault.share_token.clone();
        let remote = remote_token.chain;
        let (chain, inputs, outputs, route) = match action {
            ZapAction::Deposit => (
                remote,
                vec![remote_token],
                vec![share],
                OptionRoute::CrossChain { source_chain: remote, dest_chain: self.vault.chain, bridge_token },
            ),
            ZapAction::Withdraw => (
                self.vault.chain,
                vec![share],
                vec![remote_token],
                OptionRoute::CrossChain { source_chain: self.vault.chain, dest_chain: remote, bridge_token },
            ),
        };
        ZapOption::new(
            StrategyId::CrossChain,
            &self.vault.id,
            chain,
            action,
            inputs,
            outputs,
            selection_order,
            route,
        )
    }

    async fn options(&self, action: ZapAction) -> Result<Vec<ZapOption>, ZapError> {
        let local = self.vault_bridge_token()?;
        if let Err(err) = self.find_sibling(action, &local).await {
            debug!(vault = %self.vault.id, error = %err, "No cross-chain options");
            return Ok(Vec::new());
        }
        let mut options = Vec::new();
        for chain in &self.remote_chains {
            let Some(remote) = self.bridge.bridge_token(*chain) else {
                continue;
            };
            let bridge_token = match action {
                ZapAction::Deposit => remote.clone(),
                ZapAction::Withdraw => local.clone(),
            };
            options.push(self.option(action, remote.clone(), SelectionOrder::TokenOfPool, bridge_token.clone()));
            let supported = fetch_supported_tokens(
                &self.helpers,
                std::slice::from_ref(&remote),
                &self.vault.id,
                *chain,
            )
            .await;
            options.extend(
                supported
                    .into_iter()
                    .map(|(token, _)| self.option(action, token, SelectionOrder::Other, bridge_token.clone())),
            );
        }
        Ok(options)
    }

    /// Burns the ledger's bridged balance, carrying `payload` to the other chain.
    fn burn(
        &self,
        bridged: &TokenAmount,
        dest_chain: Chain,
        payload: &Bytes,
        balances: &mut Balances,
    ) -> Result<ZapStep, ZapError> {
        let hook = self
            .bridge
            .build_hook_data(dest_chain, payload)?;
        let step = self
            .bridge
            .build_burn_step(bridged, dest_chain, &hook)?;
        balances.subtract(bridged)?;
        Ok(step)
    }

    async fn destination_deposit_order(
        &self,
        quote: &ZapQuote,
        bridged: &TokenAmount,
        dest_chain: Chain,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        let quoted = quote
            .underlying
            .as_deref()
            .ok_or_else(|| unsupported_route(&quote.option))?;
        let quoted_bridge = quote
            .bridge
            .as_ref()
            .ok_or_else(|| unsupported_route(&quote.option))?;
        let bridge_quote = self
            .bridge
            .fetch_bridge_quote(bridged, dest_chain)
            .await?;
        let sibling = self
            .sibling_for(&quoted.option)
            .await?;
        let fresh = sibling
            .fetch_deposit_quote(&[as_input(&bridge_quote.to)], &quoted.option)
            .await?;
        let ratio = bridged_ratio(&quoted_bridge.to, &bridge_quote.to);
        for (quoted_output, output) in quoted.outputs.iter().zip(&fresh.outputs) {
            check_min_output(quoted_output, ratio, output, ctx.slippage)?;
        }
        let breakdown = sibling
            .fetch_deposit_userless_breakdown(&fresh, ctx.slippage, seed_balances(&fresh.inputs)?)
            .await?;
        close_order(&fresh, &fresh.outputs, ctx, breakdown)
    }

    /// The order run by the hook receiver after a withdrawal: an optional swap of the minted
    /// tokens into the wanted token.
    async fn destination_withdraw_order(
        &self,
        quote: &ZapQuote,
        bridge_quote: &BridgeQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        let minted = bridge_quote.to.clone();
        let mut balances = Balances::from_amounts(std::slice::from_ref(&minted))?;
        let swap = quote.steps.iter().find_map(|step| match step {
            ZapQuoteStep::Swap { via: SwapVia::Aggregator(swap), .. }
                if swap.from_token.chain == minted.token.chain =>
            {
                Some(swap)
            }
            _ => None,
        });
        let (steps, wanted) = match swap {
            Some(quoted) => {
                let fresh = fetch_best_quote(&self.helpers, &minted, &quoted.to_token, &self.vault.id).await?;
                check_min_output(
                    &quoted.to(),
                    minted.amount / quoted.from_amount,
                    &fresh.to(),
                    ctx.slippage,
                )?;
                let leg = fetch_swap_leg(&self.helpers, &fresh, &balances, ctx.slippage, false).await?;
                let wanted = fresh.to();
                (vec![leg.apply(&mut balances)?], wanted)
            }
            None => (Vec::new(), minted.clone()),
        };
        let dust = [minted.token.clone()];
        assemble_order(
            &OrderParams { user: &ctx.user, recipient: &ctx.recipient, slippage: ctx.slippage },
            &[as_input(&minted)],
            std::slice::from_ref(&wanted),
            dust.iter(),
            steps,
        )
    }
}

#[async_trait]
impl ZapStrategy for CrossChainStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::CrossChain
    }

    fn vault(&self) -> &Vault {
        &self.vault
    }

    async fn fetch_deposit_options(&self) -> Result<Vec<ZapOption>, ZapError> {
        self.options(ZapAction::Deposit).await
    }

    #[instrument(skip_all, fields(vault = %self.vault.id, option = %option.id))]
    async fn fetch_deposit_quote(
        &self,
        inputs: &[InputTokenAmount],
        option: &ZapOption,
    ) -> Result<ZapQuote, ZapError> {
        validate_inputs(inputs, &option.input_tokens)?;
        let (source_chain, dest_chain, bridge_token) = cross_chain_route(option)?;
        let input = inputs[0].as_token_amount();
        if input.token.chain != source_chain || dest_chain != self.vault.chain {
            return Err(unsupported_route(option));
        }
        let mut quote = ZapQuote::new(option.clone(), inputs.to_vec());
        let bridged = if &input.token == bridge_token {
            input
        } else {
            let swap = fetch_best_quote(&self.helpers, &input, bridge_token, &self.vault.id).await?;
            quote
                .steps
                .push(aggregator_quote_step(&swap));
            swap.to()
        };

        let bridge_quote = self
            .bridge
            .fetch_bridge_quote(&bridged, dest_chain)
            .await?;
        quote
            .steps
            .push(bridge_step(&bridge_quote));

        let (sibling, dest_option) = self
            .find_sibling(ZapAction::Deposit, &bridge_quote.to.token)
            .await?;
        let dest_quote = sibling
            .fetch_deposit_quote(&[as_input(&bridge_quote.to)], &dest_option)
            .await?;
        quote
            .steps
            .extend(inner_steps(&dest_quote));
        quote.outputs = dest_quote.outputs.clone();
        quote.returned = dest_quote.returned.clone();
        quote.bridge = Some(bridge_quote);
        quote.underlying = Some(Box::new(dest_quote));
        finalize_quote(quote, &self.helpers)
    }

    async fn fetch_deposit_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        ctx.validate()?;
        let (_, dest_chain, bridge_token) = cross_chain_route(&quote.option)?;
        let mut balances = seed_balances(&quote.inputs)?;
        let mut steps = Vec::new();
        for step in &quote.steps {
            match step {
                ZapQuoteStep::Bridge { .. } => break,
                ZapQuoteStep::Swap { .. } => {
                    let leg = fetch_quoted_swap_leg(&self.helpers, step, &balances, ctx.slippage).await?;
                    steps.push(leg.apply(&mut balances)?);
                }
                other => {
                    return Err(ZapError::route_not_found(format!(
                        "cross-chain source leg cannot build {other:?}"
                    )))
                }
            }
        }

        let bridged = balances.get_amount(bridge_token);
        let dest_order = self
            .destination_deposit_order(quote, &bridged, dest_chain, ctx)
            .await?;
        let payload = execute_order_data(&dest_order)?;
        steps.push(self.burn(&bridged, dest_chain, &payload, &mut balances)?);

        let breakdown = UserlessZapBreakdown {
            inputs: quote.inputs.clone(),
            steps,
            balances,
            expected_tokens: Vec::new(),
        };
        close_order(quote, &[], ctx, breakdown)
    }

    async fn fetch_withdraw_options(&self) -> Result<Vec<ZapOption>, ZapError> {
        self.options(ZapAction::Withdraw).await
    }

    #[instrument(skip_all, fields(vault = %self.vault.id, option = %option.id))]
    async fn fetch_withdraw_quote(
        &self,
        inputs: &[InputTokenAmount],
        option: &ZapOption,
    ) -> Result<ZapQuote, ZapError> {
        validate_inputs(inputs, &option.input_tokens)?;
        let (source_chain, dest_chain, bridge_token) = cross_chain_route(option)?;
        let wanted = option
            .user_token()
            .ok_or_else(|| unsupported_route(option))?;
        if source_chain != self.vault.chain || wanted.chain != dest_chain {
            return Err(unsupported_route(option));
        }
        let (sibling, source_option) = self
            .find_sibling(ZapAction::Withdraw, bridge_token)
            .await?;
        let source_quote = sibling
            .fetch_withdraw_quote(inputs, &source_option)
            .await?;
        let bridged = source_quote
            .outputs
            .iter()
            .find(|o| &o.token == bridge_token)
            .cloned()
            .ok_or_else(|| unsupported_route(option))?;

        let mut quote = ZapQuote::new(option.clone(), inputs.to_vec());
        quote
            .steps
            .extend(inner_steps(&source_quote));
        let bridge_quote = self
            .bridge
            .fetch_bridge_quote(&bridged, dest_chain)
            .await?;
        quote
            .steps
            .push(bridge_step(&bridge_quote));
        let output = if &bridge_quote.to.token == wanted {
            bridge_quote.to.clone()
        } else {
            let swap = fetch_best_quote(&self.helpers, &bridge_quote.to, wanted, &self.vault.id).await?;
            quote
                .steps
                .push(aggregator_quote_step(&swap));
            swap.to()
        };
        quote.outputs = vec![output];
        quote.returned = source_quote.returned.clone();
        quote.bridge = Some(bridge_quote);
        quote.underlying = Some(Box::new(source_quote));
        finalize_quote(quote, &self.helpers)
    }

    async fn fetch_withdraw_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        ctx.validate()?;
        let (_, dest_chain, bridge_token) = cross_chain_route(&quote.option)?;
        let source_quote = quote
            .underlying
            .as_deref()
            .ok_or_else(|| unsupported_route(&quote.option))?;
        let mut breakdown = self
            .sibling_for(&source_quote.option)
            .await?
            .fetch_withdraw_userless_breakdown(
                source_quote,
                ctx.slippage,
                seed_balances(&quote.inputs)?,
            )
            .await?;

        let bridged = breakdown.balances.get_amount(bridge_token);
        let bridge_quote = self
            .bridge
            .fetch_bridge_quote(&bridged, dest_chain)
            .await?;
        let dest_order = self
            .destination_withdraw_order(quote, &bridge_quote, ctx)
            .await?;
        let payload = execute_order_data(&dest_order)?;
        let burn = self.burn(&bridged, dest_chain, &payload, &mut breakdown.balances)?;
        breakdown.steps.push(burn);
        breakdown.inputs = quote.inputs.clone();
        breakdown.expected_tokens.clear();
        close_order(quote, &[], ctx, breakdown)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, str::FromStr};

    use num_bigint::BigUint;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use zap_common::{
        models::{
            quote::BridgeTimeEstimate,
            swap::TokenSupport,
            zap::{BalanceInsert, StepToken},
        },
        traits::{MockBridgeProvider, MockPoolStateReader, MockSwapAggregator},
    };

    use super::*;
    use crate::{
        strategy::single::SingleStrategy,
        test_fixtures::{helpers, snapshot, standard_vault, step_context, usdc, StaticResolver},
    };

    fn arb_usdc() -> Token {
        Token::new(
            &Bytes::from_str("0xaf88d065e77c8cc2239327c5edb3a432268e5831").unwrap(),
            "USDC",
            6,
            Chain::Arbitrum,
        )
    }

    fn burn_target() -> Bytes {
        Bytes::from_str("0x00000000000000000000000000000000000000b1").unwrap()
    }

    fn bridge(expected_quotes: usize) -> MockBridgeProvider {
        let mut bridge = MockBridgeProvider::new();
        bridge
            .expect_bridge_token()
            .returning(|chain| match chain {
                Chain::Base => Some(usdc()),
                Chain::Arbitrum => Some(arb_usdc()),
                _ => None,
            });
        bridge
            .expect_fetch_bridge_quote()
            .times(expected_quotes)
            .returning(|from, to_chain| {
                let to = if to_chain == Chain::Base { usdc() } else { arb_usdc() };
                Ok(BridgeQuote {
                    provider: "cctp".to_string(),
                    from: from.clone(),
                    to: TokenAmount::new(to, from.amount - dec!(0.1)),
                    fee: TokenAmount::new(from.token.clone(), dec!(0.1)),
                    time_estimate: BridgeTimeEstimate { low_secs: 20, high_secs: 60 },
                })
            });
        bridge
            .expect_build_hook_data()
            .returning(|_, payload| Ok(payload.clone()));
        bridge
            .expect_build_burn_step()
            .returning(|from, _, hook| {
                Ok(ZapStep {
                    target: burn_target(),
                    value: BigUint::default(),
                    data: hook.clone(),
                    tokens: vec![StepToken::new(from.token.address.clone(), BalanceInsert::At(4))],
                })
            });
        bridge
    }

    fn no_support() -> MockSwapAggregator {
        let mut aggregator = MockSwapAggregator::new();
        aggregator
            .expect_fetch_token_support()
            .returning(|_, _, _| Ok(TokenSupport::default()));
        aggregator
    }

    struct Setup {
        strategy: CrossChainStrategy,
        vault: Vault,
        _resolver: Arc<dyn StrategyResolver>,
    }

    fn setup(bridge: MockBridgeProvider, with_sibling: bool) -> Setup {
        let bridge: Arc<dyn BridgeProvider> = Arc::new(bridge);
        let helpers = Arc::new(helpers(
            snapshot(),
            no_support(),
            MockPoolStateReader::new(),
            Some(bridge),
        ));
        let vault = standard_vault("beefy-usdc", usdc(), dec!(1));
        let mut siblings = Vec::new();
        if with_sibling {
            siblings.push(Arc::new(Strategy::Single(
                SingleStrategy::new(vault.clone(), helpers.clone()).unwrap(),
            )));
        }
        let resolver: Arc<dyn StrategyResolver> =
            Arc::new(StaticResolver(HashMap::from([(vault.id.clone(), siblings)])));
        let strategy =
            CrossChainStrategy::new(vault.clone(), &[Chain::Arbitrum], helpers, Arc::downgrade(&resolver))
                .unwrap();
        Setup { strategy, vault, _resolver: resolver }
    }

    fn deposit_option(setup: &Setup) -> ZapOption {
        setup
            .strategy
            .option(ZapAction::Deposit, arb_usdc(), SelectionOrder::TokenOfPool, arb_usdc())
    }

    #[test_log::test(tokio::test)]
    async fn test_deposit_options_start_on_remote_chain() {
        let setup = setup(bridge(0), true);

        let options = setup
            .strategy
            .fetch_deposit_options()
            .await
            .unwrap();

        assert_eq!(options, vec![deposit_option(&setup)]);
        assert_eq!(options[0].chain, Chain::Arbitrum);
    }

    #[test_log::test(tokio::test)]
    async fn test_deposit_bridges_then_deposits() {
        let setup = setup(bridge(2), true);
        let option = deposit_option(&setup);

        let quote = setup
            .strategy
            .fetch_deposit_quote(&[InputTokenAmount::new(arb_usdc(), dec!(1000), false)], &option)
            .await
            .unwrap();
        let order = setup
            .strategy
            .fetch_deposit_step(&quote, &step_context(dec!(0.01)))
            .await
            .unwrap();

        assert!(matches!(quote.steps[0], ZapQuoteStep::Bridge { .. }));
        assert!(matches!(quote.steps[1], ZapQuoteStep::Deposit { .. }));
        assert_eq!(
            quote.outputs,
            vec![TokenAmount::new(setup.vault.share_token.clone(), dec!(999.9))]
        );
        assert_eq!(order.steps.len(), 1);
        assert_eq!(order.steps[0].target, burn_target());
        // nothing is owed on the source chain, the bridged token is only swept
        assert_eq!(order.outputs.len(), 1);
        assert_eq!(order.outputs[0].token, arb_usdc().address);
        assert_eq!(order.outputs[0].min_output_amount, BigUint::default());
    }

    #[test]
    fn test_bridged_ratio() {
        let quoted = TokenAmount::new(arb_usdc(), dec!(1000));

        assert_eq!(bridged_ratio(&quoted, &TokenAmount::new(arb_usdc(), dec!(990))), dec!(0.99));
        // a zero quoted output does not divide
        assert_eq!(
            bridged_ratio(&TokenAmount::new(arb_usdc(), dec!(0)), &quoted),
            Decimal::ONE
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_no_sibling_fails_after_single_bridge_quote() {
        let setup = setup(bridge(1), false);
        let option = deposit_option(&setup);

        let err = setup
            .strategy
            .fetch_deposit_quote(&[InputTokenAmount::new(arb_usdc(), dec!(1000), false)], &option)
            .await
            .unwrap_err();

        assert!(matches!(err, ZapError::RouteNotFound(_)), "{err}");
    }

    #[test_log::test(tokio::test)]
    async fn test_withdraw_redeems_then_bridges() {
        let setup = setup(bridge(2), true);
        let option = setup
            .strategy
            .option(ZapAction::Withdraw, arb_usdc(), SelectionOrder::TokenOfPool, usdc());
        let shares = setup.vault.share_token.clone();

        let quote = setup
            .strategy
            .fetch_withdraw_quote(&[InputTokenAmount::new(shares, dec!(10), false)], &option)
            .await
            .unwrap();
        let order = setup
            .strategy
            .fetch_withdraw_step(&quote, &step_context(dec!(0.01)))
            .await
            .unwrap();

        assert!(matches!(quote.steps[0], ZapQuoteStep::Withdraw { .. }));
        assert!(matches!(quote.steps[1], ZapQuoteStep::Bridge { .. }));
        assert_eq!(quote.outputs, vec![TokenAmount::new(arb_usdc(), dec!(9.9))]);
        assert_eq!(order.steps.len(), 2);
        assert_eq!(order.steps[0].target, setup.vault.address);
        assert_eq!(order.steps[1].target, burn_target());
    }
}
