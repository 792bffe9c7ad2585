//! Options (unpriced routes) and quotes (priced routes).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use super::{
    swap::QuoteResponse,
    token::{InputTokenAmount, Token, TokenAllowance, TokenAmount},
    zap::ZapAction,
    Address, Chain, VaultId,
};
use crate::zap::math::selection_id;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StrategyId {
    Single,
    UniswapLike,
    Curve,
    Balancer,
    Cowcentrated,
    GovComposer,
    VaultComposer,
    CrossChain,
}

/// Rank used to order equivalent options; lower ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionOrder {
    VaultToken = 1,
    AllTokensInPool = 2,
    TokenOfPool = 3,
    Other = 4,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OptionRoute {
    /// The vault's own deposit token.
    Direct,
    /// Routed through `via_token` using `via`.
    Swap { via: SwapProvider, via_token: Token },
    /// All pool tokens at once.
    AllTokens,
    CrossChain { source_chain: Chain, dest_chain: Chain, bridge_token: Token },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwapProvider {
    Pool,
    Aggregator,
    Wrap,
}

/// A proposed, unpriced route for one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapOption {
    pub id: String,
    pub strategy_id: StrategyId,
    pub vault_id: VaultId,
    pub chain: Chain,
    pub action: ZapAction,
    pub selection_id: String,
    pub selection_order: SelectionOrder,
    pub input_tokens: Vec<Token>,
    pub output_tokens: Vec<Token>,
    pub route: OptionRoute,
    pub underlying: Option<Box<ZapOption>>,
}

pub type DepositOption = ZapOption;
pub type WithdrawOption = ZapOption;

impl ZapOption {
    /// Creates an option; the selection id is derived from the user facing token set
    /// (inputs on deposit, outputs on withdraw).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy_id: StrategyId,
        vault_id: &str,
        chain: Chain,
        action: ZapAction,
        input_tokens: Vec<Token>,
        output_tokens: Vec<Token>,
        selection_order: SelectionOrder,
        route: OptionRoute,
    ) -> Self {
        let user_tokens = match action {
            ZapAction::Deposit => &input_tokens,
            ZapAction::Withdraw => &output_tokens,
        };
        let selection_id = selection_id(chain, user_tokens);
        Self {
            id: format!("{strategy_id}-{vault_id}-{selection_id}"),
            strategy_id,
            vault_id: vault_id.to_string(),
            chain,
            action,
            selection_id,
            selection_order,
            input_tokens,
            output_tokens,
            route,
            underlying: None,
        }
    }

    pub fn with_underlying(mut self, underlying: ZapOption) -> Self {
        self.underlying = Some(Box::new(underlying));
        self
    }

    /// The token the user supplies (deposit) or receives (withdraw) when the option has
    /// exactly one.
    pub fn user_token(&self) -> Option<&Token> {
        let tokens = match self.action {
            ZapAction::Deposit => &self.input_tokens,
            ZapAction::Withdraw => &self.output_tokens,
        };
        match tokens.as_slice() {
            [token] => Some(token),
            _ => None,
        }
    }
}

/// A fee as a fraction of the swapped amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZapFee {
    pub value: Decimal,
}

impl ZapFee {
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SwapVia {
    Pool { address: Address },
    Aggregator(QuoteResponse),
    /// Native to wrapped native or back.
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTimeEstimate {
    pub low_secs: u64,
    pub high_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeQuote {
    pub provider: String,
    pub from: TokenAmount,
    pub to: TokenAmount,
    pub fee: TokenAmount,
    pub time_estimate: BridgeTimeEstimate,
}

/// One unit of a quote, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ZapQuoteStep {
    Swap { via: SwapVia, from: TokenAmount, to: TokenAmount, fee: ZapFee },
    Build { inputs: Vec<TokenAmount>, output: TokenAmount },
    Split { input: TokenAmount, outputs: Vec<TokenAmount> },
    Deposit { inputs: Vec<TokenAmount>, output: TokenAmount },
    Withdraw { input: TokenAmount, outputs: Vec<TokenAmount> },
    Stake { input: TokenAmount, output: TokenAmount },
    Unstake { input: TokenAmount, output: TokenAmount },
    Bridge {
        from: TokenAmount,
        to: TokenAmount,
        from_chain: Chain,
        to_chain: Chain,
        fee: TokenAmount,
        time_estimate: BridgeTimeEstimate,
    },
    Unused { outputs: Vec<TokenAmount> },
}

impl ZapQuoteStep {
    /// Every token amount the step touches.
    pub fn token_amounts(&self) -> Vec<&TokenAmount> {
        match self {
            ZapQuoteStep::Swap { from, to, .. } |
            ZapQuoteStep::Stake { input: from, output: to } |
            ZapQuoteStep::Unstake { input: from, output: to } |
            ZapQuoteStep::Bridge { from, to, .. } => vec![from, to],
            ZapQuoteStep::Build { inputs, output } | ZapQuoteStep::Deposit { inputs, output } => {
                inputs
                    .iter()
                    .chain(std::iter::once(output))
                    .collect()
            }
            ZapQuoteStep::Split { input, outputs } | ZapQuoteStep::Withdraw { input, outputs } => {
                std::iter::once(input)
                    .chain(outputs.iter())
                    .collect()
            }
            ZapQuoteStep::Unused { outputs } => outputs.iter().collect(),
        }
    }

    pub fn fee(&self) -> ZapFee {
        match self {
            ZapQuoteStep::Swap { fee, .. } => *fee,
            ZapQuoteStep::Bridge { from, fee, .. } if !from.amount.is_zero() => {
                ZapFee::new(fee.amount / from.amount)
            }
            _ => ZapFee::zero(),
        }
    }
}

/// A fully priced route, ready to be built into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapQuote {
    pub id: Uuid,
    pub option: ZapOption,
    pub inputs: Vec<InputTokenAmount>,
    pub outputs: Vec<TokenAmount>,
    pub returned: Vec<TokenAmount>,
    pub allowances: Vec<TokenAllowance>,
    pub steps: Vec<ZapQuoteStep>,
    pub fee: ZapFee,
    /// Percentage of input value lost, 0..=100.
    pub price_impact: Decimal,
    /// Quote of the wrapped strategy, for composed routes.
    pub underlying: Option<Box<ZapQuote>>,
    pub bridge: Option<BridgeQuote>,
}

pub type DepositQuote = ZapQuote;
pub type WithdrawQuote = ZapQuote;

impl ZapQuote {
    pub fn new(option: ZapOption, inputs: Vec<InputTokenAmount>) -> Self {
        Self {
            id: Uuid::new_v4(),
            option,
            inputs,
            outputs: Vec::new(),
            returned: Vec::new(),
            allowances: Vec::new(),
            steps: Vec::new(),
            fee: ZapFee::zero(),
            price_impact: Decimal::ZERO,
            underlying: None,
            bridge: None,
        }
    }

    /// Every token seen anywhere in the quote, in first-seen order.
    pub fn all_tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut push = |token: &Token| {
            if !tokens.contains(token) {
                tokens.push(token.clone());
            }
        };
        self.inputs
            .iter()
            .for_each(|i| push(&i.token));
        self.steps
            .iter()
            .flat_map(|s| s.token_amounts())
            .for_each(|t| push(&t.token));
        self.outputs
            .iter()
            .chain(self.returned.iter())
            .for_each(|t| push(&t.token));
        tokens
    }
}
