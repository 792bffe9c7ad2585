//! Solidity interfaces of the contracts the zap router calls into.

use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IWrappedNative {
        function deposit() external payable;
        function withdraw(uint256 amount) external;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IUniswapV2Router {
        function addLiquidity(
            address tokenA,
            address tokenB,
            uint256 amountADesired,
            uint256 amountBDesired,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB, uint256 liquidity);

        function removeLiquidity(
            address tokenA,
            address tokenB,
            uint256 liquidity,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB);

        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] path,
            address to,
            uint256 deadline
        ) external returns (uint256[] amounts);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IBalancerVault {
        struct JoinPoolRequest {
            address[] assets;
            uint256[] maxAmountsIn;
            bytes userData;
            bool fromInternalBalance;
        }

        struct ExitPoolRequest {
            address[] assets;
            uint256[] minAmountsOut;
            bytes userData;
            bool toInternalBalance;
        }

        struct SingleSwap {
            bytes32 poolId;
            uint8 kind;
            address assetIn;
            address assetOut;
            uint256 amount;
            bytes userData;
        }

        struct FundManagement {
            address sender;
            bool fromInternalBalance;
            address recipient;
            bool toInternalBalance;
        }

        function joinPool(
            bytes32 poolId,
            address sender,
            address recipient,
            JoinPoolRequest request
        ) external payable;

        function exitPool(
            bytes32 poolId,
            address sender,
            address recipient,
            ExitPoolRequest request
        ) external;

        function swap(
            SingleSwap singleSwap,
            FundManagement funds,
            uint256 limit,
            uint256 deadline
        ) external payable returns (uint256 amountCalculated);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface ICurvePool2 {
        function add_liquidity(uint256[2] amounts, uint256 min_mint_amount) external returns (uint256);
        function remove_liquidity(uint256 amount, uint256[2] min_amounts) external returns (uint256[2]);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface ICurvePool3 {
        function add_liquidity(uint256[3] amounts, uint256 min_mint_amount) external returns (uint256);
        function remove_liquidity(uint256 amount, uint256[3] min_amounts) external returns (uint256[3]);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface ICurvePoolNg {
        function add_liquidity(uint256[] amounts, uint256 min_mint_amount) external returns (uint256);
        function remove_liquidity(uint256 amount, uint256[] min_amounts) external returns (uint256[]);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface ICurvePool {
        function remove_liquidity_one_coin(uint256 token_amount, int128 i, uint256 min_amount) external returns (uint256);
        function exchange(int128 i, int128 j, uint256 dx, uint256 min_dy) external returns (uint256);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IBeefyVault {
        function depositAll() external;
        function deposit(uint256 amount) external;
        function withdraw(uint256 shares) external;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IERC4626 {
        function deposit(uint256 assets, address receiver) external returns (uint256 shares);
        function redeem(uint256 shares, address receiver, address owner) external returns (uint256 assets);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IGovVault {
        function stake(uint256 amount) external;
        function withdraw(uint256 amount) external;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IConcentratedLiquidityManager {
        function deposit(uint256 amount0, uint256 amount1, uint256 minShares) external;
        function withdraw(uint256 shares, uint256 minAmount0, uint256 minAmount1) external;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface ITokenMessengerV2 {
        function depositForBurnWithHook(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 minFinalityThreshold,
            bytes hookData
        ) external;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IZapRouter {
        struct Input {
            address token;
            uint256 amount;
        }

        struct Output {
            address token;
            uint256 minOutputAmount;
        }

        struct Relay {
            address target;
            uint256 value;
            bytes data;
        }

        struct Order {
            Input[] inputs;
            Output[] outputs;
            Relay relay;
            address user;
            address recipient;
        }

        struct StepToken {
            address token;
            int32 index;
        }

        struct Step {
            address target;
            uint256 value;
            bytes data;
            StepToken[] tokens;
        }

        function executeOrder(Order order, Step[] route) external payable;
    }
}
