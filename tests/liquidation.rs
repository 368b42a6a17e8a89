//! End-to-end liquidation against the mainnet block 12489619 fixture.

use alloy::primitives::{address, Address, U256};
use std::path::PathBuf;

use liquidation_chain::{ForkSnapshot, Ledger};
use liquidation_core::config::{load_operator, OperatorConfig, SettlementSection};
use liquidation_core::u256_math::WAD;
use liquidation_core::{
    DebtToCover, FlashLoanSource, FlowKind, Host, LiquidationCall, LiquidationEventFilter,
    LiquidationOperator, OperatorError, Stage, USDT, WBTC, WETH,
};

const POOL: Address = address!("7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9");
const BORROWER: Address = address!("59CE4a2AC5bC3f5F225439B2993b86B42f6D3e9F");
const HEALTHY_BORROWER: Address = address!("2222222222222222222222222222222222222222");
const CALLER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const OPERATOR: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
const WBTC_WETH: Address = address!("Bb2b8038a1640196FbE3e38816F3e67Cba72D940");
const WETH_USDT: Address = address!("0d4a11d5EEaaC28EC3F61d100daF4d40471f1852");

const DEBT_TO_COVER: u64 = 2_916_378_221_684;

fn config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

fn load_config() -> OperatorConfig {
    load_operator(config_dir().join("operator.toml")).unwrap().0
}

fn ledger() -> Ledger {
    let config = load_config();
    let snapshot = ForkSnapshot::from_file(config_dir().join(config.fork.unwrap().snapshot)).unwrap();
    Ledger::from_snapshot(&snapshot).unwrap()
}

fn fixture() -> (Ledger, LiquidationOperator) {
    let settings = load_config().resolve().unwrap();
    (ledger(), LiquidationOperator::new(settings))
}

/// Run a call expected to fail and check that it left no trace.
fn operate_and_revert(ledger: &mut Ledger, operator: &LiquidationOperator) -> OperatorError {
    let before = ledger.clone();
    let err = operator.operate(ledger).unwrap_err();
    assert_eq!(*ledger, before);
    err
}

#[test]
fn test_liquidation_pays_profit_in_native() {
    let (mut ledger, operator) = fixture();
    let starting = ledger.native_balance(CALLER);
    let pool_usdt = ledger.token_balance(USDT.address, POOL);
    let plan = operator.plan(&ledger).unwrap();

    let report = operator.operate(&mut ledger).unwrap();

    let records = LiquidationEventFilter::new(POOL, BORROWER)
        .verify(&report.logs)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user, BORROWER);
    assert_eq!(records[0].liquidator, OPERATOR);
    assert_eq!(records[0].debt_to_cover, U256::from(DEBT_TO_COVER));
    assert_eq!(records[0].liquidated_collateral_amount, report.liquidation.collateral_seized);

    assert!(report.profit > U256::from(10u64) * WAD);
    assert!(report.profit < U256::from(20u64) * WAD);
    assert_eq!(ledger.native_balance(CALLER), starting + report.profit);
    assert_eq!(report.profit, plan.expected_profit);
    assert_eq!(report.flows.paid_out(), report.profit);
    assert!(report.flows.reconciles());
    assert_eq!(
        report.stages,
        vec![
            Stage::Idle,
            Stage::Borrowing,
            Stage::Liquidating,
            Stage::Swapping,
            Stage::Repaying,
            Stage::ProfitChecked,
            Stage::Succeeded,
        ]
    );

    // The operator keeps nothing
    for token in [USDT.address, WBTC.address, WETH.address] {
        assert_eq!(ledger.token_balance(token, OPERATOR), U256::ZERO);
    }
    assert_eq!(ledger.native_balance(OPERATOR), U256::ZERO);

    // Pool receives the repaid debt plus the flash loan premium
    let premium = report.flash_loan.premium;
    assert_eq!(premium, U256::from(2_624_740_399u64));
    assert_eq!(report.flows.total(FlowKind::FlashRepayment), report.flash_loan.repayment());
    assert_eq!(
        ledger.token_balance(USDT.address, POOL),
        pool_usdt + U256::from(DEBT_TO_COVER) + premium
    );

    let position = ledger.user_position(POOL, BORROWER).unwrap();
    assert_eq!(
        position.debt(USDT.address).unwrap().amount,
        U256::from(8_128_956_950_000u64 - DEBT_TO_COVER)
    );
}

#[test]
fn test_second_call_finds_position_healthy() {
    let (mut ledger, operator) = fixture();
    operator.operate(&mut ledger).unwrap();

    let err = operate_and_revert(&mut ledger, &operator);
    assert_eq!(err.reason_code(), "NOT_LIQUIDATABLE");
}

#[test]
fn test_healthy_position_reverts() {
    let (mut ledger, operator) = fixture();
    ledger
        .set_asset_price(POOL, WBTC.address, U256::from(20u64) * WAD)
        .unwrap();

    let err = operate_and_revert(&mut ledger, &operator);
    assert!(matches!(err, OperatorError::NotLiquidatable { user, .. } if user == BORROWER));
}

#[test]
fn test_healthy_borrower_is_not_liquidatable() {
    let mut config = load_config();
    config.target.borrower = HEALTHY_BORROWER;
    config.target.collateral_asset = "WETH".to_string();
    config.swap.collateral_route.remove(0);
    let operator = LiquidationOperator::new(config.resolve().unwrap());
    let mut ledger = ledger();

    let err = operate_and_revert(&mut ledger, &operator);
    assert_eq!(err.reason_code(), "NOT_LIQUIDATABLE");
}

#[test]
fn test_competitor_liquidates_first() {
    let (mut ledger, operator) = fixture();
    let competitor = Address::repeat_byte(0xc0);
    ledger
        .mint(USDT.address, competitor, U256::from(10_000_000_000_000u64))
        .unwrap();
    ledger
        .liquidation_call(
            POOL,
            &LiquidationCall {
                collateral_asset: WBTC.address,
                debt_asset: USDT.address,
                user: BORROWER,
                debt_to_cover: DebtToCover::Max,
                liquidator: competitor,
                receive_a_token: false,
            },
        )
        .unwrap();
    assert_eq!(
        LiquidationEventFilter::new(POOL, BORROWER).liquidation_logs(ledger.logs()).len(),
        1
    );

    let err = operate_and_revert(&mut ledger, &operator);
    assert_eq!(err.reason_code(), "NOT_LIQUIDATABLE");
}

#[test]
fn test_skewed_payout_pair_exceeds_slippage() {
    let (mut ledger, operator) = fixture();
    // 2900 USDT per ETH against an oracle price of 2400
    ledger
        .set_pair_reserves(
            WETH_USDT,
            U256::from(50_000u64) * WAD,
            U256::from(145_000_000_000_000u64),
        )
        .unwrap();

    let err = operate_and_revert(&mut ledger, &operator);
    assert!(matches!(err, OperatorError::SlippageExceeded { amount_out, min_out } if amount_out < min_out));
}

#[test]
fn test_drained_collateral_pair_cannot_repay() {
    let (mut ledger, operator) = fixture();
    ledger
        .set_pair_reserves(WBTC_WETH, U256::from(400_000_000_000u64), U256::from(100u64) * WAD)
        .unwrap();

    let err = operate_and_revert(&mut ledger, &operator);
    assert!(matches!(
        err,
        OperatorError::RepaymentShortfall { asset, required, available }
            if asset == USDT.address && available < required
    ));
}

#[test]
fn test_flash_loan_liquidity_too_low() {
    let (mut ledger, operator) = fixture();
    ledger.set_token_balance(USDT.address, POOL, U256::from(1_000_000_000u64));

    let err = operate_and_revert(&mut ledger, &operator);
    assert!(matches!(
        err,
        OperatorError::InsufficientLiquidity { source_address, requested, .. }
            if source_address == POOL && requested == U256::from(DEBT_TO_COVER)
    ));
}

#[test]
fn test_break_even_is_unprofitable() {
    let (mut ledger, operator) = fixture();
    // Swap proceeds cover the flash repayment exactly
    ledger
        .set_pair_reserves(
            WETH_USDT,
            U256::from(50_000u64) * WAD,
            U256::from(118_750_070_564_068u64),
        )
        .unwrap();
    let plan = operator.plan(&ledger).unwrap();
    assert_eq!(plan.residual, U256::ZERO);

    let err = operate_and_revert(&mut ledger, &operator);
    assert!(matches!(err, OperatorError::UnprofitableOutcome { starting, ending } if starting == ending));
}

#[test]
fn test_failure_is_repeatable() {
    let (mut ledger, operator) = fixture();
    ledger.set_token_balance(USDT.address, POOL, U256::ZERO);

    let first = operate_and_revert(&mut ledger, &operator);
    let second = operate_and_revert(&mut ledger, &operator);
    assert_eq!(first, second);
    assert!(ledger.logs().is_empty());
}

#[test]
fn test_plan_does_not_touch_state() {
    let (ledger, operator) = fixture();
    let before = ledger.clone();
    let plan = operator.plan(&ledger).unwrap();
    assert_eq!(ledger, before);
    assert_eq!(plan.block_number, 12489619);
    assert_eq!(plan.liquidation.debt_to_cover, U256::from(DEBT_TO_COVER));
    assert!(plan.expected_profit >= plan.payout_min_out);
    assert_eq!(plan.collateral_swap.unwrap().hop_outputs.len(), 2);
}

#[test]
fn test_settle_in_debt_token() {
    let mut config = load_config();
    config.swap.payout_route.clear();
    config.settlement = SettlementSection::Token {
        asset: "USDT".to_string(),
    };
    let operator = LiquidationOperator::new(config.resolve().unwrap());
    let mut ledger = ledger();
    let native = ledger.native_balance(CALLER);

    let report = operator.operate(&mut ledger).unwrap();
    assert!(report.payout_swap.is_none());
    assert_eq!(report.profit, report.plan.residual);
    assert_eq!(ledger.token_balance(USDT.address, CALLER), report.profit);
    assert_eq!(ledger.native_balance(CALLER), native);
    assert!(report.flows.reconciles());
}

#[test]
fn test_max_debt_to_cover_uses_close_factor() {
    let mut config = load_config();
    config.target.debt_to_cover = "max".to_string();
    config.liquidation.close_factor_bps = Some(2500);
    let operator = LiquidationOperator::new(config.resolve().unwrap());
    let ledger = ledger();

    let plan = operator.plan(&ledger).unwrap();
    // 25% of 8_128_956.95 USDT, rounded half-up
    assert_eq!(plan.liquidation.debt_to_cover, U256::from(2_032_239_237_500u64));
}

#[test]
fn test_flash_pair_on_swap_route_fails_before_borrowing() {
    let mut settings = load_config().resolve().unwrap();
    settings.flash_loan = FlashLoanSource::Pair { pair: WETH_USDT };
    let operator = LiquidationOperator::new(settings);
    let mut ledger = ledger();

    assert_eq!(operator.plan(&ledger).unwrap_err().reason_code(), "INVALID_CONFIG");
    let err = operate_and_revert(&mut ledger, &operator);
    assert!(matches!(err, OperatorError::Config(_)));
    assert!(ledger.logs().is_empty());
}
