//! Margin Settlement Engine Simulation.
//!
//! Demonstrates the full settlement lifecycle including vault funding,
//! leveraged opens, profitable and underwater closes, and liquidations.

use ed25519_dalek::SigningKey;
use margin_core::*;

const USDC: AssetId = AssetId(2);
const TOKEN: AssetId = AssetId(3);
const HOUR_MS: i64 = 3_600_000;

fn main() {
    println!("Margin Settlement Engine Simulation");
    println!("Commitment-Verified Positions, Share-Based Vault\n");

    scenario_1_vault_funding();
    scenario_2_profitable_round_trip();
    scenario_3_underwater_close();
    scenario_4_liquidation();

    println!("\nAll simulations completed successfully.");
}

fn dex_addr() -> Address {
    Address([0xDD; 32])
}

fn fee_receiver() -> Address {
    Address([0x05; 32])
}

fn liquidator() -> Address {
    Address([0xAA; 32])
}

/// Engine with a 1:1 USDC/TOKEN venue, a funded vault, and a funded trader.
fn setup(engine_seed_usdc: u128) -> (Engine, SigningKey) {
    let mut dex = FixedRateDex::new();
    dex.register(dex_addr(), SwapProgram { rate_num: 1, rate_den: 1 });

    let mut config = EngineConfig::default();
    config.liquidators.insert(liquidator());

    let mut engine = Engine::try_new(
        config,
        USDC,
        Box::new(BpsFeePolicy::new(Bps::new(500), fee_receiver())),
        Box::new(LeverageRiskOracle::new(Bps::new(40_000), Bps::new(50))),
        Box::new(dex),
    )
    .unwrap();

    let lender = Address([0x01; 32]);
    engine
        .custody_mut()
        .mint(lender, USDC, Amount::new(engine_seed_usdc));
    engine
        .vault_deposit(lender, Amount::new(engine_seed_usdc), lender)
        .unwrap();

    engine
        .custody_mut()
        .mint(dex_addr(), TOKEN, Amount::new(1_000_000));
    engine
        .custody_mut()
        .mint(dex_addr(), USDC, Amount::new(1_000_000));

    let key = SigningKey::from_bytes(&[42u8; 32]);
    engine
        .custody_mut()
        .mint(address_of(&key), USDC, Amount::new(100));
    (engine, key)
}

fn open_leveraged(engine: &mut Engine, key: &SigningKey) -> Position {
    let order = Order {
        kind: OrderKind::Open,
        id: PositionId(1),
        trader: address_of(key),
        principal_asset: USDC,
        collateral_asset: TOKEN,
        principal: Amount::new(300),
        down_payment: Amount::new(100),
        min_collateral: Amount::new(395),
        expires_at: Timestamp::from_millis(i64::MAX),
        exchange_calls: vec![ExchangeCall {
            target: dex_addr(),
            value: Amount::ZERO,
            payload: encode_swap(USDC, TOKEN, Amount::new(395)),
        }],
    };
    engine.open_position(&SignedOrder::sign(order, key)).unwrap()
}

fn close_order(position: &Position, key: &SigningKey) -> SignedOrder {
    let order = Order {
        kind: OrderKind::Close,
        id: position.id,
        trader: position.trader,
        principal_asset: position.principal_asset,
        collateral_asset: position.collateral_asset,
        principal: position.principal,
        down_payment: position.down_payment,
        min_collateral: Amount::ZERO,
        expires_at: Timestamp::from_millis(i64::MAX),
        exchange_calls: vec![ExchangeCall {
            target: dex_addr(),
            value: Amount::ZERO,
            payload: encode_swap(TOKEN, USDC, position.collateral_amount),
        }],
    };
    SignedOrder::sign(order, key)
}

fn set_unwind_rate(engine: &mut Engine, rate_num: u128, rate_den: u128) {
    let mut dex = FixedRateDex::new();
    dex.register(dex_addr(), SwapProgram { rate_num, rate_den });
    engine.set_router(Box::new(dex));
}

/// Deposits appreciate with interest and absorb losses pro rata.
fn scenario_1_vault_funding() {
    println!("Scenario 1: Vault Funding and Shares\n");

    let (mut engine, _) = setup(1_000);
    let second = Address([0x02; 32]);
    engine.custody_mut().mint(second, USDC, Amount::new(500));

    let shares = engine.vault_deposit(second, Amount::new(500), second).unwrap();
    println!("  Second lender deposits 500, receives {} shares", shares);
    println!(
        "  Pool: {} assets, {} shares",
        engine.vault().total_assets(),
        engine.vault().total_shares()
    );

    let assets = engine
        .vault_withdraw(second, second, Amount::new(250), second)
        .unwrap();
    println!("  Withdrawing 250 shares pays out {} assets\n", assets);
}

/// Open at 4x, sell the collateral 10 hours later for more than was spent.
fn scenario_2_profitable_round_trip() {
    println!("Scenario 2: Profitable Round Trip\n");

    let (mut engine, key) = setup(1_000);
    let position = open_leveraged(&mut engine, &key);
    println!(
        "  Opened {}: 100 down (5 fee withheld), 300 borrowed, {} collateral",
        position.id, position.collateral_amount
    );

    engine.advance_time(10 * HOUR_MS);
    set_unwind_rate(&mut engine, 80, 79); // collateral now worth 400

    let outcome = engine
        .close_position(&close_order(&position, &key), &position, Amount::ZERO)
        .unwrap();
    println!(
        "  Closed: repaid {}, interest {}, close fee {}, trader keeps {}",
        outcome.principal_repaid, outcome.interest_paid, outcome.fee_amount, outcome.payout
    );
    println!(
        "  Vault grew to {} on interest\n",
        engine.vault().total_assets()
    );
}

/// Collateral sells for less than the borrowed principal.
fn scenario_3_underwater_close() {
    println!("Scenario 3: Underwater Close\n");

    let (mut engine, key) = setup(1_000);
    let position = open_leveraged(&mut engine, &key);

    set_unwind_rate(&mut engine, 50, 79); // collateral now worth 250

    let outcome = engine
        .close_position(&close_order(&position, &key), &position, Amount::ZERO)
        .unwrap();
    println!(
        "  Closed: proceeds covered only {} of the 300 principal",
        outcome.principal_repaid
    );
    println!(
        "  Vault absorbed the shortfall, down to {}\n",
        engine.vault().total_assets()
    );
}

/// A keeper may only finalize once the residual payout is small enough.
fn scenario_4_liquidation() {
    println!("Scenario 4: Liquidation Gating\n");

    let (mut engine, key) = setup(1_000);
    let position = open_leveraged(&mut engine, &key);
    engine.advance_time(10 * HOUR_MS);

    let sell = vec![ExchangeCall {
        target: dex_addr(),
        value: Amount::ZERO,
        payload: encode_swap(TOKEN, USDC, position.collateral_amount),
    }];

    set_unwind_rate(&mut engine, 66, 79); // residual would be 19, above 5% of 300
    let err = engine
        .liquidate_position(liquidator(), &position, &sell, Amount::ZERO)
        .unwrap_err();
    println!("  Healthy position: {}", err);
    println!(
        "  Position still open: {}",
        engine.position_is_open(position.id)
    );

    set_unwind_rate(&mut engine, 65, 79); // residual 15, at the threshold
    let outcome = engine
        .liquidate_position(liquidator(), &position, &sell, Amount::ZERO)
        .unwrap();
    println!(
        "  Distressed position liquidated, trader residual {}",
        outcome.payout
    );
    println!(
        "  Position still open: {}\n",
        engine.position_is_open(position.id)
    );
}
