//! A driver's day: collections, an expense, settlement and admin confirmation
//!
//! Run with `RUST_LOG=info cargo run --example daily_settlement`.

use bigdecimal::BigDecimal;
use fieldops_core::utils::MemoryStorage;
use fieldops_core::{
    CollectionBuilder, Driver, EngineConfig, ExpenseCategory, ExpenseDecision, ExpenseType,
    FieldLedger, Location, Reviewer,
};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Field Operations Core - Daily Settlement Example\n");

    let config = EngineConfig::from_env();
    println!("Coin value: {} TZS per meter unit\n", config.coin_value);

    let mut ledger = FieldLedger::with_config(MemoryStorage::new(), config);

    // 1. Register the fleet
    let driver = ledger
        .register_driver(
            Driver::new("D-NUDIN".to_string(), "Nudin".to_string(), "nudin".to_string())
                .with_float(BigDecimal::from(10000))
                .with_debt(BigDecimal::from(15000))
                .with_salary(BigDecimal::from(300_000), BigDecimal::from_str("0.05")?),
        )
        .await?;
    println!(
        "Driver {}: float {}, debt {}, salary {}",
        driver.name, driver.daily_floating_coins, driver.remaining_debt, driver.base_salary
    );

    for (id, name, rate, score) in [
        ("L-01", "Mama Ntilie", "0.15", 1000),
        ("L-02", "Duka la Juma", "0.20", 4200),
    ] {
        ledger
            .register_location(
                Location::new(
                    id.to_string(),
                    name.to_string(),
                    format!("M{}", id),
                    BigDecimal::from_str(rate)?,
                )
                .with_last_score(score)
                .assigned_to(driver.id.clone()),
            )
            .await?;
        println!("  Location {} at meter {}", name, score);
    }
    println!();

    // 2. Collect from both machines
    let first = ledger
        .record_collection(CollectionBuilder::new(
            "L-01".to_string(),
            driver.id.clone(),
            1250,
        ))
        .await?;
    println!(
        "Collected {} at {} (owner kept {}, net payable {})",
        first.transaction.revenue,
        first.transaction.location_name,
        first.transaction.owner_retention,
        first.transaction.net_payable
    );

    let second = ledger
        .record_collection(
            CollectionBuilder::new("L-02".to_string(), driver.id.clone(), 4300)
                .expense(
                    BigDecimal::from(5000),
                    ExpenseType::Public,
                    ExpenseCategory::Fuel,
                )
                .debt_deduction(BigDecimal::from(3000)),
        )
        .await?;
    println!(
        "Collected {} at {} (fuel {}, net payable {}, coins left {})",
        second.transaction.revenue,
        second.transaction.location_name,
        second.transaction.expenses,
        second.transaction.net_payable,
        second.calculation.remaining_coins
    );
    println!();

    // 3. Admin approves the fuel expense
    let review = ledger
        .review_expense(&second.transaction.id, ExpenseDecision::Approve)
        .await?;
    println!(
        "Fuel expense {:?}; debt increase {}",
        review.status, review.debt_increase
    );

    // 4. Day-end settlement
    let today = first.transaction.business_date();
    let totals = ledger.daily_totals(&driver.id, today).await?;
    println!(
        "\nDay totals: revenue {}, net payable {}, public expenses {}",
        totals.total_revenue, totals.total_net_payable, totals.total_public_expenses
    );

    let settlement = ledger
        .submit_settlement(
            &driver.id,
            today,
            BigDecimal::from(60000),
            BigDecimal::from(3000),
            None,
        )
        .await?;
    println!(
        "Settlement: expected {}, declared {}, outcome {:?}",
        settlement.expected_total,
        settlement.actual_total(),
        settlement.outcome()
    );

    let admin = Reviewer::new("ADMIN", "Boss");
    let confirmed = ledger
        .confirm_settlement(&settlement.id, &admin, None, None)
        .await?;
    println!(
        "Confirmed by {} with shortage {}",
        confirmed.admin_name.as_deref().unwrap_or("-"),
        confirmed.shortage
    );

    // 5. Payroll and fleet overview
    let payroll = ledger.driver_payroll(&driver.id, None, None).await?;
    println!(
        "\nPayroll: base {} + commission {} - debt {} = {}",
        payroll.base_salary, payroll.commission, payroll.debt_deduction, payroll.total
    );

    let stats = ledger.site_stats().await?;
    println!(
        "Sites: {} total, {} active ({}%)",
        stats.total, stats.active, stats.active_rate
    );

    for notification in ledger.unread_notifications().await? {
        println!("  [{:?}] {}", notification.kind, notification.title);
    }

    Ok(())
}
