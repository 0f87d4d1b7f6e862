use anyhow::Result;
use api_client::BingxClient;
use configuration::settings::Policy;
use database::{connect, run_migrations, MirrorRepository};
use engine::{Engine, QUOTE_ASSET};

#[tokio::main]
async fn main() -> Result<()> {
    configuration::init_tracing()?;
    let settings = configuration::load_settings()?;

    tracing::info!("grid engine starting");

    let pool = connect(&settings.db_url).await?;
    run_migrations(&pool).await?;
    let mirror = MirrorRepository::new(pool);

    let api = BingxClient::new(&settings)?;
    let engine = Engine::new(settings, Policy::default(), api, mirror);

    // The ledger must be restored before any task runs.
    engine.restore_from_mirror().await?;
    engine.bootstrap_balances().await;

    let usdt = engine.account.balance(QUOTE_ASSET).await;
    if usdt < engine.policy.account_balance_floor {
        tracing::warn!(%usdt, "USDT balance below the working floor, buys will be refused");
    }

    let global_tasks = engine.spawn_global_tasks();
    engine.start_active_symbols().await;

    tracing::info!("engine running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutdown requested, cancelling tasks");
    engine.tasks.cancel_all().await;
    for handle in global_tasks {
        handle.abort();
    }

    Ok(())
}
