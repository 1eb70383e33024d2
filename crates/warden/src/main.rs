use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use warden_bridge::runner::Bridge;
use warden_core::{
    config::Config,
    dispatch::Dispatcher,
    policy::PolicyEngine,
    poll::PollAggregator,
    ports::{StateStore, TransportPort},
    roster::RosterOracle,
    settings::SettingsStore,
    store::JsonFileStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_core::logging::init("warden");

    let cfg = Arc::new(Config::load().context("failed to load configuration")?);

    let bridge =
        Bridge::spawn(&cfg.bridge_command).context("failed to start the bridge process")?;
    let transport: Arc<dyn TransportPort> = bridge.transport.clone();
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(cfg.data_dir.clone()));

    let settings = Arc::new(
        SettingsStore::load(cfg.settings_scope, store.clone())
            .context("failed to load bot settings")?,
    );
    let oracle = Arc::new(RosterOracle::new(transport.clone(), cfg.roster_cache_ttl));
    let polls = Arc::new(
        PollAggregator::load(transport.clone(), store).context("failed to load poll state")?,
    );
    let dispatcher = Arc::new(Dispatcher::new(
        transport,
        oracle.clone(),
        PolicyEngine::new(oracle.clone()),
        polls,
        settings,
        cfg.command_prefix,
    ));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    bridge
        .pump(dispatcher, oracle, cfg.command_prefix, cancel)
        .await
        .context("bridge event loop failed")?;

    Ok(())
}
