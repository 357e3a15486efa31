//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use fluffer_core::{
    CalendarSource, CommandHandler, EngineSettings, InboundRouter, KeyValueStore,
    NotificationSurface, RsvpEngine,
};
use fluffer_domain::{Config, FlufferError, Result};
use fluffer_infra::scheduling::TickRunner;
use fluffer_infra::{
    DbManager, DiscordGateway, DiscordSurface, GoogleCalendarSource, HttpClient, SqliteKeyValueStore,
    SyncScheduler, SyncSchedulerConfig,
};
use tracing::{error, info};

/// Upper bound for scheduler and gateway start.
const LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub engine: Arc<RsvpEngine>,
    /// Where chat messages, reactions and subscriptions are delivered.
    pub inbound: Arc<InboundRouter>,
    scheduler: SyncScheduler,
    gateway: Option<DiscordGateway>,
}

impl AppContext {
    /// Validate `config`, open storage and construct every adapter.
    ///
    /// Nothing talks to the network until [`AppContext::start`].
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(Arc::clone(&db)));

        let http = HttpClient::new()?;
        let calendar: Arc<dyn CalendarSource> = Arc::new(
            GoogleCalendarSource::new(&config.calendar, http.clone())?
                .with_cache(Arc::clone(&kv)),
        );
        let surface: Arc<dyn NotificationSurface> =
            Arc::new(DiscordSurface::new(&config.discord, http)?);

        let engine = Arc::new(RsvpEngine::new(
            calendar,
            Arc::clone(&surface),
            kv,
            EngineSettings::from_config(&config)?,
        ));
        engine.load_settings().await?;

        let commands = Arc::new(CommandHandler::new(
            Arc::clone(&engine),
            surface,
            config.discord.command_prefix.clone(),
        ));
        let inbound = Arc::new(InboundRouter::new(Arc::clone(&engine), commands));
        let gateway = if config.discord.gateway {
            Some(DiscordGateway::new(&config.discord, Arc::clone(&inbound))?)
        } else {
            info!("Discord gateway disabled; reactions are caught up on restart only");
            None
        };

        let runner: Arc<dyn TickRunner> = engine.clone();
        let scheduler = SyncScheduler::new(
            runner,
            SyncSchedulerConfig {
                interval: Duration::from_secs(config.sync.refresh_interval_secs),
                ..SyncSchedulerConfig::default()
            },
        );

        info!(
            calendar = %config.calendar.calendar_id,
            guild = %config.discord.guild_id,
            database = %config.database.path,
            "Application context ready"
        );
        Ok(Self { config, db, engine, inbound, scheduler, gateway })
    }

    /// Start periodic reconciliation, then the gateway listener.
    ///
    /// The first tick runs immediately.
    pub async fn start(&mut self) -> Result<()> {
        tokio::time::timeout(LIFECYCLE_TIMEOUT, self.scheduler.start())
            .await
            .map_err(|_| {
                error!(timeout_secs = LIFECYCLE_TIMEOUT.as_secs(), "SyncScheduler start timed out");
                FlufferError::Internal("SyncScheduler start timed out".into())
            })?
            .map_err(|err| {
                error!(error = %err, "failed to start SyncScheduler");
                FlufferError::from(err)
            })?;

        if let Some(gateway) = self.gateway.as_mut() {
            tokio::time::timeout(LIFECYCLE_TIMEOUT, gateway.start())
                .await
                .map_err(|_| {
                    error!(
                        timeout_secs = LIFECYCLE_TIMEOUT.as_secs(),
                        "Discord gateway start timed out"
                    );
                    FlufferError::Internal("Discord gateway start timed out".into())
                })??;
        }
        Ok(())
    }

    /// Disconnect the gateway, then stop the scheduler, letting an in-flight
    /// tick finish.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(gateway) = self.gateway.as_mut() {
            gateway.stop().await;
        }
        if !self.scheduler.is_running() {
            return Ok(());
        }
        self.scheduler.stop().await?;
        info!("Scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }
}
