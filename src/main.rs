//! Vigil server entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use vigil::adapters::authn::{HttpTokenVerifier, StaticTokenVerifier};
use vigil::adapters::http::{AppState, HttpServer, HttpServerConfig};
use vigil::adapters::notify::{ChatNotifier, PushNotifier};
use vigil::adapters::sqlite::{
    all_embedded_migrations, create_pool, Migrator, SqliteEscalationRepository,
    SqliteGroupRepository, SqliteIncidentRepository, SqliteIntegrationRepository,
    SqliteMembershipRepository, SqliteNotificationQueue, SqliteScheduleRepository,
    SqliteServiceRepository, SqliteUserRepository,
};
use vigil::domain::models::Config;
use vigil::domain::ports::{
    EscalationRepository, GroupRepository, IncidentRepository, IntegrationRepository,
    MembershipRepository, NotificationQueue, Notifier, ScheduleRepository, ServiceRepository,
    TokenVerifier, UserRepository,
};
use vigil::infrastructure::{init_logging, ConfigLoader, IdentityStore};
use vigil::services::{
    AccessControl, EscalationService, EscalationTimer, IncidentService, IngestPipeline,
    NotificationDispatcher, RoutingService, ScheduleService,
};

#[derive(Parser)]
#[command(name = "vigil", version, about = "On-call incident management backend")]
struct Cli {
    /// Path to a configuration file (defaults to vigil.yaml + environment).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations and exit.
    Migrate,
    /// Run the API server together with its background workers.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")?;

    init_logging(&config.logging)?;

    match cli.command {
        Commands::Migrate => migrate(&config).await,
        Commands::Serve => serve(config).await,
    }
}

async fn migrate(config: &Config) -> Result<()> {
    let pool = create_pool(&config.database_url, None)
        .await
        .context("Failed to connect to database")?;
    let applied = Migrator::new(pool)
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to run database migrations")?;
    tracing::info!(applied, "migrations complete");
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let pool = create_pool(&config.database_url, None)
        .await
        .context("Failed to connect to database")?;
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to run database migrations")?;

    let identity = Arc::new(IdentityStore::new(&config.data_dir));
    identity.init().await.context("Failed to initialize identity key")?;

    // Repositories
    let memberships: Arc<dyn MembershipRepository> =
        Arc::new(SqliteMembershipRepository::new(pool.clone()));
    let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
    let groups: Arc<dyn GroupRepository> = Arc::new(SqliteGroupRepository::new(pool.clone()));
    let services: Arc<dyn ServiceRepository> =
        Arc::new(SqliteServiceRepository::new(pool.clone()));
    let integrations: Arc<dyn IntegrationRepository> =
        Arc::new(SqliteIntegrationRepository::new(pool.clone()));
    let schedules: Arc<dyn ScheduleRepository> =
        Arc::new(SqliteScheduleRepository::new(pool.clone()));
    let escalation_repo: Arc<dyn EscalationRepository> =
        Arc::new(SqliteEscalationRepository::new(pool.clone()));
    let incident_repo: Arc<dyn IncidentRepository> =
        Arc::new(SqliteIncidentRepository::new(pool.clone()));
    let queue: Arc<dyn NotificationQueue> = Arc::new(SqliteNotificationQueue::new(pool.clone()));

    // Services
    let access = Arc::new(AccessControl::new(memberships.clone()));
    let schedule_service = Arc::new(ScheduleService::new(schedules.clone()));
    let escalation_service =
        Arc::new(EscalationService::new(escalation_repo.clone(), schedules.clone()));
    let incident_service = Arc::new(IncidentService::new(
        incident_repo.clone(),
        users.clone(),
        escalation_service.clone(),
    ));
    let routing_service =
        Arc::new(RoutingService::new(integrations.clone(), services.clone()));
    let ingest = Arc::new(IngestPipeline::new(
        integrations.clone(),
        incident_repo.clone(),
        users.clone(),
        routing_service.clone(),
        escalation_service.clone(),
        incident_service.clone(),
        config.ingest.fingerprint_dedup,
    ));

    // Token verification
    let verifier: Arc<dyn TokenVerifier> = match &config.identity_provider_url {
        Some(url) => Arc::new(HttpTokenVerifier::new(
            url.clone(),
            config.identity_provider_anon_key.clone(),
        )?),
        None => {
            tracing::warn!(
                "no identity provider configured; all bearer tokens will be rejected"
            );
            Arc::new(StaticTokenVerifier::new())
        }
    };

    // Delivery channels
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(url) = &config.notifier.push_gateway_url {
        notifiers.push(Arc::new(PushNotifier::new(
            url.clone(),
            config.notifier.push_gateway_key.clone(),
            users.clone(),
        )?));
    }
    if let Some(url) = &config.notifier.chat_webhook_url {
        notifiers.push(Arc::new(ChatNotifier::new(url.clone())?));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = Vec::new();

    if config.notification_worker_enabled {
        let dispatcher = NotificationDispatcher::new(
            queue.clone(),
            incident_repo.clone(),
            users.clone(),
            notifiers,
        );
        let rx = shutdown_rx.clone();
        workers.push(tokio::spawn(async move {
            dispatcher.run(rx, Duration::from_secs(2)).await;
        }));
    } else {
        tracing::info!("notification worker disabled by configuration");
    }

    let timer = EscalationTimer::new(
        incident_repo.clone(),
        escalation_repo.clone(),
        incident_service.clone(),
        config.escalation.continue_after_ack,
    );
    let timer_rx = shutdown_rx.clone();
    let tick = Duration::from_secs(config.escalation_tick_interval);
    workers.push(tokio::spawn(async move {
        timer.run(timer_rx, tick).await;
    }));

    let state = Arc::new(AppState {
        incidents: incident_service,
        schedules: schedule_service,
        escalations: escalation_service,
        routing: routing_service,
        ingest,
        access,
        groups,
        services,
        integrations,
        memberships,
        users,
        identity,
        verifier,
        public_base_url: config.public_base_url.clone(),
    });

    let server = HttpServer::new(
        state,
        HttpServerConfig {
            host: config.http.host.clone(),
            port: config.http.port,
            enable_cors: config.http.enable_cors,
        },
    );

    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    // Workers finish their in-flight batch before exiting.
    let _ = shutdown_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }
    tracing::info!("shutdown complete");
    Ok(())
}
