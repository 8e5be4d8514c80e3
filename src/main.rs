mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::Config;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::batch_admin::{routes as batch_routes, BatchAdminService};
use crate::features::build_registry;
use crate::features::deadletters::RedisActivityDeadLetterQueue;
use crate::modules::batch::{BatchStatus, JobLauncher, JobParameters, JobScheduler, PgJobRepository};
use crate::modules::redis::RedisListClient;
use axum::{middleware::from_fn, Router};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::process::ExitCode;
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Parser)]
#[command(name = "dailyfeed-batch", version, about = "Batch jobs of the dailyfeed platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Launch one job and wait for it to finish
    Run {
        /// Registered job name, e.g. tokenCleanupJob
        job: String,
        /// Job parameter, repeatable
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
    /// List registered jobs
    Jobs,
    /// Serve the admin API and launch scheduled jobs
    Serve,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli, worker_threads))
}

async fn async_main(cli: Cli, worker_threads: usize) -> anyhow::Result<ExitCode> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    if let Command::Jobs = cli.command {
        // Listing names needs neither database nor Redis to be reachable
        let pool = PgPoolOptions::new().connect_lazy(&config.database.url)?;
        let redis = RedisListClient::open(&config.redis)?;
        for name in build_launcher(&config, pool, redis)?.registry().names() {
            println!("{}", name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    database::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    let redis = RedisListClient::connect(&config.redis)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;
    tracing::info!("Redis client connected");

    let launcher = build_launcher(&config, pool, redis)?;

    match cli.command {
        Command::Run { job, params } => run_job(&launcher, &job, &params).await,
        Command::Serve => {
            serve(config, launcher).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Jobs => Ok(ExitCode::SUCCESS),
    }
}

fn build_launcher(
    config: &Config,
    pool: PgPool,
    redis: RedisListClient,
) -> anyhow::Result<Arc<JobLauncher>> {
    let registry = build_registry(
        &pool,
        Arc::new(RedisActivityDeadLetterQueue::new(redis)),
        &config.jwt_key,
        &config.batch,
    )?;
    Ok(Arc::new(JobLauncher::new(
        Arc::new(registry),
        Arc::new(PgJobRepository::new(pool)),
        config.batch.max_concurrent_jobs,
    )))
}

async fn run_job(launcher: &JobLauncher, job: &str, params: &[String]) -> anyhow::Result<ExitCode> {
    let params = JobParameters::from_pairs(params)?;
    let execution = launcher.run(job, params).await?;

    for step in &execution.step_executions {
        tracing::info!(
            "Step: [{}] {} read={} filtered={} written={} commits={} rollbacks={}",
            step.step_name,
            step.status,
            step.read_count,
            step.filter_count,
            step.write_count,
            step.commit_count,
            step.rollback_count
        );
    }
    tracing::info!(
        "Job: [{}] finished with status [{}] in {}ms",
        execution.job_name,
        execution.status,
        execution.duration_ms().unwrap_or_default()
    );

    if execution.status == BatchStatus::Failed {
        tracing::error!(
            "Job {} failed: {}",
            execution.job_name,
            execution.failure.as_deref().unwrap_or("unknown failure")
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve(config: Config, launcher: Arc<JobLauncher>) -> anyhow::Result<()> {
    let schedules = JobScheduler::new(Arc::clone(&launcher), config.batch.schedules.clone()).spawn()?;
    tracing::info!("Job scheduler started with {} schedules", schedules.len());

    let batch_admin_service = Arc::new(BatchAdminService::new(Arc::clone(&launcher)));

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.admin.title.clone(),
        version: config.admin.version.clone(),
        description: config.admin.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let admin_routes = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .merge(batch_routes::routes(batch_admin_service));

    // Swagger UI and the admin API share the basic auth credentials
    let admin_routes = if let Some(credentials) = config.admin.credentials() {
        tracing::info!("Admin API basic auth enabled");
        admin_routes.layer(from_fn(middleware::basic_auth_middleware(Arc::new(
            credentials,
        ))))
    } else {
        tracing::warn!("Admin API basic auth disabled (no credentials configured)");
        admin_routes
    };

    let app = Router::new()
        .merge(admin_routes)
        .merge(batch_routes::health_routes())
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;

    let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
    socket.set_tcp_keepalive(&keepalive)?;

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
