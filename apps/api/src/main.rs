mod ai;
mod auth;
mod cli;
mod config;
mod cv;
mod db;
mod email;
mod errors;
mod llm_client;
mod logs;
mod models;
mod pagination;
mod pdf;
mod routes;
mod state;
mod tasks;
mod web;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai::{OpenAiAnalyst, OpenAiTranslator};
use crate::auth::accounts::bootstrap_admin;
use crate::auth::session::SessionStore;
use crate::cli::Mode;
use crate::config::Config;
use crate::db::create_pool;
use crate::email::EmailDispatcher;
use crate::llm_client::LlmClient;
use crate::pdf::storage::S3PdfStore;
use crate::routes::build_router;
use crate::state::AppState;
use crate::tasks::jobs::run_job;
use crate::tasks::progress::ProgressReporter;
use crate::tasks::queue::RedisTaskQueue;
use crate::tasks::registry::job_from_args;
use crate::tasks::scheduler::run_beat;
use crate::tasks::worker::{with_time_limit, BackgroundWorker, TASK_TIME_LIMIT};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = Mode::parse(&args).map_err(anyhow::Error::msg)?;

    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Project v{} ({mode:?})", env!("CARGO_PKG_VERSION"));

    let state = build_state(config.clone()).await?;

    match mode {
        Mode::Serve => serve(state).await,
        Mode::Worker => {
            let handles = Arc::new(BackgroundWorker::new(state.clone())).spawn(config.worker_concurrency);
            info!(concurrency = handles.len(), "Worker running");
            join_workers(handles).await;
            Ok(())
        }
        Mode::Beat => {
            run_beat(state.queue.clone()).await;
            Ok(())
        }
        Mode::RunTask { name, args, queued } => run_task(&state, &name, &args, queued).await,
    }
}

async fn build_state(config: Config) -> Result<AppState> {
    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    if let Some(admin) = &config.admin {
        bootstrap_admin(&db, admin)
            .await
            .context("Failed to bootstrap admin account")?;
        info!(username = %admin.username, "Admin account ready");
    }

    // Initialize Redis (broker, result store and sessions)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // One LLM client shared by translation and analysis
    let llm = LlmClient::new(&config.openai);
    if llm.is_enabled() {
        info!("LLM client initialized (model: {})", llm.model());
    } else {
        warn!("OPENAI_API_KEY not set: translation and analysis are disabled");
    }

    let email = EmailDispatcher::from_config(&config.email).context("Failed to configure email")?;
    info!(providers = ?email.providers(), "Email delivery chain ready");

    Ok(AppState {
        db,
        sessions: SessionStore::new(redis.clone(), config.session_ttl_secs, config.secure_cookies),
        queue: Arc::new(RedisTaskQueue::new(redis)),
        pdf_store: Arc::new(S3PdfStore::new(s3, &config.s3_bucket)),
        email,
        translator: Arc::new(OpenAiTranslator::new(llm.clone())),
        analyst: Arc::new(OpenAiAnalyst::new(llm)),
        config,
    })
}

async fn serve(state: AppState) -> Result<()> {
    let config = state.config.clone();

    if config.embedded_worker {
        Arc::new(BackgroundWorker::new(state.clone())).spawn(config.worker_concurrency);
        tokio::spawn(run_beat(state.queue.clone()));
        info!(concurrency = config.worker_concurrency, "Embedded worker and scheduler started");
    }

    let app = build_router(state)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// `run-task`: executes a job in-process and prints its result, or queues it with `--async`.
async fn run_task(state: &AppState, name: &str, args: &[String], queued: bool) -> Result<()> {
    let job = job_from_args(name, args)?;

    if queued {
        let id = state.queue.enqueue(job, None).await?;
        println!("{id}");
        return Ok(());
    }

    let result = with_time_limit(TASK_TIME_LIMIT, run_job(state, &job, &ProgressReporter::detached())).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn join_workers(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Worker loop ended: {e}");
        }
    }
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "cv-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
