use std::{
    fs,
    net::SocketAddr,
    process,
    sync::Arc,
    time::{Duration, Instant},
};

use folio::{
    application::{error::AppError, feed::FeedService},
    cache::{self, CacheConfig, ContentCache, StoreLoader},
    config,
    domain::posts::PostDraft,
    infra::{
        assets::AssetDirectory,
        error::InfraError,
        http::{self, HttpState, RequestRateLimiter},
        posts::PostWriter,
        telemetry,
    },
    presentation::views::LayoutChrome,
};
use tokio::task::JoinHandle;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::NewPost(args) => run_new_post(&settings, args),
        config::Command::Check(_) => run_check(&settings),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache = ContentCache::start(CacheConfig::from(&settings))?;

    let feed = FeedService::new(cache.store().clone(), cache.config().recent_posts);
    let rate_limiter = RequestRateLimiter::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    );
    let state = HttpState {
        feed: Arc::new(feed),
        chrome: LayoutChrome::from(&settings.site),
        assets: Arc::new(AssetDirectory::new(settings.assets.directory.clone())),
        rate_limiter: rate_limiter.clone(),
    };

    let sweeper = spawn_rate_limit_sweeper(rate_limiter);

    let result = serve_http(&settings, state).await;

    sweeper.abort();
    let _ = sweeper.await;
    cache.shutdown().await;

    result
}

fn spawn_rate_limit_sweeper(limiter: RequestRateLimiter) -> JoinHandle<()> {
    let period = limiter.window();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            limiter.sweep();
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| InfraError::Bind {
            addr: settings.server.addr,
            source,
        })?;

    info!(addr = %settings.server.addr, "Listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::from(InfraError::Serve(err)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

fn run_new_post(settings: &config::Settings, args: config::NewPostArgs) -> Result<(), AppError> {
    let body = match (args.body, args.body_file) {
        (Some(body), _) => body,
        (None, Some(path)) => {
            fs::read_to_string(&path).map_err(|source| InfraError::ReadBody { path, source })?
        }
        (None, None) => String::new(),
    };

    let draft = PostDraft {
        title: args.title,
        summary: args.summary,
        body,
        created: None,
    };

    let writer = PostWriter::new(
        settings.content.posts_dir.clone(),
        settings.content.extension.clone(),
    );
    let path = writer.save(draft)?;

    info!(path = %path.display(), "Post written");
    Ok(())
}

fn run_check(settings: &config::Settings) -> Result<(), AppError> {
    let loader = StoreLoader::new(
        settings.content.posts_dir.clone(),
        settings.content.extension.clone(),
    );

    let started = Instant::now();
    let outcome = loader.load();
    cache::record_load(outcome.as_ref(), started.elapsed());
    let outcome = outcome?;

    info!(
        posts_dir = %loader.root().display(),
        posts = outcome.snapshot.len(),
        skipped = outcome.skipped.len(),
        "Content check finished"
    );

    if outcome.skipped.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{} file(s) in {} could not be loaded",
            outcome.skipped.len(),
            loader.root().display()
        )))
    }
}
