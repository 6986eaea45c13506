use mimalloc::MiMalloc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use trainsync::config::Config;
use trainsync::types::{LoginDto, ScheduleFilter};
use trainsync::AppContext;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        api_url = %cfg.api_url,
        database_url = %cfg.database_url,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.loglevel,
    );

    let ctx = AppContext::start(cfg).await?;

    if !ctx.session.is_authenticated() {
        if let (Ok(login), Ok(password)) = (
            std::env::var("TRAINSYNC_LOGIN"),
            std::env::var("TRAINSYNC_PASSWORD"),
        ) {
            match ctx.session.login(&LoginDto { login, password }).await {
                Ok(user) => info!(user = %user.login, "signed in from environment"),
                Err(e) => warn!(error = %e, "sign-in failed"),
            }
        }
    }

    match ctx.queries.refresh_schedules(&ScheduleFilter::default()).await {
        Ok(page) => info!(loaded = page.len(), total = page.total(), "schedules loaded"),
        Err(e) => warn!(error = %e, message = %e.user_message(), "schedules unavailable"),
    }

    let mut events = ctx.realtime().subscribe_events();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            ev = events.recv() => match ev {
                Ok(ev) => info!(event = ev.name(), id = ev.schedule_id(), "realtime"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("skipped {} realtime events", n);
                }
                Err(_) => break,
            },
        }
    }

    ctx.shutdown().await;
    Ok(())
}
