use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stubsmith_http::admin::serve_admin;
use stubsmith_http::config::{LogFormat, Settings};
use stubsmith_http::fs::{FileSystem, OsFileSystem};
use stubsmith_http::matching::RegexCache;
use stubsmith_http::scanner::{ConfigScanner, FileScanner};
use stubsmith_http::server::serve_stubs;
use stubsmith_http::{logging, ReloadSource, Reloader, ReqwestTransport, StubService, YamlParser};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stubsmith", version, about = "Programmable HTTP stub server")]
struct Args {
    /// YAML stub configuration
    #[arg(short, long, env = "STUBSMITH_CONFIG")]
    config: PathBuf,
    #[arg(long, env = "STUBSMITH_HOST", default_value = "0.0.0.0")]
    host: String,
    #[arg(short, long, env = "STUBSMITH_PORT", default_value = "8882")]
    port: u16,
    #[arg(short, long, env = "STUBSMITH_ADMIN_PORT", default_value = "8889")]
    admin_port: u16,
    #[arg(long)]
    disable_admin: bool,
    /// Reload when the configuration or a referenced file changes
    #[arg(short, long, env = "STUBSMITH_WATCH")]
    watch: bool,
    #[arg(long, default_value = "100")]
    watch_interval_ms: u64,
    #[arg(long, default_value = "60")]
    cache_ttl_secs: u64,
    /// Match cache capacity; 0 disables caching
    #[arg(long, default_value = "500")]
    cache_capacity: usize,
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn into_settings(self) -> Settings {
        let mut settings = Settings::new(self.config);
        settings.host = self.host;
        settings.port = self.port;
        settings.admin_port = self.admin_port;
        settings.admin_enabled = !self.disable_admin;
        settings.watch = self.watch;
        settings.scanner.interval = Duration::from_millis(self.watch_interval_ms.max(1));
        settings.cache.ttl_seconds = self.cache_ttl_secs;
        settings.cache.max_entries = self.cache_capacity;
        settings.log_format = self.log_format;
        settings
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Args::parse().into_settings();
    logging::init(settings.log_format);

    let fs: Arc<dyn FileSystem> = Arc::new(OsFileSystem);
    let regexes = Arc::new(RegexCache::new());
    let transport = Arc::new(ReqwestTransport::new().context("building HTTP client")?);
    let service = Arc::new(StubService::new(
        settings.cache.clone(),
        Arc::clone(&regexes),
        transport,
    ));
    let parser = Arc::new(YamlParser::new(Arc::clone(&fs), regexes));
    let reloader = Arc::new(Reloader::new(
        settings.config_path.clone(),
        parser,
        fs,
        Arc::clone(&service),
    ));

    let stubs = reloader
        .reload(ReloadSource::Config)
        .with_context(|| format!("loading {}", settings.config_path.display()))?;
    info!("Loaded {} stubs from {}", stubs, settings.config_path.display());

    let token = CancellationToken::new();

    let stub_addr = settings.stub_addr()?;
    let listener = TcpListener::bind(stub_addr)
        .await
        .with_context(|| format!("binding stub listener on {stub_addr}"))?;
    let mut servers = vec![tokio::spawn(serve_stubs(
        listener,
        Arc::clone(&service),
        token.child_token(),
    ))];

    if settings.admin_enabled {
        let admin_addr = settings.admin_addr()?;
        let listener = TcpListener::bind(admin_addr)
            .await
            .with_context(|| format!("binding admin listener on {admin_addr}"))?;
        servers.push(tokio::spawn(serve_admin(
            listener,
            Arc::clone(&reloader),
            token.child_token(),
        )));
    }

    let scanners = if settings.watch {
        vec![
            ConfigScanner::new(Arc::clone(&reloader)).spawn(&settings.scanner, token.child_token()),
            FileScanner::new(Arc::clone(&reloader)).spawn(&settings.scanner, token.child_token()),
        ]
    } else {
        Vec::new()
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");

    token.cancel();
    join_all(scanners.into_iter().map(|scanner| scanner.stop())).await;
    join_all(servers).await;
    info!("Stopped");
    Ok(())
}
