use clap::Parser;
use http::header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use http::Method;
use std::path::PathBuf;
use tonic::transport::Server;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wayfarer_daemon::config::{read_config, ConfigOverrides, DaemonConfig};
use wayfarer_daemon::notification::ConnectionRegistry;
use wayfarer_daemon::server::proto::wayfarer_server::WayfarerServer;
use wayfarer_daemon::server::WayfarerService;
use wayfarer_daemon::user::SessionKeys;
use wayfarer_daemon::Database;

/// Wayfarer Daemon - collaborative trip planner backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the server to [default: 127.0.0.1:50061]
    #[arg(short, long, env = "WAYFARER_ADDR")]
    addr: Option<String>,

    /// Path of the SQLite database file
    #[arg(long, env = "WAYFARER_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Secret used to sign session tokens
    #[arg(long, env = "WAYFARER_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Session token lifetime in hours [default: 168]
    #[arg(long, env = "WAYFARER_TOKEN_TTL_HOURS")]
    token_ttl_hours: Option<i64>,

    /// Comma-separated list of allowed CORS origins.
    /// Use "*" to allow all origins (not recommended for production).
    #[arg(long, env = "WAYFARER_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Optional JSON config file; command line and environment win over it
    #[arg(short, long, env = "WAYFARER_CONFIG")]
    config: Option<PathBuf>,
}

// Include the file descriptor set for gRPC reflection
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("wayfarer_descriptor");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => read_config(path).await?.unwrap_or_default(),
        None => Default::default(),
    };
    let overrides = ConfigOverrides {
        addr: args.addr,
        db_path: args.db_path,
        jwt_secret: args.jwt_secret,
        token_ttl_hours: args.token_ttl_hours,
        cors_origins: args.cors_origins,
    };
    let config = DaemonConfig::resolve(overrides, file_config)?;

    let allow_all_origins = config.allows_all_origins();
    info!(
        "CORS origins: {}",
        if allow_all_origins {
            "*".to_string()
        } else {
            config.cors_origins.join(", ")
        }
    );

    let db = Database::open_at(&config.db_path)?;
    info!("Using database {}", config.db_path.display());

    let keys = SessionKeys::new(
        &config.jwt_secret,
        chrono::Duration::hours(config.token_ttl_hours),
    );
    let service = WayfarerService::new(db, keys, ConnectionRegistry::new());

    // Create reflection service
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    // Configure CORS for gRPC-Web
    let cors_origins = config.cors_origins.clone();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            if allow_all_origins {
                return true;
            }

            match origin.to_str() {
                Ok(origin_str) => cors_origins
                    .iter()
                    .any(|allowed| origin_str.starts_with(allowed)),
                Err(_) => false,
            }
        }))
        .allow_credentials(!allow_all_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            COOKIE,
            HeaderName::from_static("x-grpc-web"),
            HeaderName::from_static("x-user-agent"),
            HeaderName::from_static("grpc-timeout"),
        ])
        .expose_headers([
            HeaderName::from_static("grpc-status"),
            HeaderName::from_static("grpc-message"),
            HeaderName::from_static("grpc-status-details-bin"),
        ]);

    info!("Starting Wayfarer daemon on {} (gRPC + gRPC-Web)", config.addr);

    Server::builder()
        .accept_http1(true) // Required for gRPC-Web
        .layer(cors)
        .layer(tonic_web::GrpcWebLayer::new())
        .add_service(reflection_service)
        .add_service(WayfarerServer::new(service))
        .serve_with_shutdown(config.addr, async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal, stopping server...");
        })
        .await?;

    info!("Wayfarer daemon stopped");
    Ok(())
}
