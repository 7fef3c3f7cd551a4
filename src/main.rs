use clap::Parser;
use custgate::cli::{Args, build_config, init_logging, load_jwt_secret, open_database};
use custgate::{create_app, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let config = build_config(&args, db, jwt_secret);
    let app = create_app(&config).unwrap_or_else(|e| {
        error!(error = %e, "Failed to build application");
        std::process::exit(1);
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    info!(
        address = %local_addr,
        issuer = %config.issuer,
        token_ttl_secs = config.token_ttl_secs,
        "Listening"
    );

    if let Err(e) = run_server(app, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
