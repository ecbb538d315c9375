use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use route_features::{
    AppState, build_pipeline,
    config::Config,
    create_router, logging,
    persistence::{self, ROUTE_INFO_FILE, ROUTE_POLYLINE_FILE},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Distance, elevation and fuel-station features for a driving route"
)]
struct Cli {
    /// Directory for a timestamped log file (overrides ROUTE_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the pipeline once and print the route summary as JSON
    Run {
        /// Address or "lat,lng" of the start
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
        /// Intermediate stop, repeatable and kept in order
        #[arg(long = "waypoint")]
        waypoints: Vec<String>,
        /// Append both records as CSV rows under this directory (e.g. datasets/routes)
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
    /// Serve POST /api/route
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let log_dir = cli.log_dir.or_else(|| config.log_dir.clone());
    if let Some(path) = logging::init(log_dir.as_deref())? {
        tracing::info!("writing logs to {}", path.display());
    }

    let pipeline = build_pipeline(&config)?;

    match cli.command {
        Command::Run {
            origin,
            destination,
            waypoints,
            save_dir,
        } => {
            let features = pipeline
                .run_features(&origin, &destination, &waypoints)
                .await?;

            if let Some(dir) = save_dir {
                persistence::append_route_info(&dir.join(ROUTE_INFO_FILE), &features.route_info)?;
                persistence::append_route_polyline(
                    &dir.join(ROUTE_POLYLINE_FILE),
                    &features.route_polyline,
                )?;
            }

            println!("{}", serde_json::to_string_pretty(&features.route_info)?);
        }
        Command::Serve { addr } => {
            let app = create_router(AppState {
                pipeline: Arc::new(pipeline),
            });
            tracing::info!("starting route features service on http://{addr}");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
