use std::path::PathBuf;

use actix_web::{
    dev::Server,
    get, middleware,
    web::{self, Data},
    App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use tracing::*;

use controller::util::{config::OperatorConfig, telemetry};
use controller::State;

/// Keeps a ServiceAccount in place for every Workload
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long, env = "WORKLOAD_OPERATOR_CONFIG")]
    config: Option<PathBuf>,
}

#[get("/metrics")]
async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    match encoder.encode(&metrics, &mut buffer) {
        Ok(()) => HttpResponse::Ok().content_type(encoder.format_type()).body(buffer),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

async fn healthz(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

async fn readyz(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("ready")
}

async fn serve(server: Option<Server>) -> std::io::Result<()> {
    match server {
        Some(server) => server.await,
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = OperatorConfig::load(args.config.as_deref())?;
    telemetry::init(config.logging.json)?;
    info!(config = %serde_json::to_string(&config)?, "starting workload operator");

    // Initialize Kubernetes controller state
    let state = State::new(&config);
    let workload_controller = controller::run(state.clone(), config.clone());

    let metrics_server = match config.metrics_address() {
        Some(address) => {
            let state = state.clone();
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(Data::new(state.clone()))
                    .wrap(middleware::Logger::default().exclude("/metrics"))
                    .service(index)
                    .service(metrics)
            })
            .bind(address)?
            .shutdown_timeout(5);
            info!(%address, "serving metrics");
            Some(server.run())
        }
        None => {
            info!("metrics server disabled");
            None
        }
    };

    let probe_server = match config.health_probe_address() {
        Some(address) => {
            let liveness = config.liveness_path();
            let readiness = config.readiness_path();
            info!(%address, %liveness, %readiness, "serving health probes");
            let server = HttpServer::new(move || {
                App::new()
                    .wrap(middleware::Logger::default().exclude(&liveness).exclude(&readiness))
                    .route(&liveness, web::get().to(healthz))
                    .route(&readiness, web::get().to(readyz))
            })
            .bind(address)?
            .shutdown_timeout(5);
            Some(server.run())
        }
        None => {
            info!("health probe server disabled");
            None
        }
    };

    // All three implement graceful shutdown, so poll until every one is done
    let (controller_result, metrics_result, probe_result) =
        tokio::join!(workload_controller, serve(metrics_server), serve(probe_server));
    controller_result?;
    metrics_result?;
    probe_result?;
    Ok(())
}
