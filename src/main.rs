use monitor_datasource::{api::server, config::Config, logging, metrics};

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logger() {
        eprintln!("{}", e);
    }

    metrics::init_metrics();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::start_server(config).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
