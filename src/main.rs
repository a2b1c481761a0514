use jsonrpc_dispatch::{build_app, config::Config, logging, procedures, AppState, Dispatcher};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let mut dispatcher = Dispatcher::new(config.initial_capacity)?;
    procedures::register_samples(&mut dispatcher)?;
    let methods = dispatcher.method_count();

    let bind_socket = config.bind_socket()?;
    let app = build_app(AppState::new(dispatcher));
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        methods,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
