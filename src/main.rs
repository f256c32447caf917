use simple_mcp::{
    config::{Config, TransportKind},
    default_registry, logging,
    mcp::{listener::Listener, session::Session},
    transport::stream::FramedStream,
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let state = AppState::new(default_registry(&config.context_file)?);

    match config.transport {
        TransportKind::Tcp => {
            let listener = Listener::bind(config.listen_addr(), state).await?;
            info!(
                bind_addr = %listener.local_addr()?,
                context_file = %config.context_file.display(),
                "server listening"
            );
            listener.run().await;
        }
        TransportKind::Stdio => {
            info!(context_file = %config.context_file.display(), "serving over stdio");
            Session::new(state, FramedStream::stdio(), "stdio").run().await?;
        }
    }

    Ok(())
}
