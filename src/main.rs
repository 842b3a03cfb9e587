use mail2taiga::config::Config;
use mail2taiga::mailbox::ImapSession;
use mail2taiga::poller;
use mail2taiga::taiga::TaigaClient;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Take environment variables from a .env file, if present
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing; DEBUG=true raises the default level
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    // Scratch directories are created under the working directory
    let base_dir = std::env::current_dir()?;

    let api = TaigaClient::auth(&config.taiga_host, &config.taiga_user, &config.taiga_pwd).await?;
    info!(host = %config.taiga_host, "Authenticated against Taiga");

    let (host, user, pwd) = (
        config.imap_host.clone(),
        config.imap_user.clone(),
        config.imap_pwd.clone(),
    );
    let session =
        tokio::task::spawn_blocking(move || ImapSession::connect(&host, &user, &pwd)).await??;
    info!(host = %config.imap_host, "Mailbox connected, INBOX selected");

    let session = poller::run_once(&config, &api, session, &base_dir).await?;

    tokio::task::spawn_blocking(move || {
        let mut session = session;
        session.logout()
    })
    .await??;

    Ok(())
}
