mod chat;
mod config;

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use jukebox_auth::cookies::cookie_header;
use jukebox_auth::{AuthClient, Session};
use jukebox_gateway::{ChannelOptions, RealtimeChannel};
use jukebox_store::{IdentityChange, Store};
use jukebox_types::events::stored_message_to_websocket_message;

use chat::{Command, render_details, render_frame};
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jukebox=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let store = Arc::new(
        Store::open(&config.store_path)
            .with_context(|| format!("opening {}", config.store_path.display()))?,
    );
    tokio::spawn(watch_identity(store.subscribe()));

    let client = AuthClient::with_timeout(&config.api_url, store.clone(), config.http_timeout)?;
    let session = Session::new(client).purge_on_failure(config.purge_on_failure);

    if !session.auto_login().await {
        let Some((username, password)) = &config.credentials else {
            bail!("not signed in: no stored session and JUKEBOX_USERNAME/JUKEBOX_PASSWORD are not set");
        };
        session
            .client()
            .login_with_password(username, password)
            .await
            .context("password login failed")?;
    }
    if let Some(identity) = store.identity()? {
        info!("Signed in as {} ({})", identity.username, identity.user_id);
    }

    let mut channel = RealtimeChannel::with_options(ChannelOptions {
        token: config.ws_token.clone(),
        cookie: cookie_header(&store)?,
    });
    let (frames_tx, mut frames) = mpsc::unbounded_channel();
    channel
        .connect(&config.ws_url, move |frame| {
            let _ = frames_tx.send(frame);
        })
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if let Some(line) = render_frame(&frame) {
                        println!("{}", line);
                    }
                }
                None => {
                    warn!("Chat channel closed");
                    break;
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Command::Empty => {}
                    Command::Say(text) => {
                        channel.send_content(text);
                    }
                    Command::Show(id) => show_message(&session, id).await,
                    Command::Logout => {
                        if !session.full_logout().await {
                            warn!("Server did not confirm the logout");
                        }
                        break;
                    }
                    Command::Quit => break,
                    Command::Unknown(input) => println!("unknown command: {}", input),
                }
            }
        }
    }

    channel.disconnect().await;
    Ok(())
}

async fn show_message(session: &Session, id: i64) {
    let client = session.client();
    let message = match client.fetch_message(id).await {
        Ok(message) => message,
        Err(e) => {
            error!("Failed to fetch message {}: {}", id, e);
            return;
        }
    };
    let sender = match client.fetch_user(message.sender_id).await {
        Ok(sender) => sender,
        Err(e) => {
            error!("Failed to fetch sender {} of message {}: {}", message.sender_id, id, e);
            return;
        }
    };
    match stored_message_to_websocket_message(&message, &sender) {
        Ok(display) => println!("{}", render_details(&display)),
        Err(e) => error!("Message {} is malformed: {}", id, e),
    }
}

async fn watch_identity(mut changes: broadcast::Receiver<IdentityChange>) {
    loop {
        match changes.recv().await {
            Ok(IdentityChange::Set(identity)) => debug!("Identity set to {}", identity.username),
            Ok(IdentityChange::Cleared) => info!("Signed out"),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("Missed {} identity changes", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
