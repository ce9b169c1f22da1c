//! Echo peer written with tokio and `WireCodec`, exercised by a blocking client.
//!
//! Run with:
//!   RUST_LOG=debug cargo run -p dispatchwire --example async-echo-peer --features async

use std::fs;
use std::sync::mpsc;
use std::time::Duration;

use bytes::Bytes;
use dispatchwire::frame::WireCodec;
use dispatchwire::{handler_fn, Connection, ConnectionConfig, CredentialMode};
use futures_util::{SinkExt, StreamExt};
use tokio::net::UnixListener;
use tokio_util::codec::Framed;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type ClientError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let sock_dir =
        std::env::temp_dir().join(format!("dispatchwire-async-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");
    let _ = fs::remove_file(&sock_path);

    let listener = UnixListener::bind(&sock_path)?;
    let peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let mut framed = Framed::new(stream, WireCodec::default());
        while let Some(frame) = framed.next().await {
            match frame {
                Ok(payload) => framed.send(payload).await?,
                Err(err) => {
                    warn!(error = %err, "peer read failed");
                    break;
                }
            }
        }
        Ok::<_, dispatchwire::frame::FrameError>(())
    });

    // Connection is blocking; keep it off the runtime threads.
    let client_path = sock_path.clone();
    let client = tokio::task::spawn_blocking(move || -> Result<(), ClientError> {
        let (tx, rx) = mpsc::channel::<Bytes>();
        let config = ConnectionConfig {
            credentials: CredentialMode::FirstSend,
            ..ConnectionConfig::default()
        };
        let conn = Connection::connect_with_config(
            &client_path,
            handler_fn(
                move |_conn, payload| {
                    let _ = tx.send(payload);
                },
                |_conn| info!("session ended"),
            ),
            config,
        )?;
        for i in 0..3 {
            let msg = format!("message {i}");
            conn.send(msg.as_bytes())?;
            let echoed = rx.recv_timeout(Duration::from_secs(5))?;
            info!(len = echoed.len(), "echo received");
        }
        conn.close();
        Ok(())
    });

    if let Err(err) = client.await? {
        return Err(err.to_string().into());
    }
    peer.await??;

    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
