//! Connects a client to an in-process echo peer and round-trips a few frames.
//!
//! Run with:
//!   RUST_LOG=debug cargo run -p dispatchwire --example echo-client

use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use dispatchwire::frame::{FrameError, FrameReader, FrameWriter};
use dispatchwire::transport::UnixDomainSocket;
use dispatchwire::{handler_fn, Connection};
use tracing::info;
use tracing_subscriber::EnvFilter;

type PeerError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let sock_dir = std::env::temp_dir().join(format!("dispatchwire-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let listener = UnixDomainSocket::bind(&sock_path)?;

    // Echo peer: one connection, every frame sent straight back.
    let peer = thread::spawn(move || -> Result<(), PeerError> {
        let stream = listener.accept()?;
        if let Some(cred) = stream.peer_credentials() {
            info!(pid = cred.pid, uid = cred.uid, "client connected");
        }
        let mut writer = FrameWriter::new(stream.try_clone()?);
        let mut reader = FrameReader::new(stream);
        loop {
            match reader.read_frame() {
                Ok(frame) => writer.send(&frame.payload)?,
                Err(FrameError::ConnectionClosed) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    });

    let (tx, rx) = mpsc::channel::<Bytes>();
    let conn = Connection::connect(
        &sock_path,
        handler_fn(
            move |_conn, payload| {
                let _ = tx.send(payload);
            },
            |conn| info!(fd = conn.fd(), "session ended"),
        ),
    )?;

    for word in ["alpha", "beta", "gamma"] {
        conn.send(word.as_bytes())?;
        let echoed = rx.recv_timeout(Duration::from_secs(5))?;
        info!(sent = word, echoed = %String::from_utf8_lossy(&echoed), "round trip");
    }

    conn.close();
    match peer.join() {
        Ok(result) => result.map_err(|err| err.to_string())?,
        Err(_) => return Err("echo peer panicked".into()),
    }

    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
