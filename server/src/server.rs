//! RESP TCP server loop on the tokio runtime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::connection::Connection;
use crate::context::AppContext;
use crate::metrics::{CONNECTIONS_ACCEPTED, CONNECTIONS_ACTIVE};

/// Build the runtime and serve until the shutdown flag flips.
pub fn run(
    config: &Config,
    ctx: Arc<AppContext>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()?;

    let listen = config.server.listen;
    runtime.block_on(async move { serve(listen, ctx, shutdown).await })
}

async fn serve(
    address: SocketAddr,
    ctx: Arc<AppContext>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(address).await?;
    tracing::info!(address = %address, "resp listener ready");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("accept loop stopping");
            return Ok(());
        }

        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _peer)) => {
                        CONNECTIONS_ACCEPTED.increment();
                        CONNECTIONS_ACTIVE.increment();

                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, ctx).await {
                                if !is_connection_reset(&e) {
                                    tracing::warn!(error = %e, "connection error");
                                }
                            }
                            CONNECTIONS_ACTIVE.decrement();
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept error");
                    }
                }
            }
            // Periodic wakeup so the shutdown flag is observed promptly.
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }
}

async fn handle_connection(mut stream: TcpStream, ctx: Arc<AppContext>) -> std::io::Result<()> {
    let mut conn = Connection::new();
    let mut temp_buf = vec![0u8; 64 * 1024];

    loop {
        stream.readable().await?;

        match stream.try_read(&mut temp_buf) {
            Ok(0) => return Ok(()), // client closed
            Ok(n) => {
                conn.append_recv_data(&temp_buf[..n]);
                conn.process(&ctx);

                if conn.has_pending_write() {
                    let data = conn.pending_write_data().to_vec();
                    stream.write_all(&data).await?;
                    conn.advance_write(data.len());
                }

                if conn.should_close() {
                    return Ok(());
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
}

fn is_connection_reset(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof
    )
}
