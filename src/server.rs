use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, field, info, instrument, warn};

use crate::codec::FrameCodec;
use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::{self, Frame};
use crate::replication::{self, Role};
use crate::store::{self, Store};
use crate::Error;

pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;

    info!("Redis server listening on {}", listener.local_addr()?);

    // The link to the master stays open for as long as the server runs.
    let (role, _master) = match &config.replicaof {
        Some(master) => {
            let listening_port = listener.local_addr()?.port();
            let conn = replication::handshake(master, listening_port).await?;
            (Role::Slave, Some(conn))
        }
        None => (Role::Master, None),
    };

    serve(listener, role, config).await
}

/// Accepts clients on `listener` until the returned future is dropped, each one handled on its
/// own task against a single shared store. Expired keys are swept in the background meanwhile.
pub async fn serve(listener: TcpListener, role: Role, config: Config) -> Result<(), Error> {
    let store = Store::new();

    info!(%role, "Serving clients");

    tokio::select! {
        res = accept(listener, store.clone(), role, config.max_frame_size) => res,
        _ = store::sweep_expired_keys(store.clone(), config.sweep_interval()) => Ok(()),
    }
}

async fn accept(
    listener: TcpListener,
    store: Store,
    role: Role,
    max_frame_size: usize,
) -> Result<(), Error> {
    loop {
        let (socket, client_address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                // Usually out of file descriptors; give in-flight connections time to close.
                error!("Failed to accept connection: {}", e);
                sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let store = store.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(socket, client_address, store, role, max_frame_size).await
            {
                error!("Connection terminated: {}", e);
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip_all,
    fields(connection_id = field::Empty, client_address = %client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    role: Role,
    max_frame_size: usize,
) -> Result<(), Error> {
    let mut conn = Connection::with_codec(stream, FrameCodec::new(max_frame_size));

    tracing::Span::current().record("connection_id", field::display(conn.id));

    loop {
        let frame = match conn.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(frame::Error::Io(e)) => return Err(e.into()),
            Err(e) => {
                // The stream can't be resynchronized after a malformed frame.
                warn!("Closing connection after protocol error: {}", e);
                conn.write_frame(Frame::Error(format!("ERR Protocol error: {}", e)))
                    .await?;
                break;
            }
        };

        debug!("Received frame from client: {}", frame);

        if matches!(&frame, Frame::Array(parts) if parts.is_empty()) {
            continue;
        }

        let res = match Command::try_from(frame) {
            Ok(cmd) => cmd.exec(store.clone(), role),
            Err(err) => {
                debug!("Rejected command: {}", err);
                Frame::from(&err)
            }
        };

        debug!("Sending response to client: {}", res);
        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}
