use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value as JsonValue};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    time,
};
use tracing::{debug, warn};

use crate::{error::ProtocolError, negotiation::SessionEvent, session::Session};

/// How often an idle connection gets a NOP so stateful middleboxes keep it
/// alive.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

const READ_BUFFER_SIZE: usize = 4096;

/// Outbound work the game sends to a session's driver.
#[derive(Debug)]
pub enum SessionAction {
    Text(String),
    Prompt(String),
    Oob { command: String, args: Vec<JsonValue>, kwargs: Map<String, JsonValue> },
    ServerStatus(Vec<(Bytes, Bytes)>),
    Close,
}

/// Runs one session over a transport until the peer disconnects, the game
/// closes it, or a fatal protocol error occurs.
///
/// All session access is serialized through this task's `select!` loop, so
/// reads, game actions, and the keepalive timer can never interleave inside
/// the compression streams. Decoded events go to `events`; the game drives
/// output through `actions`.
pub async fn drive<T>(
    mut io: T,
    mut session: Session,
    events: mpsc::Sender<SessionEvent>,
    mut actions: mpsc::Receiver<SessionAction>,
) -> Result<(), ProtocolError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    for event in session.start()? {
        let _ = events.send(event).await;
    }
    flush(&mut io, &mut session).await?;

    let mut interval = time::interval(KEEPALIVE_INTERVAL);
    // The first tick completes immediately; skip it.
    interval.tick().await;

    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            read = io.read(&mut buffer) => {
                let count = read?;

                if count == 0 {
                    debug!("peer closed the connection");
                    return shutdown(&mut io, &mut session).await;
                }

                match session.receive(&buffer[..count]) {
                    Ok(decoded) => {
                        for event in decoded {
                            if events.send(event).await.is_err() {
                                debug!("event receiver dropped, closing session");
                                return shutdown(&mut io, &mut session).await;
                            }
                        }
                    }
                    Err(error) if error.is_fatal() => {
                        warn!(%error, "fatal stream error, closing session");
                        shutdown(&mut io, &mut session).await?;
                        return Err(error);
                    }
                    Err(error) => warn!(%error, "discarding unprocessable input"),
                }

                flush(&mut io, &mut session).await?;
            }
            action = actions.recv() => {
                match action {
                    Some(SessionAction::Text(text)) => session.send_text(&text)?,
                    Some(SessionAction::Prompt(prompt)) => session.send_prompt(&prompt)?,
                    Some(SessionAction::Oob { command, args, kwargs }) => {
                        session.send_oob(&command, &args, &kwargs)?;
                    }
                    Some(SessionAction::ServerStatus(pairs)) => {
                        session.send_server_status(pairs)?;
                    }
                    Some(SessionAction::Close) | None => {
                        return shutdown(&mut io, &mut session).await;
                    }
                }

                flush(&mut io, &mut session).await?;
            }
            _ = interval.tick() => {
                session.keepalive();
                flush(&mut io, &mut session).await?;
            }
        }
    }
}

async fn shutdown<T>(io: &mut T, session: &mut Session) -> Result<(), ProtocolError>
where
    T: AsyncWrite + Unpin,
{
    session.close()?;
    flush(io, session).await?;
    io.shutdown().await?;
    Ok(())
}

async fn flush<T>(io: &mut T, session: &mut Session) -> Result<(), ProtocolError>
where
    T: AsyncWrite + Unpin,
{
    let queued = session.drain_outbound();

    if !queued.is_empty() {
        io.write_all(&queued).await?;
        io.flush().await?;
    }

    Ok(())
}
