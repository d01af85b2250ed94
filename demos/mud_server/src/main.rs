use std::{error::Error, net::SocketAddr};

use mudwire::{
    driver::{self, SessionAction},
    negotiation::SessionEvent,
    session::Session,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let addr = SocketAddr::from(([127, 0, 0, 1], 5000));
    let listener = TcpListener::bind(addr).await?;

    println!("telnet server started on: {}", addr);

    loop {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Err(e) = handler(stream).await {
                    eprintln!("error: {}", e);
                }
            });
        }
    }
}

async fn handler(stream: TcpStream) -> Result<(), Box<dyn Error>> {
    // The driver owns the session and the socket; we talk to it over a pair
    // of channels.
    let (event_tx, mut events) = mpsc::channel(32);
    let (actions, action_rx) = mpsc::channel(32);

    let session = Session::new();
    let task = tokio::spawn(driver::drive(stream, session, event_tx, action_rx));

    // Let's send a friendly welcome message to anyone who connects!
    actions
        .send(SessionAction::Text(
            "\nWelcome to the mudwire demo server!\nYou can exit by typing \"quit\"."
                .to_string(),
        ))
        .await?;
    actions.send(SessionAction::Prompt("> ".to_string())).await?;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Line(line) => {
                // We can check for commands...
                if line == "quit" {
                    break;
                }

                // ...or just echo back whatever the user has said!
                actions.send(SessionAction::Text(format!("You said: {}", line))).await?;
                actions.send(SessionAction::Prompt("> ".to_string())).await?;
            }
            SessionEvent::HandshakeComplete(caps) => {
                actions
                    .send(SessionAction::Text(format!(
                        "Detected client {} ({}x{}).",
                        caps.client_name, caps.screen_width, caps.screen_height
                    )))
                    .await?;
            }
            // A real game would route these to its command dispatcher.
            SessionEvent::Command { kind, .. } => {
                actions.send(SessionAction::Text(format!("(oob) {}", kind))).await?;
            }
        }
    }

    // When the above loop breaks we'll send a goodbye message before closing.
    actions.send(SessionAction::Text("Goodbye!".to_string())).await?;
    actions.send(SessionAction::Close).await?;
    task.await??;

    Ok(())
}
