//! Session lifecycle manager: TCP accept loop and per-connection tasks
//!
//! The server binds a listener and spawns one task per accepted connection.
//! A connection's task performs the registration handshake (the first line
//! is the raw username), then services the session: inbound lines become
//! registry/round-controller calls, the outbound channel is drained into the
//! socket, and the player is unregistered when either side goes away. A
//! running game is driven by its own task ([`crate::round::run_game`]);
//! shutdown is a cooperative watch signal observed by every loop.

use crate::registry::{Outbound, PlayerHandle, SessionState};
use crate::round::{self, StartError};
use log::{error, info, warn};
use shared::{ClientMessage, Question, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};

/// The trivia server: owns the listener, the shared session state and the
/// shutdown signal.
pub struct QuizServer {
    listener: TcpListener,
    state: Arc<Mutex<SessionState>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Cloneable control handle for operator surfaces and tests: starts games
/// and requests shutdown without owning the listener.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<Mutex<SessionState>>,
    shutdown_tx: watch::Sender<bool>,
}

impl QuizServer {
    /// Binds the listening socket. The question sequence is fixed for the
    /// lifetime of the process.
    pub async fn new(
        addr: &str,
        questions: Vec<Question>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(QuizServer {
            listener,
            state: Arc::new(Mutex::new(SessionState::new(questions))),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: Arc::clone(&self.state),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Accept loop. Runs until the shutdown signal is raised, spawning one
    /// task per connection; dropping out releases the listening socket.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let mut shutdown_rx = self.shutdown_rx.clone();
        info!("Server has started listening");

        loop {
            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((stream, addr)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            handle_connection(stream, addr, state).await;
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = shutdown_rx.changed() => {
                    info!("Server stopped accepting connections");
                    break;
                }
            }
        }

        Ok(())
    }
}

impl ServerHandle {
    /// Starts a game on its own task. Fails with a user-facing reason if a
    /// game is already running or ending, fewer than two players are
    /// connected, or no questions are loaded; nothing is mutated on failure.
    pub async fn start_game(&self) -> Result<(), StartError> {
        {
            let mut session = self.state.lock().await;
            session.begin_game()?;
        }
        let state = Arc::clone(&self.state);
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            round::run_game(state, shutdown_rx).await;
        });
        Ok(())
    }

    /// Cooperative shutdown: stops the accept loop, waits for a running game
    /// to finish with its shutdown reason, then drops any idle sessions.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        // The game task observes the signal within one polling interval.
        loop {
            let session = self.state.lock().await;
            if !session.is_running() {
                session.close_all();
                return;
            }
            drop(session);
            tokio::time::sleep(round::ANSWER_POLL_INTERVAL).await;
        }
    }

    /// Shared session state, for tests and the operator surface.
    pub fn state(&self) -> Arc<Mutex<SessionState>> {
        Arc::clone(&self.state)
    }
}

/// Services one client connection for its lifetime.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, state: Arc<Mutex<SessionState>>) {
    info!("Connection from {}", addr);
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // Registration handshake: the very first line is the raw username.
    let first_line = match lines.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) => return,
        Err(e) => {
            warn!("Handshake read from {} failed: {}", addr, e);
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let username = {
        let mut session = state.lock().await;
        match session.register(&first_line, PlayerHandle::new(outbound_tx)) {
            Ok(username) => username,
            Err(e) => {
                warn!("Registration from {} rejected: {}", addr, e);
                send_line(&mut write_half, &e.to_message().to_line()).await;
                return; // rejection closes the connection
            }
        }
    };
    {
        // The registration broadcast already queued the scoreboard; the
        // welcome line follows it on the same channel.
        let session = state.lock().await;
        session.send_to(&username, &ServerMessage::Welcome {
            username: username.clone(),
        });
    }

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match ClientMessage::parse(&line) {
                    Some(ClientMessage::Answer { label }) => {
                        let mut session = state.lock().await;
                        if let Err(e) = session.submit_answer(&username, &label) {
                            session.send_to(&username, &e.to_message());
                        }
                    }
                    None => {
                        // Anything that is not an answer is echoed back.
                        let session = state.lock().await;
                        session.send_to(&username, &ServerMessage::Announcement { text: line });
                    }
                },
                Ok(None) => break, // peer closed
                Err(e) => {
                    let session = state.lock().await;
                    if !session.is_ending() {
                        warn!("{} connection error: {}", username, e);
                    }
                    break;
                }
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Line(line)) => {
                    if !send_line(&mut write_half, &line).await {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write_half.shutdown().await;
                    break;
                }
            },
        }
    }

    let mut session = state.lock().await;
    session.unregister(&username);
}

/// Writes one newline-terminated line. Returns false on failure; the caller
/// closes the session, the write is never retried.
async fn send_line(write_half: &mut OwnedWriteHalf, line: &str) -> bool {
    let framed = format!("{}\n", line);
    if let Err(e) = write_half.write_all(framed.as_bytes()).await {
        warn!("Failed to send line: {}", e);
        return false;
    }
    true
}
