use crate::cli::Args;
use crate::image::ImageUpload;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::{ ChatService, Session };
use crate::stream::{ Snapshot, SnapshotSink };

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use log::{ debug, info, warn, error };

/// Uploads travel base64-encoded inside JSON, so frames are allowed to be fairly large.
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

type WsSender<S> = SplitSink<WebSocketStream<S>, Message>;

fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    super::install_crypto_provider();
    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

pub async fn start_ws_server(
    addr: &str,
    service: Arc<ChatService>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        None
    };

    let listener = TcpListener::bind(addr).await?;
    let protocol = if tls_acceptor.is_some() { "wss" } else { "ws" };
    info!("{} server listening on: {}", protocol.to_uppercase(), addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);
        let service = Arc::clone(&service);
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, service).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, service).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    service: Arc<ChatService>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    match accept_async(stream).await {
        Ok(ws) => {
            handle_connection(peer, ws, service).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send_message<S>(tx: &mut WsSender<S>, msg: &ServerMessage) -> bool
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = match serde_json::to_string(msg) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return false;
        }
    };
    tx.send(Message::Text(json)).await.is_ok()
}

/// Forwards streaming snapshots to the client as `partial` messages.
struct PartialSink<'a, S> where S: AsyncRead + AsyncWrite + Unpin {
    peer: SocketAddr,
    tx: &'a mut WsSender<S>,
    closed: bool,
}

#[async_trait]
impl<'a, S> SnapshotSink for PartialSink<'a, S> where S: AsyncRead + AsyncWrite + Unpin + Send {
    async fn publish(&mut self, snapshot: &Snapshot) {
        if self.closed {
            return;
        }
        let msg = ServerMessage::Partial {
            content: snapshot.display(),
            in_progress: snapshot.in_progress,
        };
        if !send_message(&mut *self.tx, &msg).await {
            warn!("Client {} went away mid-stream; finishing turn without live updates", self.peer);
            self.closed = true;
        }
    }
}

fn error_message(err: &crate::error::ChatError) -> ServerMessage {
    ServerMessage::Error {
        message: err.user_message(),
        remedy: err.remedy().map(str::to_owned),
    }
}

/// Handles one parsed client message. Returns false once the client can no longer be reached.
async fn dispatch<S>(
    peer: SocketAddr,
    msg: ClientMessage,
    session: &mut Session,
    service: &ChatService,
    tx: &mut WsSender<S>
) -> bool
    where S: AsyncRead + AsyncWrite + Unpin + Send
{
    match msg {
        ClientMessage::Chat { content, model } => {
            if let Some(model) = model {
                if let Err(e) = session.select_model(&model) {
                    return send_message(tx, &error_message(&e)).await;
                }
            }
            if !send_message(tx, &ServerMessage::Processing).await {
                error!("Error sending processing status to {}", peer);
                return false;
            }

            let result = {
                let mut sink = PartialSink { peer, tx: &mut *tx, closed: false };
                session.submit(service, &content, &mut sink).await
            };

            let reply = match result {
                Ok(answer) =>
                    ServerMessage::Response {
                        content: answer,
                        timestamp: Utc::now().timestamp(),
                    },
                Err(e) => {
                    debug!("Reporting failed turn to {} (session {})", peer, session.id());
                    error_message(&e)
                }
            };
            send_message(tx, &reply).await
        }
        ClientMessage::UploadImage { filename, data } => {
            match ImageUpload::from_base64(filename, &data) {
                Ok(upload) => {
                    let reply = ServerMessage::ImageAttached {
                        filename: upload.filename().to_string(),
                        size: upload.size(),
                    };
                    session.attach_image(upload);
                    send_message(tx, &reply).await
                }
                Err(e) => {
                    warn!("Rejected upload from {}: {}", peer, e);
                    send_message(tx, &error_message(&e)).await
                }
            }
        }
        ClientMessage::ClearImage => {
            session.clear_image();
            send_message(tx, &ServerMessage::ImageCleared).await
        }
        ClientMessage::SelectModel { model } => {
            match session.select_model(&model) {
                Ok(()) =>
                    send_message(tx, &(ServerMessage::ModelSelected {
                        model: session.model().to_string(),
                    })).await,
                Err(e) => send_message(tx, &error_message(&e)).await,
            }
        }
        ClientMessage::History => {
            send_message(tx, &(ServerMessage::History { messages: session.transcript() })).await
        }
        ClientMessage::ListModels => {
            let models = service.catalog().list_vision_models().await;
            send_message(tx, &(ServerMessage::Models { models })).await
        }
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    service: Arc<ChatService>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send
{
    info!("New WebSocket connection: {}", peer);

    let (mut tx, mut rx) = websocket.split();
    let mut session = service.new_session();
    info!("Assigned session {} to {}", session.id(), peer);

    let hello = ServerMessage::Session {
        id: session.id().to_string(),
        model: session.model().to_string(),
    };
    if !send_message(&mut tx, &hello).await {
        error!("Failed to greet {}", peer);
        return;
    }

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error {
                        message: "Message too large".to_string(),
                        remedy: None,
                    };
                    if !send_message(&mut tx, &error_msg).await {
                        error!("Failed to send size limit error to {}", peer);
                    }
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if !dispatch(peer, client_msg, &mut session, &service, &mut tx).await {
                                    error!("Error sending message to {}", peer);
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                let error_msg = ServerMessage::Error {
                                    message: format!("Failed to parse message: {}", e),
                                    remedy: None,
                                };
                                if !send_message(&mut tx, &error_msg).await {
                                    error!("Error sending parse error to {}", peer);
                                    break;
                                }
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }
    info!(
        "WebSocket connection closed for {} (session {}, {} messages discarded)",
        peer,
        session.id(),
        session.store().len()
    );
}
