pub mod api;
pub mod websocket;

use crate::cli::Args;
use crate::session::ChatService;
use log::debug;
use std::error::Error;
use std::sync::Arc;

/// rustls is built with both `ring` and `aws-lc-rs`, so it cannot pick a process-wide
/// provider on its own. Installs `ring` unless another provider is already in place.
pub(crate) fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }
}

pub struct Server {
    addr: String,
    service: Arc<ChatService>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, service: Arc<ChatService>, args: Args) -> Self {
        Self { addr, service, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.args.http_port {
            self.start_http_server(http_port).await?;
        }

        self.start_ws_server().await?;

        Ok(())
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(http_port, self.service.clone(), self.args.clone()).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(&self.addr, self.service.clone(), self.args.clone()).await
    }
}
