use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::config::{BusConfig, TimingConfig};
use crate::error::{constants, OwnError, Result};
use crate::transport::{Connector, FrameChannel};

/// Connects to a BUS gateway over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
        }
    }

    pub fn from_config(bus: &BusConfig, timing: &TimingConfig) -> Self {
        Self::new(bus.host.clone(), bus.port, timing.connect_timeout)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    #[instrument(skip(self), fields(host = %self.host, port = self.port))]
    async fn connect(&self) -> Result<FrameChannel> {
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| OwnError::Transport(constants::ERR_CONNECT_TIMEOUT.into()))??;

        stream.set_nodelay(true)?;
        debug!("TCP connection established");
        Ok(FrameChannel::new(stream))
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}
