use async_trait::async_trait;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, instrument};

use crate::config::UsbConfig;
use crate::error::Result;
use crate::transport::{Connector, FrameChannel};

/// Connects to a USB ZigBee gateway through its serial port (8N1, no flow control).
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port_name: String,
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
        }
    }

    pub fn from_config(usb: &UsbConfig) -> Self {
        Self::new(usb.port_name.clone(), usb.baud_rate)
    }
}

#[async_trait]
impl Connector for SerialConnector {
    #[instrument(skip(self), fields(port = %self.port_name, baud = self.baud_rate))]
    async fn connect(&self) -> Result<FrameChannel> {
        let stream = tokio_serial::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()?;

        debug!("Serial port opened");
        Ok(FrameChannel::new(stream))
    }

    fn describe(&self) -> String {
        format!("serial://{}@{}", self.port_name, self.baud_rate)
    }
}
