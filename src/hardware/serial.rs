// src/hardware/serial.rs - EiBotBoard serial link
use super::{ChannelError, CommandChannel};
use async_trait::async_trait;
use serial2_tokio::SerialPort;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

const BY_ID_DIR: &str = "/dev/serial/by-id";

/// Serial connection to the motion board.
///
/// A background task drains everything the board sends back and logs it line by line.
/// The board acknowledges a move as soon as it is queued, not when it finishes, so the
/// replies are returned to the caller for diagnostics only.
pub struct SerialChannel {
    port: Arc<SerialPort>,
    responses: Mutex<mpsc::UnboundedReceiver<String>>,
    path: String,
}

impl SerialChannel {
    /// Open `path` at `baud` and start the reader task. Must be called within a runtime.
    pub fn open(path: &str, baud: u32) -> Result<Self, ChannelError> {
        tracing::info!("Attempting to open serial port: \"{}\"", path);
        let port = Arc::new(SerialPort::open(path, baud)?);
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let reader = port.clone();
        let reader_path = path.to_string();
        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let mut pending = String::new();
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        tracing::info!("Serial connection {} closed by remote", reader_path);
                        break;
                    }
                    Ok(n) => {
                        pending.push_str(&String::from_utf8_lossy(&buf[..n]));
                        while let Some(end) = pending.find(['\r', '\n']) {
                            let raw: String = pending.drain(..=end).collect();
                            let line = raw.trim();
                            if line.is_empty() {
                                continue;
                            }
                            tracing::debug!("Serial RX: {}", line);
                            if response_tx.send(line.to_string()).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Serial read error on {}: {}", reader_path, e);
                        break;
                    }
                }
            }
        });

        tracing::info!("Serial connection open at {}bps", baud);
        Ok(Self {
            port,
            responses: Mutex::new(response_rx),
            path: path.to_string(),
        })
    }

    /// Every serial device the OS reports, in the order it reports them.
    pub fn available_ports() -> Vec<String> {
        match SerialPort::available_ports() {
            Ok(paths) => paths.iter().map(|p| p.display().to_string()).collect(),
            Err(e) => {
                tracing::warn!("Could not enumerate serial ports: {}", e);
                vec![]
            }
        }
    }

    /// Look for a device whose stable udev name identifies it as an EiBotBoard.
    pub fn find_eibotboard() -> Option<String> {
        let entries = std::fs::read_dir(BY_ID_DIR).ok()?;
        entries
            .filter_map(Result::ok)
            .find(|entry| entry.file_name().to_string_lossy().contains("EiBotBoard"))
            .map(|entry| entry.path().display().to_string())
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl CommandChannel for SerialChannel {
    async fn write(&self, line: &str) -> Result<String, ChannelError> {
        self.port.write_all(line.as_bytes()).await?;

        let mut responses = self.responses.lock().await;
        let mut raw = Vec::new();
        loop {
            match responses.try_recv() {
                Ok(response) => raw.push(response),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Reader is gone; writes may still succeed, but nothing will come back.
                    if raw.is_empty() {
                        tracing::warn!("Serial reader for {} has stopped", self.path);
                    }
                    break;
                }
            }
        }
        Ok(raw.join("\n"))
    }
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("path", &self.path)
            .finish()
    }
}
