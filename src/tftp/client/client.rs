use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::Path;

use anyhow::Context;

use super::config::ClientConfig;
use super::download::download;
use super::session::{Session, TransferSummary};
use super::upload::upload;

/// TFTP client
///
/// Supports file upload (PUT) and download (GET) operations. Every call
/// opens its own socket on an ephemeral port, which is closed again when
/// the call returns.
///
/// # Example
///
/// ```rust,no_run
/// use tftpc::tftp::client::{Client, ClientConfig};
/// use std::path::Path;
///
/// let config = ClientConfig::new("192.168.1.100", 69);
/// let client = Client::new(config).unwrap();
///
/// // Download file
/// client.get("remote.txt", Path::new("local.txt")).unwrap();
///
/// // Upload file
/// client.put(Path::new("local.txt"), "remote.txt").unwrap();
/// ```
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// Create a new TFTP client
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        if config.server_host.is_empty() {
            return Err(anyhow::anyhow!("Server host is empty"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Download a file from the server (RRQ - Read Request)
    ///
    /// The local file is removed again if the transfer fails.
    ///
    /// # Arguments
    ///
    /// * `remote_file` - File name on the server
    /// * `local_file` - Local save path
    pub fn get(&self, remote_file: &str, local_file: &Path) -> anyhow::Result<TransferSummary> {
        log::info!("Downloading {} to {}", remote_file, local_file.display());

        let file = File::create(local_file)
            .with_context(|| format!("Failed to create {}", local_file.display()))?;
        let mut writer = BufWriter::new(file);

        let result = self.get_to(remote_file, &mut writer);
        drop(writer);

        if result.is_err() {
            if let Err(e) = std::fs::remove_file(local_file) {
                log::warn!(
                    "Failed to remove partial file {}: {}",
                    local_file.display(),
                    e
                );
            }
        }
        let summary = result?;

        log::info!("Download complete: {}", local_file.display());
        Ok(summary)
    }

    /// Upload a file to the server (WRQ - Write Request)
    ///
    /// # Arguments
    ///
    /// * `local_file` - Local file path
    /// * `remote_file` - File name on the server
    pub fn put(&self, local_file: &Path, remote_file: &str) -> anyhow::Result<TransferSummary> {
        log::info!("Uploading {} to {}", local_file.display(), remote_file);

        if !local_file.exists() {
            return Err(anyhow::anyhow!(
                "Local file does not exist: {}",
                local_file.display()
            ));
        }

        let mut file = File::open(local_file)
            .with_context(|| format!("Failed to open {}", local_file.display()))?;
        let summary = self.put_from(&mut file, remote_file)?;

        log::info!("Upload complete: {}", remote_file);
        Ok(summary)
    }

    /// Download `remote_file` into any writer
    pub fn get_to<W: Write + ?Sized>(
        &self,
        remote_file: &str,
        sink: &mut W,
    ) -> anyhow::Result<TransferSummary> {
        let server_addr = self.server_addr()?;
        let socket = bind_for(server_addr)?;
        let mut session = Session::new(&socket, server_addr, self.config.retry_policy());

        let summary = download(&mut session, remote_file, self.config.mode, sink)
            .with_context(|| format!("Failed to download {} from {}", remote_file, server_addr))?;
        log_summary(&summary);
        Ok(summary)
    }

    /// Upload everything `source` yields as `remote_file`
    pub fn put_from<R: Read + ?Sized>(
        &self,
        source: &mut R,
        remote_file: &str,
    ) -> anyhow::Result<TransferSummary> {
        let server_addr = self.server_addr()?;
        let socket = bind_for(server_addr)?;
        let mut session = Session::new(&socket, server_addr, self.config.retry_policy());

        let summary = upload(&mut session, remote_file, self.config.mode, source)
            .with_context(|| format!("Failed to upload {} to {}", remote_file, server_addr))?;
        log_summary(&summary);
        Ok(summary)
    }

    fn server_addr(&self) -> anyhow::Result<SocketAddr> {
        let host = self.config.server_host.as_str();
        (host, self.config.server_port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}", host))?
            .next()
            .ok_or_else(|| anyhow::anyhow!("No address found for {}", host))
    }
}

/// Bind an ephemeral socket in the same address family as the server
fn bind_for(server_addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let local = match server_addr {
        SocketAddr::V4(_) => "0.0.0.0:0",
        SocketAddr::V6(_) => "[::]:0",
    };
    let socket = UdpSocket::bind(local).context("Failed to bind local socket")?;
    log::debug!("Bound {} for {}", socket.local_addr()?, server_addr);
    Ok(socket)
}

fn log_summary(summary: &TransferSummary) {
    log::info!(
        "Transferred {} bytes in {} blocks ({} retransmissions)",
        summary.bytes,
        summary.blocks,
        summary.retransmits
    );
}
