use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, info};

/// Outcome of a malware scan. Anything other than `Clean` fails the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    /// Signature name reported by the engine. Logged server-side only.
    Infected(String),
}

/// Malware screening seam. Production streams the buffer to a clamd daemon;
/// tests swap in a canned verdict.
#[async_trait]
pub trait MalwareScanner: Send + Sync {
    async fn scan(&self, data: &[u8]) -> Result<ScanVerdict>;
}

/// ClamAV daemon client speaking the INSTREAM protocol over TCP.
pub struct ClamdScanner {
    addr: String,
}

impl ClamdScanner {
    pub fn new(addr: String) -> Self {
        info!("ClamAV scanner configured at {addr}");
        Self { addr }
    }
}

#[async_trait]
impl MalwareScanner for ClamdScanner {
    async fn scan(&self, data: &[u8]) -> Result<ScanVerdict> {
        debug!("Scanning {} bytes via clamd at {}", data.len(), self.addr);

        let response = clamav_client::tokio::scan_buffer_tcp(data, self.addr.as_str(), None)
            .await
            .map_err(|e| anyhow!("clamd scan failed: {e}"))?;

        if clamav_client::clean(&response).map_err(|e| anyhow!("clamd reply unreadable: {e}"))? {
            return Ok(ScanVerdict::Clean);
        }

        // Reply format: "stream: <signature> FOUND\0"
        let reply = String::from_utf8_lossy(&response);
        let signature = reply
            .trim_end_matches(['\0', '\n'])
            .strip_suffix("FOUND")
            .map(|s| s.trim().trim_start_matches("stream:").trim().to_string())
            .unwrap_or_else(|| reply.trim().to_string());

        Ok(ScanVerdict::Infected(signature))
    }
}
