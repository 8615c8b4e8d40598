use std::path::PathBuf;

use super::run::{require_config_path, RunError};
use crate::config::parse::load_config;
use crate::config::TransportConfig;
use crate::record::encode_frame;
use crate::transport::{ScopedConnection, SocketTransport, Transport};

/// Open a fresh connection, send one test frame and close it again.
pub async fn probe_transport(config: &TransportConfig) -> Result<(), RunError> {
    let frame = encode_frame(&serde_json::json!({
        "message": "logrelay connectivity probe",
        "source": "probe",
    }))?;

    let mut transport = SocketTransport::new(config);
    let mut conn = ScopedConnection::open(&mut transport).await?;
    conn.send_frame(&frame).await?;
    Ok(())
}

pub async fn probe(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = require_config_path(config_path);
    let config = load_config(&config_path)?;
    let address = config.transport.address();

    match probe_transport(&config.transport).await {
        Ok(()) => {
            println!("✓ Sent probe to {} ({})", address, config.transport.mode);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Probe to {} failed: {}", address, e);
            std::process::exit(1);
        }
    }
}
