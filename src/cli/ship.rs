use std::path::{Path, PathBuf};

use super::run::{build_services, require_config_path, RunError};
use crate::config::parse::load_config;
use crate::fallback::DeliveryReport;
use crate::record::{LogRecord, RoutingMetadata};

/// Parse newline-delimited JSON objects. Blank lines are skipped.
pub fn parse_ndjson(content: &str) -> Result<Vec<LogRecord>, RunError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<LogRecord>(line).map_err(|e| RunError::InvalidRecord {
                line: index + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Deliver the records of an NDJSON file and print the report.
pub async fn ship(
    config_path: Option<PathBuf>,
    file: &Path,
    metadata: RoutingMetadata,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = require_config_path(config_path);
    let report = ship_file(&config_path, file, &metadata).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn ship_file(
    config_path: &Path,
    file: &Path,
    metadata: &RoutingMetadata,
) -> Result<DeliveryReport, RunError> {
    let config = load_config(config_path)?;
    let content = tokio::fs::read_to_string(file).await?;

    let mut records = parse_ndjson(&content)?;
    metadata.apply_all(&mut records);
    tracing::info!(file = %file.display(), records = records.len(), "Shipping records");

    let services = build_services(&config).await?;
    let result = services.orchestrator.deliver(&records).await;
    services.registry.shutdown().await;

    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let content = "{\"message\":\"a\"}\n\n  \n{\"message\":\"b\",\"level\":\"ERROR\"}\n";
        let records = parse_ndjson(content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["level"], "ERROR");
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let content = "{\"message\":\"a\"}\n[1,2]\n";
        match parse_ndjson(content) {
            Err(RunError::InvalidRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected invalid record, got {:?}", other.map(|r| r.len())),
        }
    }
}
