pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGRELAY CONFIGURATION
# =============================================================================
# Delivers structured log records to a line-oriented log aggregator, falling
# back to a local durable store when the aggregator cannot accept them.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logrelay/config.yml
#   3. /etc/logrelay/config.yml
#
# Any value may reference an environment variable with $env{...}.

# =============================================================================
# TRANSPORT
# =============================================================================
# Where and how records are shipped. Each record is written as one line of
# JSON terminated by a newline.

transport:
  host: logstash
  port: 5000
  # 'reliable' (ordered stream, alias 'tcp') or 'besteffort' (datagrams, alias 'udp')
  mode: reliable
  # Time allowed for establishing the connection (and for each write)
  connect_timeout: 5s
  # Extra attempts after the first failure, per record
  max_retry_attempts: 3
  # Fixed pause between attempts
  retry_delay: 2s
  # Default chunk size when shipping many records
  batch_size: 100

# =============================================================================
# ROUTING
# =============================================================================
# With use_primary_transport disabled, every record goes straight to the
# fallback store and the aggregator is never contacted.

routing:
  use_primary_transport: true

# =============================================================================
# FALLBACK STORE
# =============================================================================
# Records the aggregator could not accept are appended here.

fallback:
  path: ~/.local/share/logrelay/fallback.duckdb

# =============================================================================
# MONITORING
# =============================================================================

web:
  listen: 127.0.0.1:7106
"#
    .to_string()
}
