//! Redis status source
//!
//! `RedisClient` speaks just enough RESP to authenticate and issue `INFO`.
//! It keeps at most one connection open, reconnects lazily on the next fetch
//! after any I/O or protocol error, and never retries within a fetch.

use crate::config::{RedisConfig, TlsConfig, Transport};
use crate::error::{AppError, AppResult};
use crate::status::StatusInfo;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

/// Anything that can hand back one status snapshot per call
#[async_trait]
pub trait StatusSource: Send {
    async fn fetch_status(&mut self) -> AppResult<StatusInfo>;
}

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> AsyncStream for T {}

type Connection = BufStream<Box<dyn AsyncStream>>;

/// Upper bound on a single bulk reply; INFO replies are a few KiB
const MAX_BULK_LEN: usize = 64 * 1024 * 1024;

/// One decoded RESP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
}

struct TlsSettings {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

/// RESP client that fetches `INFO` snapshots
pub struct RedisClient {
    endpoint: String,
    transport: Transport,
    password: Option<String>,
    connect_timeout: Duration,
    tls: Option<TlsSettings>,
    connection: Option<Connection>,
}

impl RedisClient {
    /// Create a client without connecting
    ///
    /// # Errors
    ///
    /// Returns `AppError::TlsConfig` if TLS is configured and the CA file
    /// cannot be read, contains no certificates, or the server name is invalid.
    pub fn new(config: &RedisConfig) -> AppResult<Self> {
        let tls = config
            .tls
            .as_ref()
            .map(|tls| load_tls(&config.endpoint, tls))
            .transpose()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            transport: config.transport,
            password: config.password.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            tls,
            connection: None,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn fetch_error(&self, reason: impl std::fmt::Display) -> AppError {
        AppError::StatusFetch {
            endpoint: self.endpoint.clone(),
            reason: reason.to_string(),
        }
    }

    fn protocol_error(&self, reason: impl std::fmt::Display) -> AppError {
        AppError::Protocol {
            endpoint: self.endpoint.clone(),
            reason: reason.to_string(),
        }
    }

    async fn open_stream(&self) -> AppResult<Box<dyn AsyncStream>> {
        match self.transport {
            Transport::Tcp => {
                let tcp = TcpStream::connect(&self.endpoint)
                    .await
                    .map_err(|e| self.fetch_error(format!("connect failed: {}", e)))?;
                tcp.set_nodelay(true)
                    .map_err(|e| self.fetch_error(format!("set_nodelay failed: {}", e)))?;

                match &self.tls {
                    Some(tls) => {
                        let stream = tls
                            .connector
                            .connect(tls.server_name.clone(), tcp)
                            .await
                            .map_err(|e| self.fetch_error(format!("TLS handshake failed: {}", e)))?;
                        let stream: Box<dyn AsyncStream> = Box::new(stream);
                        Ok(stream)
                    }
                    None => {
                        let stream: Box<dyn AsyncStream> = Box::new(tcp);
                        Ok(stream)
                    }
                }
            }
            #[cfg(unix)]
            Transport::Unix => {
                let stream = tokio::net::UnixStream::connect(&self.endpoint)
                    .await
                    .map_err(|e| self.fetch_error(format!("connect failed: {}", e)))?;
                let stream: Box<dyn AsyncStream> = Box::new(stream);
                Ok(stream)
            }
            #[cfg(not(unix))]
            Transport::Unix => Err(self.fetch_error("unix transport is not supported")),
        }
    }

    async fn connect(&self) -> AppResult<Connection> {
        let stream = tokio::time::timeout(self.connect_timeout, self.open_stream())
            .await
            .map_err(|_| {
                self.fetch_error(format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs()
                ))
            })??;
        let mut conn = BufStream::new(stream);

        if let Some(password) = &self.password {
            match self.request(&mut conn, &["AUTH", password.as_str()]).await? {
                Reply::Status(ok) if ok == "OK" => {}
                Reply::Error(e) => return Err(self.fetch_error(format!("AUTH rejected: {}", e))),
                other => {
                    return Err(self.protocol_error(format!("unexpected AUTH reply {:?}", other)));
                }
            }
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            tls = self.tls.is_some(),
            "Connected to Redis"
        );
        Ok(conn)
    }

    async fn request(&self, conn: &mut Connection, args: &[&str]) -> AppResult<Reply> {
        conn.write_all(&encode_command(args))
            .await
            .map_err(|e| self.fetch_error(format!("write failed: {}", e)))?;
        conn.flush()
            .await
            .map_err(|e| self.fetch_error(format!("flush failed: {}", e)))?;
        self.read_reply(conn).await
    }

    async fn read_reply(&self, conn: &mut Connection) -> AppResult<Reply> {
        let mut line = String::new();
        let read = conn
            .read_line(&mut line)
            .await
            .map_err(|e| self.fetch_error(format!("read failed: {}", e)))?;
        if read == 0 {
            return Err(self.fetch_error("connection closed by server"));
        }

        let line = line.trim_end_matches(['\r', '\n']);
        let Some(kind) = line.chars().next() else {
            return Err(self.protocol_error("empty reply line"));
        };
        let rest = &line[kind.len_utf8()..];

        match kind {
            '+' => Ok(Reply::Status(rest.to_string())),
            '-' => Ok(Reply::Error(rest.to_string())),
            ':' => rest
                .parse::<i64>()
                .map(Reply::Integer)
                .map_err(|e| self.protocol_error(format!("invalid integer reply '{}': {}", rest, e))),
            '$' => {
                let len = rest
                    .parse::<i64>()
                    .map_err(|e| self.protocol_error(format!("invalid bulk length '{}': {}", rest, e)))?;
                if len < 0 {
                    return Ok(Reply::Bulk(None));
                }
                let len = len as usize;
                if len > MAX_BULK_LEN {
                    return Err(self.protocol_error(format!("bulk reply of {} bytes is too large", len)));
                }
                // Payload plus trailing CRLF
                let mut buf = vec![0u8; len + 2];
                conn.read_exact(&mut buf)
                    .await
                    .map_err(|e| self.fetch_error(format!("read failed: {}", e)))?;
                if &buf[len..] != b"\r\n" {
                    return Err(self.protocol_error("bulk reply is not CRLF terminated"));
                }
                buf.truncate(len);
                Ok(Reply::Bulk(Some(buf)))
            }
            other => Err(self.protocol_error(format!("unsupported reply type '{}'", other))),
        }
    }
}

#[async_trait]
impl StatusSource for RedisClient {
    async fn fetch_status(&mut self) -> AppResult<StatusInfo> {
        let mut conn = match self.connection.take() {
            Some(conn) => conn,
            None => self.connect().await?,
        };

        // Any error below drops `conn`; the next fetch reconnects
        let reply = self.request(&mut conn, &["INFO"]).await?;
        let body = match reply {
            Reply::Bulk(Some(body)) => body,
            Reply::Error(e) => {
                self.connection = Some(conn);
                return Err(self.fetch_error(format!("INFO rejected: {}", e)));
            }
            Reply::Bulk(None) => return Err(self.protocol_error("INFO returned a nil reply")),
            other => return Err(self.protocol_error(format!("unexpected INFO reply {:?}", other))),
        };
        self.connection = Some(conn);

        let text = String::from_utf8(body)
            .map_err(|e| self.protocol_error(format!("INFO reply is not UTF-8: {}", e)))?;
        Ok(StatusInfo::parse(&text))
    }
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Host part of a `host:port` endpoint, without IPv6 brackets
fn endpoint_host(endpoint: &str) -> &str {
    let host = endpoint
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(endpoint);
    host.trim_start_matches('[').trim_end_matches(']')
}

fn load_tls(endpoint: &str, tls: &TlsConfig) -> AppResult<TlsSettings> {
    let mut roots = RootCertStore::empty();

    match &tls.ca_file {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|e| {
                AppError::TlsConfig(format!("failed to open CA file {}: {}", path.display(), e))
            })?;
            let mut reader = std::io::BufReader::new(file);
            for cert in rustls_pemfile::certs(&mut reader) {
                let cert = cert.map_err(|e| {
                    AppError::TlsConfig(format!("failed to read CA file {}: {}", path.display(), e))
                })?;
                roots.add(cert).map_err(|e| {
                    AppError::TlsConfig(format!(
                        "invalid certificate in CA file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            }
            if roots.is_empty() {
                return Err(AppError::TlsConfig(format!(
                    "CA file {} contains no certificates",
                    path.display()
                )));
            }
        }
        None => {
            let native = rustls_native_certs::load_native_certs();
            for e in &native.errors {
                tracing::warn!(error = %e, "Error loading native root certificates");
            }
            for cert in native.certs {
                if let Err(e) = roots.add(cert) {
                    tracing::warn!(error = %e, "Skipping invalid native root certificate");
                }
            }
        }
    }

    let host = tls
        .server_name
        .clone()
        .unwrap_or_else(|| endpoint_host(endpoint).to_string());
    let server_name = ServerName::try_from(host.clone())
        .map_err(|e| AppError::TlsConfig(format!("invalid server name '{}': {}", host, e)))?;

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsSettings {
        connector: TlsConnector::from(Arc::new(config)),
        server_name,
    })
}
