pub mod codec;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use relay_api::{KvStore, StoreError, StoreFuture};

pub use codec::RespValue;

// ═══════════════════════════════════════════════════════════════
//  RespConfig
// ═══════════════════════════════════════════════════════════════

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6379
}
fn default_max_reconnect_retries() -> u32 {
    16
}
fn default_backoff_base_ms() -> u64 {
    10
}
fn default_backoff_max_exponent() -> u32 {
    10
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RespConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// SELECT на каждом (re)connect.
    #[serde(default)]
    pub database: Option<u32>,
    /// AUTH на каждом (re)connect.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_max_reconnect_retries")]
    pub max_reconnect_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Delay stops doubling after this many attempts.
    #[serde(default = "default_backoff_max_exponent")]
    pub backoff_max_exponent: u32,
}

impl Default for RespConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: None,
            password: None,
            max_reconnect_retries: default_max_reconnect_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_exponent: default_backoff_max_exponent(),
        }
    }
}

impl RespConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `base * 2^min(attempt, max_exponent)`; 10 ms base caps at 10 240 ms.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.min(self.backoff_max_exponent).min(63);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << exp))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Connection
// ═══════════════════════════════════════════════════════════════

struct Connection {
    stream: TcpStream,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    async fn open(config: &RespConfig) -> Result<Self, StoreError> {
        let addr = config.addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| StoreError::io(format!("connect to {addr}: {e}")))?;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream,
            read_buf: Vec::with_capacity(8192),
            write_buf: Vec::with_capacity(1024),
        };

        if let Some(password) = &config.password {
            conn.command(&["AUTH", password.as_str()]).await?.into_result()?;
        }
        if let Some(db) = config.database {
            conn.command(&["SELECT", db.to_string().as_str()]).await?.into_result()?;
        }
        Ok(conn)
    }

    /// Send one command and read its reply. An `Err` means the stream can
    /// no longer be trusted; error replies come back as `RespValue::Error`.
    async fn command(&mut self, args: &[&str]) -> Result<RespValue, StoreError> {
        self.write_buf.clear();
        codec::encode_command(args, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;

        let mut chunk = [0u8; 4096];
        loop {
            if let Some((value, consumed)) =
                codec::decode(&self.read_buf).map_err(|e| StoreError::io(e.message()))?
            {
                self.read_buf.drain(..consumed);
                return Ok(value);
            }
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(StoreError::io("connection closed by server"));
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }
}

impl RespValue {
    fn into_result(self) -> Result<RespValue, StoreError> {
        match self {
            RespValue::Error(msg) => Err(StoreError::protocol(msg)),
            other => Ok(other),
        }
    }

    fn into_optional_string(self) -> Result<Option<String>, StoreError> {
        match self.into_result()? {
            RespValue::Bulk(s) => Ok(s),
            RespValue::Simple(s) => Ok(Some(s)),
            RespValue::Array(None) => Ok(None),
            other => Err(StoreError::protocol(format!("expected string reply, got {other:?}"))),
        }
    }
}

/// Connect, sleeping `backoff(attempt)` before each attempt, until
/// `max_reconnect_retries` is exceeded.
async fn reconnect(config: &RespConfig) -> Result<Connection, StoreError> {
    let mut last_error = None;
    for attempt in 0..=config.max_reconnect_retries {
        let delay = config.backoff(attempt);
        tokio::time::sleep(delay).await;
        match Connection::open(config).await {
            Ok(conn) => {
                tracing::info!(addr = %config.addr(), attempt, "reconnected to store");
                return Ok(conn);
            }
            Err(e) => {
                tracing::warn!(
                    addr = %config.addr(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "store reconnect failed"
                );
                last_error = Some(e);
            }
        }
    }
    let detail = last_error.map(|e| e.to_string()).unwrap_or_default();
    Err(StoreError::unavailable(format!(
        "store {} unreachable after {} retries: {detail}",
        config.addr(),
        config.max_reconnect_retries
    )))
}

// ═══════════════════════════════════════════════════════════════
//  RespStore
// ═══════════════════════════════════════════════════════════════

struct Inner {
    config: RespConfig,
    conn: Mutex<Option<Connection>>,
    reconnecting: AtomicBool,
    abandoned: AtomicBool,
}

/// `KvStore` over a single connection to a Redis-compatible server.
///
/// Commands are serialized on the connection. When a command hits an I/O
/// failure the connection is dropped, that command fails, and one
/// background task reconnects with exponential backoff. Commands issued
/// meanwhile fail with `Unavailable`; nothing is retried per request.
/// Once the retry budget is spent the store stays unavailable.
#[derive(Clone)]
pub struct RespStore {
    inner: Arc<Inner>,
}

impl RespStore {
    /// Connect at startup. A failed first attempt falls into the same
    /// backoff schedule used after a connection loss.
    pub async fn connect(config: RespConfig) -> Result<Self, StoreError> {
        let conn = match Connection::open(&config).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(addr = %config.addr(), error = %e, "store connect failed, retrying");
                reconnect(&config).await?
            }
        };
        tracing::info!(addr = %config.addr(), "connected to store");

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                conn: Mutex::new(Some(conn)),
                reconnecting: AtomicBool::new(false),
                abandoned: AtomicBool::new(false),
            }),
        })
    }

    /// Whether the reconnect budget was exhausted.
    pub fn is_abandoned(&self) -> bool {
        self.inner.abandoned.load(Ordering::Acquire)
    }

    /// Runs on its own task: a caller dropped mid-command must not leave an
    /// unread reply on the shared connection.
    async fn execute(&self, args: &[&str]) -> Result<RespValue, StoreError> {
        let inner = self.inner.clone();
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        tokio::spawn(async move { inner.execute(&args).await })
            .await
            .map_err(|e| StoreError::io(format!("store command task: {e}")))?
    }
}

impl Inner {
    async fn execute(self: &Arc<Self>, args: &[String]) -> Result<RespValue, StoreError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            return Err(self.unavailable());
        };

        match conn.command(&args).await {
            Ok(value) => value.into_result(),
            Err(e) => {
                *guard = None;
                drop(guard);
                tracing::warn!(command = args[0], error = %e, "store connection lost");
                self.spawn_reconnect();
                Err(e)
            }
        }
    }

    fn unavailable(&self) -> StoreError {
        if self.abandoned.load(Ordering::Acquire) {
            StoreError::unavailable("store connection abandoned")
        } else {
            StoreError::unavailable("store reconnect in progress")
        }
    }

    fn spawn_reconnect(self: &Arc<Self>) {
        if self.abandoned.load(Ordering::Acquire) || self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = self.clone();
        tokio::spawn(async move {
            match reconnect(&inner.config).await {
                Ok(conn) => {
                    // Cleared under the lock: a command failing on the new
                    // connection must be able to start the next reconnect.
                    let mut guard = inner.conn.lock().await;
                    *guard = Some(conn);
                    inner.reconnecting.store(false, Ordering::Release);
                }
                Err(e) => {
                    inner.abandoned.store(true, Ordering::Release);
                    inner.reconnecting.store(false, Ordering::Release);
                    tracing::error!(error = %e, "giving up on store connection");
                }
            }
        });
    }
}

impl KvStore for RespStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { self.execute(&["GET", key]).await?.into_optional_string() })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.execute(&["SET", key, value]).await?;
            Ok(())
        })
    }

    fn append_to_list<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            match self.execute(&["RPUSH", key, value]).await? {
                RespValue::Integer(_) => Ok(()),
                other => Err(StoreError::protocol(format!("RPUSH: unexpected reply {other:?}"))),
            }
        })
    }

    fn pop_front<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { self.execute(&["LPOP", key]).await?.into_optional_string() })
    }

    fn range_of_list<'a>(
        &'a self,
        key: &'a str,
        start: i64,
        stop: i64,
    ) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let (start, stop) = (start.to_string(), stop.to_string());
            match self.execute(&["LRANGE", key, start.as_str(), stop.as_str()]).await? {
                RespValue::Array(None) => Ok(Vec::new()),
                RespValue::Array(Some(items)) => items
                    .into_iter()
                    .map(|item| match item {
                        RespValue::Bulk(Some(s)) => Ok(s),
                        other => Err(StoreError::protocol(format!(
                            "LRANGE: unexpected element {other:?}"
                        ))),
                    })
                    .collect(),
                other => Err(StoreError::protocol(format!("LRANGE: unexpected reply {other:?}"))),
            }
        })
    }
}

impl std::fmt::Debug for RespStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespStore")
            .field("addr", &self.inner.config.addr())
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}
