//! The IRC protocol driver.
//!
//! [`Client`] owns a connection and performs the connection-lifetime state
//! machine: registration, capability negotiation, nick collision recovery,
//! liveness probing, outbound pacing, and dispatch of incoming messages to
//! internal trackers and the user handler.

mod caps;
mod ping;
mod ratelimit;

pub use self::ratelimit::SendLimiter;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::conn::{Reader, Writer};
use crate::error::{ClientError, Result};
use crate::handler::{Handler, OutboundFilter};
use crate::isupport::IsupportTracker;
use crate::message::Message;
use crate::tracker::Tracker;

use self::caps::{CapNegotiation, CapOutcome};
use self::ping::{PingLoop, PONG_CHANNEL_CAPACITY};

type BoxedReadHalf = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriteHalf = Box<dyn AsyncWrite + Send + Unpin>;

/// Bound on how long shutdown waits for subtasks to wind down.
const SHUTDOWN_JOIN_BOUND: Duration = Duration::from_secs(1);

/// Configuration for a [`Client`].
///
/// The constructor fills the common fields; everything else can be set
/// directly before the config is handed to [`Client::new`].
pub struct ClientConfig {
    /// Initial nickname.
    pub nick: String,
    /// Server password; empty means no `PASS` line is sent.
    pub pass: String,
    /// `USER` username field.
    pub user: String,
    /// `USER` realname field.
    pub name: String,
    /// Interval between liveness PINGs; zero disables the ping loop.
    pub ping_frequency: Duration,
    /// How long to wait for each PONG; only meaningful with pings enabled.
    pub ping_timeout: Duration,
    /// Token refill period for outbound pacing; zero disables rate limiting.
    pub send_limit: Duration,
    /// Token bucket capacity; zero is coerced to 1 when limiting is enabled.
    pub send_burst: u32,
    /// Attach the ISUPPORT tracker.
    pub enable_isupport: bool,
    /// Attach the membership tracker. Implies `enable_isupport`.
    pub enable_tracker: bool,
    /// Rewrite `\x01`-framed PRIVMSGs into `CTCP` messages before dispatch.
    pub decode_ctcp: bool,
    /// User callback for every incoming message.
    pub handler: Option<Box<dyn Handler>>,
    /// Outbound filter consulted by [`Client::write_message`].
    pub filter: Option<Box<dyn OutboundFilter>>,
}

impl ClientConfig {
    /// A config with the given identity and everything else disabled.
    pub fn new(
        nick: impl Into<String>,
        user: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ClientConfig {
            nick: nick.into(),
            pass: String::new(),
            user: user.into(),
            name: name.into(),
            ping_frequency: Duration::ZERO,
            ping_timeout: Duration::ZERO,
            send_limit: Duration::ZERO,
            send_burst: 0,
            enable_isupport: false,
            enable_tracker: false,
            decode_ctcp: true,
            handler: None,
            filter: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("nick", &self.nick)
            .field("user", &self.user)
            .field("name", &self.name)
            .field("ping_frequency", &self.ping_frequency)
            .field("ping_timeout", &self.ping_timeout)
            .field("send_limit", &self.send_limit)
            .field("send_burst", &self.send_burst)
            .field("enable_isupport", &self.enable_isupport)
            .field("enable_tracker", &self.enable_tracker)
            .field("decode_ctcp", &self.decode_ctcp)
            .field("handler", &self.handler.is_some())
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// The serialized, rate-gated write path. Shared between the client's
/// public write methods and the ping loop.
#[derive(Clone)]
pub(crate) struct Sender {
    writer: Arc<Mutex<Writer<BoxedWriteHalf>>>,
    limiter: Option<SendLimiter>,
    shutdown: CancellationToken,
}

impl Sender {
    /// Write one line, waiting on the rate limiter first if one is
    /// installed. The wait aborts once shutdown is signaled.
    pub(crate) async fn write_line(&self, line: &str) -> Result<()> {
        if let Some(limiter) = &self.limiter {
            tokio::select! {
                _ = limiter.acquire() => {}
                _ = self.shutdown.cancelled() => return Err(ClientError::ShuttingDown),
            }
        }

        let mut writer = self.writer.lock().await;
        writer.write_line(line).await
    }
}

/// An IRC client over an already-connected byte stream.
///
/// The client never opens sockets; hand it anything that is
/// `AsyncRead + AsyncWrite` and call [`run`](Client::run).
///
/// ```no_run
/// # async fn example(stream: tokio::net::TcpStream) -> slirc_client::Result<()> {
/// use slirc_client::{Client, ClientConfig};
///
/// let mut config = ClientConfig::new("mybot", "mybot", "An example bot");
/// config.enable_tracker = true;
/// let client = Client::new(stream, config);
/// client.run().await
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    reader: Mutex<Option<Reader<BoxedReadHalf>>>,
    sender: Sender,
    nick: RwLock<String>,
    registered: AtomicBool,
    caps: StdMutex<CapNegotiation>,
    isupport: Option<Arc<IsupportTracker>>,
    tracker: Option<Tracker>,
    error_tx: mpsc::Sender<ClientError>,
    error_rx: Mutex<Option<mpsc::Receiver<ClientError>>>,
    pongs: StdMutex<Option<mpsc::Sender<String>>>,
    shutdown: CancellationToken,
}

impl Client {
    /// Wrap an already-connected stream.
    pub fn new<S>(stream: S, config: ClientConfig) -> Client
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let shutdown = CancellationToken::new();

        let limiter = (!config.send_limit.is_zero())
            .then(|| SendLimiter::new(config.send_limit, config.send_burst));

        let isupport = (config.enable_isupport || config.enable_tracker)
            .then(|| Arc::new(IsupportTracker::new()));
        let tracker = config
            .enable_tracker
            .then(|| Tracker::new(isupport.clone().expect("tracker implies isupport")));

        // Single-slot mailbox: the first fatal error wins, later senders
        // drop theirs.
        let (error_tx, error_rx) = mpsc::channel(1);

        let nick = RwLock::new(config.nick.clone());

        Client {
            config,
            reader: Mutex::new(Some(Reader::new(
                Box::new(read_half) as BoxedReadHalf
            ))),
            sender: Sender {
                writer: Arc::new(Mutex::new(Writer::new(
                    Box::new(write_half) as BoxedWriteHalf
                ))),
                limiter,
                shutdown: shutdown.clone(),
            },
            nick,
            registered: AtomicBool::new(false),
            caps: StdMutex::new(CapNegotiation::default()),
            isupport,
            tracker,
            error_tx,
            error_rx: Mutex::new(Some(error_rx)),
            pongs: StdMutex::new(None),
            shutdown,
        }
    }

    /// The current authoritative nickname.
    pub fn current_nick(&self) -> String {
        self.nick.read().expect("nick lock poisoned").clone()
    }

    /// Whether the server has confirmed registration (001 seen).
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Register interest in a capability. Call before [`run`](Client::run);
    /// `required` makes a missing or rejected capability a fatal startup
    /// error.
    pub fn cap_request(&self, name: &str, required: bool) {
        self.caps
            .lock()
            .expect("caps lock poisoned")
            .request(name, required);
    }

    /// Whether the server advertised the capability in `CAP LS`.
    pub fn cap_available(&self, name: &str) -> bool {
        self.caps
            .lock()
            .expect("caps lock poisoned")
            .is_available(name)
    }

    /// Whether the server ACKed the capability.
    pub fn cap_enabled(&self, name: &str) -> bool {
        self.caps
            .lock()
            .expect("caps lock poisoned")
            .is_enabled(name)
    }

    /// The ISUPPORT tracker, if enabled.
    pub fn isupport(&self) -> Option<&IsupportTracker> {
        self.isupport.as_deref()
    }

    /// The membership tracker, if enabled.
    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }

    /// True if the message targets a channel rather than us directly,
    /// judged by the first param's sigil against the server's CHANTYPES
    /// (default `#&`).
    pub fn from_channel(&self, msg: &Message) -> bool {
        let Some(target) = msg.params.first() else {
            return false;
        };
        let Some(sigil) = target.chars().next() else {
            return false;
        };

        match self.isupport.as_ref().and_then(|i| i.get_raw("CHANTYPES")) {
            Some(chantypes) if !chantypes.is_empty() => chantypes.contains(sigil),
            _ => sigil == '#' || sigil == '&',
        }
    }

    /// Write a raw line. Bypasses the outbound filter but not the rate
    /// limiter.
    pub async fn write(&self, line: &str) -> Result<()> {
        self.sender.write_line(line).await
    }

    /// Write a formatted line, `format_args!` style.
    ///
    /// ```no_run
    /// # async fn example(client: &slirc_client::Client) -> slirc_client::Result<()> {
    /// client.writef(format_args!("JOIN :{}", "#rust")).await
    /// # }
    /// ```
    pub fn writef<'a>(
        &'a self,
        args: fmt::Arguments<'_>,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        let line = args.to_string();
        async move { self.write(&line).await }
    }

    /// Serialize and write a message, consulting the outbound filter first.
    pub async fn write_message(&self, msg: &Message) -> Result<()> {
        if let Some(filter) = &self.config.filter {
            if filter.filter(self, msg) {
                trace!("outbound filter dropped {}", msg.command);
                return Ok(());
            }
        }
        self.write(&msg.to_string()).await
    }

    /// Reply to a message: into the channel it came from, or directly back
    /// to the sender.
    pub async fn reply(&self, msg: &Message, text: &str) -> Result<()> {
        let target = self.reply_target(msg)?;
        self.write_message(&Message::privmsg(target, text)).await
    }

    /// Like [`reply`](Client::reply), but prefixes `"<nick>: "` when the
    /// reply goes into a channel.
    pub async fn mention_reply(&self, msg: &Message, text: &str) -> Result<()> {
        let target = self.reply_target(msg)?;
        let text = if self.from_channel(msg) {
            let sender = msg
                .source_name()
                .ok_or(ClientError::MissingReplyTarget)?;
            format!("{}: {}", sender, text)
        } else {
            text.to_string()
        };
        self.write_message(&Message::privmsg(target, text)).await
    }

    /// Send a CTCP reply (a `\x01`-framed NOTICE) back to the sender.
    pub async fn ctcp_reply(&self, msg: &Message, text: &str) -> Result<()> {
        let target = msg
            .source_name()
            .ok_or(ClientError::MissingReplyTarget)?;
        self.write_message(&Message::notice(target, format!("\x01{}\x01", text)))
            .await
    }

    fn reply_target(&self, msg: &Message) -> Result<String> {
        if self.from_channel(msg) {
            Ok(msg.params[0].clone())
        } else {
            msg.source_name()
                .map(str::to_string)
                .ok_or(ClientError::MissingReplyTarget)
        }
    }

    /// Run the client until a fatal error occurs.
    pub async fn run(&self) -> Result<()> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Run the client until a fatal error occurs or `cancel` fires.
    ///
    /// External cancellation is a clean exit: subtasks are signaled, the
    /// transport is closed, and `Ok(())` is returned.
    pub async fn run_with_cancel(&self, cancel: CancellationToken) -> Result<()> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(ClientError::AlreadyRunning)?;
        let mut error_rx = self
            .error_rx
            .lock()
            .await
            .take()
            .ok_or(ClientError::AlreadyRunning)?;

        let ping_task = if !self.config.ping_frequency.is_zero() {
            let (pong_tx, pong_rx) = mpsc::channel(PONG_CHANNEL_CAPACITY);
            *self.pongs.lock().expect("pongs lock poisoned") = Some(pong_tx);
            Some(tokio::spawn(
                PingLoop {
                    sender: self.sender.clone(),
                    errors: self.error_tx.clone(),
                    pongs: pong_rx,
                    frequency: self.config.ping_frequency,
                    timeout: self.config.ping_timeout,
                    shutdown: self.shutdown.clone(),
                }
                .run(),
            ))
        } else {
            None
        };

        let result = match self.register().await {
            Ok(()) => {
                tokio::select! {
                    r = self.read_loop(&mut reader) => r,
                    err = error_rx.recv() => Err(err.unwrap_or(ClientError::ShuttingDown)),
                    _ = cancel.cancelled() => Ok(()),
                }
            }
            Err(e) => Err(e),
        };

        debug!("client shutting down");
        self.shutdown.cancel();

        // Closing the transport unblocks anything still touching it.
        {
            let mut writer = self.sender.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                trace!("transport shutdown: {}", e);
            }
        }

        if let Some(task) = ping_task {
            if tokio::time::timeout(SHUTDOWN_JOIN_BOUND, task).await.is_err() {
                warn!("ping loop did not stop within the shutdown bound");
            }
        }

        result
    }

    /// Emit the registration sequence: PASS, CAP LS + CAP REQs, NICK, USER.
    async fn register(&self) -> Result<()> {
        if !self.config.pass.is_empty() {
            self.write(&format!("PASS :{}", self.config.pass)).await?;
        }

        let requested = self.caps.lock().expect("caps lock poisoned").requested();
        if !requested.is_empty() {
            self.write("CAP LS").await?;
            for cap in &requested {
                self.write(&format!("CAP REQ :{}", cap)).await?;
            }
            self.caps
                .lock()
                .expect("caps lock poisoned")
                .begin(requested.len());
        }

        self.write(&format!("NICK :{}", self.config.nick)).await?;
        self.write(&format!(
            "USER {} 0 * :{}",
            self.config.user, self.config.name
        ))
        .await?;
        Ok(())
    }

    async fn read_loop(&self, reader: &mut Reader<BoxedReadHalf>) -> Result<()> {
        loop {
            let mut msg = reader.read_message().await?;
            self.dispatch(&mut msg).await?;
        }
    }

    /// Run one message through the internal filters, the trackers, and the
    /// user handler, in that order.
    async fn dispatch(&self, msg: &mut Message) -> Result<()> {
        match msg.command.to_ascii_uppercase().as_str() {
            "001" => {
                if let Some(nick) = msg.params.first() {
                    *self.nick.write().expect("nick lock poisoned") = nick.clone();
                }
                self.registered.store(true, Ordering::Release);
            }
            "433" | "437" => {
                let nick = {
                    let mut nick = self.nick.write().expect("nick lock poisoned");
                    nick.push('_');
                    nick.clone()
                };
                debug!("nick in use, retrying as {}", nick);
                self.write(&format!("NICK :{}", nick)).await?;
            }
            "PING" => {
                self.write(&format!("PONG :{}", msg.trailing())).await?;
            }
            "PONG" => {
                let pong_tx = self.pongs.lock().expect("pongs lock poisoned").clone();
                if let Some(tx) = pong_tx {
                    if tx.try_send(msg.trailing().to_string()).is_err() {
                        trace!("PONG channel full, dropping token");
                    }
                }
            }
            "PRIVMSG" => {
                if self.config.decode_ctcp {
                    rewrite_ctcp(msg);
                }
            }
            "NICK" => {
                if let Some(new_nick) = msg.params.first() {
                    let mut nick = self.nick.write().expect("nick lock poisoned");
                    if msg.source_name() == Some(nick.as_str()) {
                        *nick = new_nick.clone();
                    }
                }
            }
            "CAP" => {
                // Malformed CAP responses are ignored without touching the
                // response counter.
                let outcome = if msg.params.len() < 3 {
                    Ok(CapOutcome::Continue)
                } else {
                    self.caps
                        .lock()
                        .expect("caps lock poisoned")
                        .apply(&msg.params[1], &msg.params[2])
                };
                match outcome {
                    Ok(CapOutcome::Continue) => {}
                    Ok(CapOutcome::End) => self.write("CAP END").await?,
                    Err(e) => return Err(e),
                }
            }
            _ => {}
        }

        if let Some(isupport) = &self.isupport {
            if let Err(e) = isupport.handle(msg) {
                debug!("isupport tracker: {}", e);
            }
        }
        if let Some(tracker) = &self.tracker {
            if let Err(e) = tracker.handle(msg) {
                debug!("membership tracker: {}", e);
            }
        }
        if let Some(handler) = &self.config.handler {
            handler.handle(self, msg).await;
        }

        Ok(())
    }
}

/// Strip `\x01` framing from a PRIVMSG trailing and relabel it `CTCP`.
///
/// A payload that opens with `\x01` but never closes it is left alone.
fn rewrite_ctcp(msg: &mut Message) {
    let Some(last) = msg.params.last() else {
        return;
    };
    let bytes = last.as_bytes();
    if bytes.len() < 2 || bytes[0] != 0x01 || bytes[bytes.len() - 1] != 0x01 {
        return;
    }

    let inner = last[1..last.len() - 1].to_string();
    *msg.params.last_mut().expect("checked above") = inner;
    msg.command = "CTCP".to_string();
}
