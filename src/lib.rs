//! A logger that forwards every logged item to a Slack incoming webhook.
//!
//! Each accepted log record is turned into a message payload and posted as
//! JSON to a [Slack incoming webhook](https://api.slack.com/messaging/webhooks)
//! (or any endpoint that speaks the same payload shape). Delivery is
//! fire-and-forget: the caller is never blocked on network I/O and a broken
//! webhook never takes the application down with it.
//!
//! # Why would you do this?
//!
//! - You want error-level logs from a deployed service to show up in a team
//!   channel without standing up any alerting infrastructure
//! - You want a side-channel for a handful of high-signal events, separate
//!   from your main log sink
//! - You already have an incoming webhook and a spare five minutes
//!
//! # Example - Post every info-and-above log to a webhook
//! ```no_run
//! let _ = slack_logger::SlackLogger::new("https://hooks.slack.com/services/T000/B000/XXXX")
//!     .with_level(log::LevelFilter::Info)
//!     .init();
//! log::info!("msg");
//! ```
//!
//! # Example - Shape the message yourself, and drop the noise
//!
//! A formatter replaces the default `<level>: <message>` text with any
//! payload you like, and returning `None` suppresses the delivery entirely.
//! ```no_run
//! use slack_logger::{MessagePayload, SlackLogger};
//!
//! let _ = SlackLogger::new("https://hooks.slack.com/services/T000/B000/XXXX")
//!     .with_level(log::LevelFilter::Warn)
//!     .with_username("deploy-bot")
//!     .format(|record| {
//!         let message = record.message().unwrap_or_default();
//!         if message.contains("heartbeat") {
//!             return None;
//!         }
//!         Some(MessagePayload::new().with_text(format!(":warning: {message}")))
//!     })
//!     .init();
//! log::warn!("disk usage above 90%");
//! ```

use std::{
    borrow::Cow,
    sync::{Arc, OnceLock},
    thread,
};

use log::kv;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use reqwest::blocking::Client;
use reqwest::Proxy;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A structured log record: an open mapping with `level` and `message` as
/// the recognized keys, plus whatever else the producer attached.
///
/// Records built from the `log` crate via `From<&log::Record>` also carry
/// `module_path`, `file`, `line` and any structured key/value pairs.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogRecord {
    fields: Map<String, Value>,
}

impl LogRecord {
    /// Creates an empty record.
    pub fn new() -> LogRecord {
        LogRecord::default()
    }

    /// Sets the `level` field.
    #[must_use]
    pub fn with_level<T: Into<String>>(mut self, level: T) -> LogRecord {
        self.fields
            .insert("level".to_string(), Value::from(level.into()));
        self
    }

    /// Sets the `message` field.
    #[must_use]
    pub fn with_message<T: Into<String>>(mut self, message: T) -> LogRecord {
        self.fields
            .insert("message".to_string(), Value::from(message.into()));
        self
    }

    /// Attaches an arbitrary extra field.
    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> LogRecord
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The `level` field, if present and a string.
    pub fn level(&self) -> Option<&str> {
        self.fields.get("level").and_then(Value::as_str)
    }

    /// The `message` field, if present and a string.
    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").and_then(Value::as_str)
    }

    /// Looks up any field by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields of the record.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    // Renders a field for the default `<level>: <message>` text. Missing
    // fields render as the literal token `undefined`, which is what webhook
    // consumers of this payload shape have historically been shown.
    fn field_text(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => "undefined".to_string(),
            Some(value) => value.to_string(),
        }
    }
}

impl From<&Record<'_>> for LogRecord {
    fn from(record: &Record) -> Self {
        let mut fields = Map::new();
        fields.insert("level".to_string(), Value::from(record.level().to_string()));
        fields.insert("message".to_string(), Value::from(record.args().to_string()));
        if let Some(module_path) = record.module_path() {
            fields.insert("module_path".to_string(), Value::from(module_path));
        }
        if let Some(file) = record.file() {
            fields.insert("file".to_string(), Value::from(file));
        }
        if let Some(line) = record.line() {
            fields.insert("line".to_string(), Value::from(line));
        }
        let mut visitor = FieldVisitor {
            fields: &mut fields,
        };
        let _ = record.key_values().visit(&mut visitor);
        LogRecord { fields }
    }
}

// Visitor that copies the kv pairs of a log record into the field map.
struct FieldVisitor<'a> {
    fields: &'a mut Map<String, Value>,
}

impl<'kvs> kv::VisitSource<'kvs> for FieldVisitor<'_> {
    fn visit_pair(&mut self, key: kv::Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        self.fields
            .insert(key.to_string(), Value::from(value.to_string()));
        Ok(())
    }
}

/// The message body posted to the webhook: an open mapping whose recognized
/// keys are `text`, `attachments`, `blocks`, `channel`, `username`,
/// `icon_emoji` and `icon_url`. Anything else passes through to the endpoint
/// unvalidated. A key that was never set is absent from the wire body, not
/// null-valued.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MessagePayload {
    fields: Map<String, Value>,
}

impl MessagePayload {
    /// Creates an empty payload.
    pub fn new() -> MessagePayload {
        MessagePayload::default()
    }

    /// Sets the `text` of the message. When `blocks` are also supplied,
    /// Slack uses `text` as the fallback for surfaces that cannot render
    /// blocks.
    #[must_use]
    pub fn with_text<T: Into<String>>(mut self, text: T) -> MessagePayload {
        self.fields
            .insert("text".to_string(), Value::from(text.into()));
        self
    }

    /// Sets the `attachments` of the message.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Value>) -> MessagePayload {
        self.fields
            .insert("attachments".to_string(), Value::from(attachments));
        self
    }

    /// Sets the layout `blocks` of the message.
    #[must_use]
    pub fn with_blocks(mut self, blocks: Vec<Value>) -> MessagePayload {
        self.fields
            .insert("blocks".to_string(), Value::from(blocks));
        self
    }

    /// Sets any key of the payload, recognized or not.
    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> MessagePayload
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Looks up a key of the payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for MessagePayload {
    fn from(fields: Map<String, Value>) -> Self {
        MessagePayload { fields }
    }
}

/// The type alias for a message formatter. Returning `None` suppresses the
/// delivery of that record entirely.
pub type Formatter = dyn Fn(&LogRecord) -> Option<MessagePayload> + Send + Sync + 'static;

/// Observer invoked after a record has been accepted by the webhook, with
/// the record that was delivered.
pub type DeliveredHook = dyn Fn(&LogRecord) + Send + Sync + 'static;

/// Observer invoked after a delivery attempt has failed.
pub type FailedHook = dyn Fn(&DeliveryError) + Send + Sync + 'static;

/// A failed delivery attempt. Failures are only ever reported through the
/// [`SlackLogger::on_failed`] hook; they never reach the logging caller.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The shared HTTP client could not be built from the configured
    /// transport settings.
    #[error("failed to build the webhook http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The POST itself failed: the endpoint was unreachable, the request
    /// timed out, or the response carried a non-success status.
    #[error("post to the webhook failed: {0}")]
    Post(#[source] reqwest::Error),
}

/// The `SlackLogger` implements [`Log`] and provides builder methods to
/// configure where and how records are posted. Construct it with the
/// webhook URL, chain the builder methods, then call `init()` to register
/// it as the global logger.
///
/// Configuration is immutable once built: every delivery reads it, none
/// mutates it. The HTTP client is built lazily on the first delivery and
/// shared by all subsequent ones.
///
/// # Example
/// ```
/// # use slack_logger::SlackLogger;
/// let logger = SlackLogger::new("https://hooks.slack.com/services/T000/B000/XXXX")
///     .with_level(log::LevelFilter::Error)
///     .with_channel("#alerts");
/// ```
pub struct SlackLogger {
    /// The default logging level filter
    level: LevelFilter,

    /// Custom level filters per target
    levels: Vec<(Cow<'static, str>, LevelFilter)>,

    /// Transport name, for diagnostics in the surrounding logging setup
    name: String,

    /// The incoming-webhook URL every accepted record is posted to
    webhook_url: String,

    /// Proxy handed to the client builder, only when set
    proxy: Option<Proxy>,

    /// The shared HTTP client, built on first delivery unless a custom one
    /// was supplied up front
    client: OnceLock<Client>,

    /// Default-payload flags, copied into every payload when set
    unfurl_links: Option<bool>,
    unfurl_media: Option<bool>,
    mrkdwn: Option<bool>,

    /// Default identity overrides, copied into every payload when set
    channel: Option<String>,
    username: Option<String>,
    icon_emoji: Option<String>,
    icon_url: Option<String>,

    formatter: Option<Box<Formatter>>,

    on_delivered: Option<Arc<DeliveredHook>>,
    on_failed: Option<Arc<FailedHook>>,

    /// Echo every payload to console just before posting, to aid debugging.
    echo: bool,
}

impl SlackLogger {
    /// Creates a new `SlackLogger` posting to the given webhook URL. Use
    /// this along with the builder methods and then call `init` to set up
    /// the logger.
    ///
    /// The URL is not validated here; an unusable endpoint surfaces as a
    /// failed delivery on first use, never as a construction failure.
    ///
    /// # Example
    /// ```
    /// # use slack_logger::SlackLogger;
    /// let logger = SlackLogger::new("https://hooks.slack.com/services/T000/B000/XXXX");
    /// ```
    pub fn new<T: Into<String>>(webhook_url: T) -> SlackLogger {
        SlackLogger {
            level: LevelFilter::Trace,
            levels: Vec::new(),
            name: "slack".to_string(),
            webhook_url: webhook_url.into(),
            proxy: None,
            client: OnceLock::new(),
            unfurl_links: None,
            unfurl_media: None,
            mrkdwn: None,
            channel: None,
            username: None,
            icon_emoji: None,
            icon_url: None,
            formatter: None,
            on_delivered: None,
            on_failed: None,
            echo: false,
        }
    }

    /// The maximum log level that would be logged.
    ///
    /// # Example
    /// ```
    /// # use slack_logger::SlackLogger;
    /// # use log::LevelFilter;
    /// let logger = SlackLogger::new("https://hooks.slack.com/services/T000/B000/XXXX")
    ///     .with_level(LevelFilter::Error);
    /// ```
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_level(mut self, level: LevelFilter) -> SlackLogger {
        self.level = level;
        self
    }

    /// A level filter for a specific target and everything beneath it,
    /// overriding the default level. The most recently added matching
    /// override wins.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_level_for<T: Into<Cow<'static, str>>>(
        mut self,
        target: T,
        level: LevelFilter,
    ) -> SlackLogger {
        let target = target.into();

        if let Some((index, _)) = self
            .levels
            .iter()
            .enumerate()
            .find(|(_, (name, _))| *name == target)
        {
            self.levels.remove(index);
        }

        self.levels.push((target, level));
        self
    }

    /// Names this transport, for diagnostics in the surrounding logging
    /// setup. Defaults to `slack`.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_name<T: Into<String>>(mut self, name: T) -> SlackLogger {
        self.name = name.into();
        self
    }

    /// Routes deliveries through a proxy. The proxy is handed to the HTTP
    /// client verbatim when the client is first built.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_proxy(mut self, proxy: Proxy) -> SlackLogger {
        self.proxy = Some(proxy);
        self
    }

    /// Supplies a pre-built HTTP client, replacing the default transport
    /// entirely. Use this to control timeouts, TLS settings, or anything
    /// else the client builder exposes.
    ///
    /// # Example
    /// ```
    /// # use slack_logger::SlackLogger;
    /// # use std::time::Duration;
    /// let client = reqwest::blocking::Client::builder()
    ///     .timeout(Duration::from_secs(5))
    ///     .build()
    ///     .unwrap();
    /// let logger = SlackLogger::new("https://hooks.slack.com/services/T000/B000/XXXX")
    ///     .with_client(client);
    /// ```
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_client(mut self, client: Client) -> SlackLogger {
        self.client = OnceLock::new();
        let _ = self.client.set(client);
        self
    }

    /// Enables or disables link unfurling on every message.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_unfurl_links(mut self, unfurl_links: bool) -> SlackLogger {
        self.unfurl_links = Some(unfurl_links);
        self
    }

    /// Enables or disables media unfurling on every message.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_unfurl_media(mut self, unfurl_media: bool) -> SlackLogger {
        self.unfurl_media = Some(unfurl_media);
        self
    }

    /// Enables or disables `mrkdwn` formatting within attachments and
    /// layout blocks.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_mrkdwn(mut self, mrkdwn: bool) -> SlackLogger {
        self.mrkdwn = Some(mrkdwn);
        self
    }

    /// Overrides the webhook's default channel.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_channel<T: Into<String>>(mut self, channel: T) -> SlackLogger {
        self.channel = Some(channel.into());
        self
    }

    /// Overrides the webhook's default username.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_username<T: Into<String>>(mut self, username: T) -> SlackLogger {
        self.username = Some(username.into());
        self
    }

    /// An emoji code string to use in place of the default icon.
    /// Interchangeable with [`with_icon_url`](Self::with_icon_url).
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_icon_emoji<T: Into<String>>(mut self, icon_emoji: T) -> SlackLogger {
        self.icon_emoji = Some(icon_emoji.into());
        self
    }

    /// An icon image URL to use in place of the default icon.
    /// Interchangeable with [`with_icon_emoji`](Self::with_icon_emoji).
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn with_icon_url<T: Into<String>>(mut self, icon_url: T) -> SlackLogger {
        self.icon_url = Some(icon_url.into());
        self
    }

    /// Sets the formatter of this logger. The closure receives the record
    /// and returns the payload to post, replacing the default
    /// `<level>: <message>` text. Keys the formatter leaves out keep their
    /// configured defaults. Returning `None` suppresses the delivery of
    /// that record entirely.
    ///
    /// # Example
    /// ```
    /// # use slack_logger::{MessagePayload, SlackLogger};
    /// let logger = SlackLogger::new("https://hooks.slack.com/services/T000/B000/XXXX")
    ///     .format(|record| {
    ///         Some(MessagePayload::new().with_text(format!(
    ///             ":rotating_light: {}",
    ///             record.message().unwrap_or_default()
    ///         )))
    ///     });
    /// ```
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn format<F>(mut self, formatter: F) -> SlackLogger
    where
        F: Fn(&LogRecord) -> Option<MessagePayload> + Send + Sync + 'static,
    {
        self.formatter = Some(Box::new(formatter));
        self
    }

    /// Observes successful deliveries. The hook runs on the delivery thread
    /// once the webhook has accepted the message, and receives the record
    /// that was delivered.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn on_delivered<F>(mut self, hook: F) -> SlackLogger
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.on_delivered = Some(Arc::new(hook));
        self
    }

    /// Observes failed deliveries. This is the only place failures are
    /// reported; by default they are dropped silently.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn on_failed<F>(mut self, hook: F) -> SlackLogger
    where
        F: Fn(&DeliveryError) + Send + Sync + 'static,
    {
        self.on_failed = Some(Arc::new(hook));
        self
    }

    /// Writes each payload to console before posting it, use for debugging.
    #[inline]
    #[must_use = "You must call init() before logging"]
    pub fn echo(mut self) -> SlackLogger {
        self.echo = true;
        self
    }

    /// The name of this transport.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This needs to be called after the builder has set up the logger.
    ///
    /// # Example
    /// ```no_run
    /// # use slack_logger::SlackLogger;
    /// SlackLogger::new("https://hooks.slack.com/services/T000/B000/XXXX")
    ///     .init()
    ///     .unwrap();
    /// ```
    pub fn init(self) -> Result<(), SetLoggerError> {
        log::set_max_level(self.level);
        log::set_boxed_logger(Box::new(self))?;
        Ok(())
    }

    /// Builds a payload for the record and posts it to the webhook,
    /// invoking `on_done` exactly once when the attempt has settled.
    ///
    /// The POST happens on its own thread; this method returns without
    /// waiting on network I/O, and concurrent calls do not serialize
    /// against each other. The outcome is only observable through the
    /// [`on_delivered`](Self::on_delivered) and
    /// [`on_failed`](Self::on_failed) hooks: `on_done` carries no
    /// success/failure signal, and nothing is ever propagated to the
    /// caller. When a formatter suppresses the record, no POST is made and
    /// `on_done` still fires.
    pub fn deliver<F>(&self, record: LogRecord, on_done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut payload = self.default_payload();

        match &self.formatter {
            Some(formatter) => match formatter(&record) {
                Some(layout) => {
                    // Whole-key merge: every key the formatter produced
                    // overwrites the default, keys it left out keep theirs.
                    for (key, value) in layout.into_fields() {
                        payload.insert(key, value);
                    }
                }
                None => {
                    on_done();
                    return;
                }
            },
            None => {
                payload.insert(
                    "text".to_string(),
                    Value::from(format!(
                        "{}: {}",
                        record.field_text("level"),
                        record.field_text("message")
                    )),
                );
            }
        }

        let client = match self.client() {
            Ok(client) => client.clone(),
            Err(err) => {
                if let Some(on_failed) = &self.on_failed {
                    on_failed(&err);
                }
                on_done();
                return;
            }
        };

        if self.echo {
            println!(
                "Posting to `{}`\n\t{}",
                self.webhook_url,
                Value::Object(payload.clone())
            );
        }

        let url = self.webhook_url.clone();
        let on_delivered = self.on_delivered.clone();
        let on_failed = self.on_failed.clone();
        thread::spawn(move || {
            let outcome = client
                .post(&url)
                .json(&payload)
                .send()
                .and_then(|response| response.error_for_status());
            match outcome {
                Ok(_) => {
                    if let Some(on_delivered) = &on_delivered {
                        on_delivered(&record);
                    }
                }
                Err(err) => {
                    if let Some(on_failed) = &on_failed {
                        on_failed(&DeliveryError::Post(err));
                    }
                }
            }
            on_done();
        });
    }

    // The payload every delivery starts from: the configured flags and
    // identity overrides under their wire keys. Unset options stay absent,
    // as does `text` until the formatting step fills it in.
    fn default_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        if let Some(unfurl_links) = self.unfurl_links {
            payload.insert("unfurl_links".to_string(), Value::from(unfurl_links));
        }
        if let Some(unfurl_media) = self.unfurl_media {
            payload.insert("unfurl_media".to_string(), Value::from(unfurl_media));
        }
        if let Some(mrkdwn) = self.mrkdwn {
            payload.insert("mrkdwn".to_string(), Value::from(mrkdwn));
        }
        if let Some(channel) = &self.channel {
            payload.insert("channel".to_string(), Value::from(channel.clone()));
        }
        if let Some(username) = &self.username {
            payload.insert("username".to_string(), Value::from(username.clone()));
        }
        if let Some(icon_emoji) = &self.icon_emoji {
            payload.insert("icon_emoji".to_string(), Value::from(icon_emoji.clone()));
        }
        if let Some(icon_url) = &self.icon_url {
            payload.insert("icon_url".to_string(), Value::from(icon_url.clone()));
        }
        payload
    }

    // Returns the shared client, building it on first use. Only the proxy
    // setting is copied in, and only when one was configured. A client that
    // cannot be built is reported as a delivery failure, not cached.
    fn client(&self) -> Result<&Client, DeliveryError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let mut builder = Client::builder();
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy.clone());
        }
        let client = builder.build().map_err(DeliveryError::Client)?;
        Ok(self.client.get_or_init(|| client))
    }

    fn level_for(&self, target: &str) -> LevelFilter {
        for (name, level) in self.levels.iter().rev() {
            let name: &str = name;
            if target == name
                || (target.starts_with(name) && target[name.len()..].starts_with("::"))
            {
                return *level;
            }
        }
        self.level
    }
}

impl Log for SlackLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.deliver(LogRecord::from(record), || {});
        }
    }

    // Nothing is buffered; every accepted record is already in flight.
    fn flush(&self) {}
}
