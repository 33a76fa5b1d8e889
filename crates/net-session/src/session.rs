//! Device session with dialect negotiation

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;

use netprov_core::{
    CommandSet, ConnectionError, DeviceProfile, Dialect, NetworkError, Result, ShowRow,
};

use crate::parser::{ShowParser, TextParser};
use crate::transport::{Transport, TransportConnector, TransportError};

/// Marker in `show version` output identifying the Nexus platform family
pub const NEXUS_SIGNATURE: &str = "Nexus";

const SSH_PORT: u16 = 22;
const TELNET_PORT: u16 = 23;

/// Wait bounds applied to every exchange with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(100),
            connect_timeout: Duration::from_secs(20),
        }
    }
}

/// Output of a show command
#[derive(Debug, Clone, PartialEq)]
pub enum ShowOutput {
    Text(String),
    Rows(Vec<ShowRow>),
}

impl ShowOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ShowOutput::Text(text) => Some(text),
            ShowOutput::Rows(_) => None,
        }
    }

    pub fn rows(&self) -> Option<&[ShowRow]> {
        match self {
            ShowOutput::Rows(rows) => Some(rows),
            ShowOutput::Text(_) => None,
        }
    }
}

/// Live command channel to one device.
///
/// A session executes one command at a time; every operation takes
/// `&mut self`. The dialect is fixed once [`connect`](Self::connect)
/// returns.
pub struct DeviceSession {
    profile: DeviceProfile,
    transport: Option<Box<dyn Transport>>,
    options: SessionOptions,
    parser: Arc<dyn ShowParser>,
}

impl DeviceSession {
    /// Connect with default wait bounds
    pub async fn connect(
        connector: Arc<dyn TransportConnector>,
        profile: DeviceProfile,
    ) -> std::result::Result<Self, ConnectionError> {
        Self::connect_with(connector, profile, SessionOptions::default()).await
    }

    /// Open a session, resolving the dialect on the way.
    ///
    /// The profile's dialect is tried first and probed with `show version`.
    /// A Nexus signature in the probe output triggers one reconnect as
    /// `cisco_nxos`. A connect that times out or is refused triggers one
    /// attempt over telnet. Authentication failures end the attempt
    /// immediately.
    pub async fn connect_with(
        connector: Arc<dyn TransportConnector>,
        mut profile: DeviceProfile,
        options: SessionOptions,
    ) -> std::result::Result<Self, ConnectionError> {
        log::info!("Connecting to {} as {}", profile.host, profile.dialect);

        let mut transport = match open(connector.as_ref(), &profile, options).await {
            Ok(transport) => transport,
            Err(e) if e.allows_fallback() && !profile.dialect.is_telnet() => {
                log::warn!(
                    "Connection to {} failed ({}), falling back to {}",
                    profile.host,
                    e,
                    Dialect::CiscoIosTelnet
                );
                profile.dialect = Dialect::CiscoIosTelnet;
                if profile.port == SSH_PORT {
                    profile.port = TELNET_PORT;
                }
                let transport = open(connector.as_ref(), &profile, options)
                    .await
                    .map_err(|e| e.into_connection_error(&profile.host))?;
                return Ok(Self::established(profile, transport, options));
            }
            Err(e) => {
                log::error!("Connection to {} failed: {}", profile.host, e);
                return Err(e.into_connection_error(&profile.host));
            }
        };

        if profile.dialect != Dialect::CiscoNxos {
            let probe = bounded(
                options.command_timeout,
                transport.send_command(profile.dialect.version_command(), options.command_timeout),
            )
            .await
            .map_err(|e| e.into_connection_error(&profile.host))?;

            if probe.contains(NEXUS_SIGNATURE) {
                log::info!(
                    "{} reports a Nexus platform, reconnecting as {}",
                    profile.host,
                    Dialect::CiscoNxos
                );
                if let Err(e) = transport.disconnect().await {
                    log::warn!("Failed to close probe session to {}: {}", profile.host, e);
                }
                profile.dialect = Dialect::CiscoNxos;
                transport = open(connector.as_ref(), &profile, options)
                    .await
                    .map_err(|e| e.into_connection_error(&profile.host))?;
            }
        }

        Ok(Self::established(profile, transport, options))
    }

    fn established(
        profile: DeviceProfile,
        transport: Box<dyn Transport>,
        options: SessionOptions,
    ) -> Self {
        log::info!("Connected to {} ({})", profile.host, profile.dialect);
        Self {
            profile,
            transport: Some(transport),
            options,
            parser: Arc::new(TextParser),
        }
    }

    /// Replace the structured-output parser
    pub fn with_parser(mut self, parser: Arc<dyn ShowParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.profile.dialect
    }

    pub fn host(&self) -> &str {
        &self.profile.host
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Run a read-only command. With `structured`, output is parsed into
    /// rows when a grammar for the command exists and returned as text
    /// otherwise.
    pub async fn run_show(&mut self, command: &str, structured: bool) -> Result<ShowOutput> {
        let timeout = self.options.command_timeout;
        let host = self.profile.host.clone();
        let transport = self
            .transport
            .as_mut()
            .ok_or(ConnectionError::NotConnected)?;

        log::debug!("{}: {}", host, command);
        let text = bounded(timeout, transport.send_command(command, timeout))
            .await
            .map_err(|e| command_error(e, command, timeout, &host))?;

        if !structured {
            return Ok(ShowOutput::Text(text));
        }
        match self.parser.parse(self.profile.dialect, command, &text) {
            Some(rows) => Ok(ShowOutput::Rows(rows)),
            None => {
                log::debug!("No grammar for '{}', returning raw text", command);
                Ok(ShowOutput::Text(text))
            }
        }
    }

    pub async fn show_text(&mut self, command: &str) -> Result<String> {
        match self.run_show(command, false).await? {
            ShowOutput::Text(text) => Ok(text),
            ShowOutput::Rows(_) => Ok(String::new()),
        }
    }

    /// Structured rows; an unparsable answer yields no rows
    pub async fn show_rows(&mut self, command: &str) -> Result<Vec<ShowRow>> {
        match self.run_show(command, true).await? {
            ShowOutput::Rows(rows) => Ok(rows),
            ShowOutput::Text(text) => {
                if !text.trim().is_empty() {
                    log::warn!("'{}' output could not be parsed into rows", command);
                }
                Ok(Vec::new())
            }
        }
    }

    /// Push a configuration batch. Blank lines are dropped; an empty batch
    /// is not sent at all. A failure part-way through is not detected.
    pub async fn run_config(&mut self, commands: &CommandSet) -> Result<String> {
        let lines = commands.executable();
        if lines.is_empty() {
            log::debug!("Empty configuration batch, nothing sent");
            return Ok(String::new());
        }

        let timeout = self.options.command_timeout;
        let host = self.profile.host.clone();
        let transport = self
            .transport
            .as_mut()
            .ok_or(ConnectionError::NotConnected)?;

        log::debug!("{}: sending {} configuration lines", host, lines.len());
        for line in &lines {
            log::debug!("{}(config): {}", host, line);
        }
        bounded(timeout, transport.send_config_set(&lines, timeout))
            .await
            .map_err(|e| command_error(e, "configuration batch", timeout, &host))
    }

    /// Entire running configuration
    pub async fn full_config(&mut self, structured: bool) -> Result<ShowOutput> {
        let command = self.profile.dialect.running_config_command();
        self.run_show(command, structured).await
    }

    /// Hostname from the running configuration
    pub async fn hostname(&mut self) -> Result<Option<String>> {
        let config = match self.full_config(false).await? {
            ShowOutput::Text(text) => text,
            ShowOutput::Rows(_) => return Ok(None),
        };
        Ok(hostname_regex()
            .captures(&config)
            .map(|caps| caps[1].to_string()))
    }

    /// Configuration stanza of one interface, starting at its `interface`
    /// line.
    pub async fn interface_config(&mut self, name: &str) -> Result<String> {
        let command = format!("{} interface {}", self.profile.dialect.running_config_command(), name);
        let output = self.show_text(&command).await?;
        extract_stanza(&output).ok_or_else(|| NetworkError::not_found(format!("interface {}", name)))
    }

    /// Close the channel. Safe to call more than once.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut transport) = self.transport.take() {
            log::info!("Disconnecting from {}", self.profile.host);
            transport
                .disconnect()
                .await
                .map_err(|e| e.into_connection_error(&self.profile.host))?;
        }
        Ok(())
    }
}

async fn open(
    connector: &dyn TransportConnector,
    profile: &DeviceProfile,
    options: SessionOptions,
) -> std::result::Result<Box<dyn Transport>, TransportError> {
    log::debug!("Opening {} transport to {}", profile.dialect, profile.address());
    bounded(options.connect_timeout, connector.connect(profile)).await
}

/// Apply a wait bound to one transport call
async fn bounded<T, F>(limit: Duration, call: F) -> std::result::Result<T, TransportError>
where
    F: Future<Output = std::result::Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(format!(
            "no answer within {}s",
            limit.as_secs()
        ))),
    }
}

fn command_error(err: TransportError, command: &str, timeout: Duration, host: &str) -> NetworkError {
    if err.is_timeout() {
        log::error!("{}: '{}' timed out", host, command);
        ConnectionError::ReadTimeout {
            command: command.to_string(),
            seconds: timeout.as_secs(),
        }
        .into()
    } else {
        err.into_connection_error(host).into()
    }
}

fn hostname_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^hostname\s+(\S+)").expect("valid hostname regex"))
}

/// Text from the first `interface` keyword, without the trailing `end`
pub(crate) fn extract_stanza(output: &str) -> Option<String> {
    let start = output.find("interface")?;
    let mut lines: Vec<&str> = output[start..]
        .lines()
        .map(|line| line.trim_end())
        .collect();
    while lines
        .last()
        .is_some_and(|last| last.is_empty() || *last == "end")
    {
        lines.pop();
    }
    Some(lines.join("\n"))
}
