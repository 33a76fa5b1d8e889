//! Telnet transport for the legacy dialect

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use netprov_core::DeviceProfile;

use crate::prompt::{clean_output, ends_with_any, ends_with_prompt, is_login_failure, is_privileged};
use crate::transport::{Transport, TransportConnector, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const USERNAME_PROMPTS: &[&str] = &["username:", "login:"];
const PASSWORD_PROMPTS: &[&str] = &["password:"];

/// Opens telnet sessions and logs in with the profile credentials.
#[derive(Debug, Clone)]
pub struct TelnetConnector {
    login_timeout: Duration,
}

impl TelnetConnector {
    pub fn new(login_timeout: Duration) -> Self {
        Self { login_timeout }
    }
}

impl Default for TelnetConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl TransportConnector for TelnetConnector {
    async fn connect(&self, profile: &DeviceProfile) -> Result<Box<dyn Transport>, TransportError> {
        log::debug!("Opening telnet connection to {}", profile.address());
        let stream = TcpStream::connect(profile.address()).await?;
        let mut transport = TelnetTransport::new(stream);
        transport.login(profile, self.login_timeout).await?;
        Ok(Box::new(transport))
    }
}

/// Negotiation state carried between reads
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Negotiation {
    #[default]
    Data,
    Command,
    Option(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Strips telnet option negotiation from the byte stream and refuses every
/// option the peer proposes.
#[derive(Debug, Default)]
struct NegotiationFilter {
    state: Negotiation,
}

impl NegotiationFilter {
    /// Returns (payload, replies to send back)
    fn feed(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(input.len());
        let mut replies = Vec::new();

        for &byte in input {
            self.state = match self.state {
                Negotiation::Data if byte == IAC => Negotiation::Command,
                Negotiation::Data => {
                    data.push(byte);
                    Negotiation::Data
                }
                Negotiation::Command => match byte {
                    IAC => {
                        data.push(IAC);
                        Negotiation::Data
                    }
                    DO | DONT | WILL | WONT => Negotiation::Option(byte),
                    SB => Negotiation::Subnegotiation,
                    _ => Negotiation::Data,
                },
                Negotiation::Option(verb) => {
                    match verb {
                        DO => replies.extend_from_slice(&[IAC, WONT, byte]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, byte]),
                        _ => {}
                    }
                    Negotiation::Data
                }
                Negotiation::Subnegotiation if byte == IAC => Negotiation::SubnegotiationIac,
                Negotiation::Subnegotiation => Negotiation::Subnegotiation,
                Negotiation::SubnegotiationIac if byte == SE => Negotiation::Data,
                Negotiation::SubnegotiationIac => Negotiation::Subnegotiation,
            };
        }

        (data, replies)
    }
}

pub struct TelnetTransport {
    stream: TcpStream,
    filter: NegotiationFilter,
}

impl TelnetTransport {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            filter: NegotiationFilter::default(),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.stream.write_all(format!("{}\r\n", line).as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read until `done` accepts the accumulated text or `timeout` elapses
    async fn read_until<F>(&mut self, timeout: Duration, done: F) -> Result<String, TransportError>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut received: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            // Decode the whole stream so characters split across reads survive
            let text = String::from_utf8_lossy(&received).into_owned();
            if done(&text) {
                return Ok(text);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(format!(
                    "no prompt after {}s",
                    timeout.as_secs()
                )));
            }

            let read = tokio::time::timeout(remaining, self.stream.read(&mut chunk))
                .await
                .map_err(|_| {
                    TransportError::Timeout(format!("no prompt after {}s", timeout.as_secs()))
                })??;
            if read == 0 {
                return Err(TransportError::Protocol(
                    "connection closed by device".to_string(),
                ));
            }

            let (data, replies) = self.filter.feed(&chunk[..read]);
            if !replies.is_empty() {
                self.stream.write_all(&replies).await?;
            }
            received.extend_from_slice(&data);
        }
    }

    async fn read_prompt(&mut self, timeout: Duration) -> Result<String, TransportError> {
        self.read_until(timeout, ends_with_prompt).await
    }

    async fn login(&mut self, profile: &DeviceProfile, timeout: Duration) -> Result<(), TransportError> {
        let banner = self
            .read_until(timeout, |text| {
                ends_with_any(text, USERNAME_PROMPTS)
                    || ends_with_any(text, PASSWORD_PROMPTS)
                    || ends_with_prompt(text)
            })
            .await?;

        let mut current = banner;
        if ends_with_any(&current, USERNAME_PROMPTS) {
            self.write_line(&profile.username).await?;
            current = self
                .read_until(timeout, |text| {
                    ends_with_any(text, PASSWORD_PROMPTS) || ends_with_prompt(text)
                })
                .await?;
        }
        if ends_with_any(&current, PASSWORD_PROMPTS) {
            self.write_line(&profile.password).await?;
            current = self
                .read_until(timeout, |text| {
                    is_login_failure(text)
                        || ends_with_any(text, USERNAME_PROMPTS)
                        || ends_with_prompt(text)
                })
                .await?;
        }
        if is_login_failure(&current) || ends_with_any(&current, USERNAME_PROMPTS) {
            return Err(TransportError::Authentication(format!(
                "login rejected for {}",
                profile.username
            )));
        }

        if !is_privileged(&current) {
            self.write_line("enable").await?;
            let reply = self
                .read_until(timeout, |text| {
                    ends_with_any(text, PASSWORD_PROMPTS) || ends_with_prompt(text)
                })
                .await?;
            if ends_with_any(&reply, PASSWORD_PROMPTS) {
                self.write_line(&profile.password).await?;
                let reply = self.read_prompt(timeout).await?;
                if !is_privileged(&reply) {
                    return Err(TransportError::Authentication(
                        "enable password rejected".to_string(),
                    ));
                }
            }
        }

        self.write_line("terminal length 0").await?;
        self.read_prompt(timeout).await?;
        log::debug!("Telnet login to {} complete", profile.host);
        Ok(())
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    async fn send_command(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        self.write_line(command).await?;
        let raw = self.read_prompt(timeout).await?;
        Ok(clean_output(&raw, command))
    }

    async fn send_config_set(
        &mut self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let mut transcript = Vec::with_capacity(commands.len() + 2);
        transcript.push(self.send_command("configure terminal", timeout).await?);
        for command in commands {
            transcript.push(self.send_command(command, timeout).await?);
        }
        transcript.push(self.send_command("end", timeout).await?);
        Ok(transcript
            .into_iter()
            .filter(|output| !output.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let _ = self.write_line("exit").await;
        self.stream.shutdown().await?;
        Ok(())
    }
}
