//! SSH transport backed by libssh2
//!
//! libssh2 is blocking, so every exchange runs on the blocking thread pool
//! with the shell channel moved in and handed back afterwards.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use netprov_core::DeviceProfile;

use crate::prompt::{clean_output, ends_with_prompt, is_privileged};
use crate::transport::{Transport, TransportConnector, TransportError};

/// Keyboard-interactive handler that answers every prompt with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SshConnector {
    connect_timeout: Duration,
}

impl SshConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl TransportConnector for SshConnector {
    async fn connect(&self, profile: &DeviceProfile) -> Result<Box<dyn Transport>, TransportError> {
        let profile = profile.clone();
        let timeout = self.connect_timeout;
        let shell = tokio::task::spawn_blocking(move || open_shell(&profile, timeout))
            .await
            .map_err(|e| TransportError::Protocol(format!("SSH worker failed: {}", e)))??;
        Ok(Box::new(SshTransport { shell: Some(shell) }))
    }
}

struct Shell {
    session: ssh2::Session,
    channel: ssh2::Channel,
}

fn ssh_error(err: ssh2::Error) -> TransportError {
    match err.code() {
        // LIBSSH2_ERROR_TIMEOUT
        ssh2::ErrorCode::Session(-9) => TransportError::Timeout(err.message().to_string()),
        _ => TransportError::Protocol(err.message().to_string()),
    }
}

fn open_shell(profile: &DeviceProfile, timeout: Duration) -> Result<Shell, TransportError> {
    let addr = profile
        .address()
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| TransportError::Protocol(format!("cannot resolve {}", profile.host)))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)?;

    let mut session = ssh2::Session::new().map_err(ssh_error)?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis() as u32);
    session.handshake().map_err(ssh_error)?;

    if session
        .userauth_password(&profile.username, &profile.password)
        .is_err()
    {
        let mut prompter = PasswordPrompt {
            password: profile.password.clone(),
        };
        let _ = session.userauth_keyboard_interactive(&profile.username, &mut prompter);
    }
    if !session.authenticated() {
        return Err(TransportError::Authentication(format!(
            "all methods exhausted for {}",
            profile.username
        )));
    }

    let mut channel = session.channel_session().map_err(ssh_error)?;
    channel
        .request_pty("vt100", None, Some((511, 24, 0, 0)))
        .map_err(ssh_error)?;
    channel.shell().map_err(ssh_error)?;

    let mut shell = Shell { session, channel };
    let greeting = read_prompt(&mut shell, timeout)?;
    if !is_privileged(&greeting) {
        write_line(&mut shell, "enable")?;
        let reply = read_until(&mut shell, timeout, |text| {
            text.trim_end().to_ascii_lowercase().ends_with("password:") || ends_with_prompt(text)
        })?;
        if !ends_with_prompt(&reply) {
            write_line(&mut shell, &profile.password)?;
            read_prompt(&mut shell, timeout)?;
        }
    }
    write_line(&mut shell, "terminal length 0")?;
    read_prompt(&mut shell, timeout)?;

    log::debug!("SSH shell to {} ready", profile.host);
    Ok(shell)
}

fn write_line(shell: &mut Shell, line: &str) -> Result<(), TransportError> {
    shell.channel.write_all(format!("{}\n", line).as_bytes())?;
    shell.channel.flush()?;
    Ok(())
}

fn read_until<F>(shell: &mut Shell, timeout: Duration, done: F) -> Result<String, TransportError>
where
    F: Fn(&str) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut buffer = String::new();
    let mut chunk = [0u8; 4096];

    // short poll so the deadline is honoured between reads
    shell.session.set_timeout(500);
    loop {
        if done(&buffer) {
            return Ok(buffer);
        }
        if Instant::now() >= deadline {
            return Err(TransportError::Timeout(format!(
                "no prompt after {}s",
                timeout.as_secs()
            )));
        }
        match shell.channel.read(&mut chunk) {
            Ok(0) if shell.channel.eof() => {
                return Err(TransportError::Protocol("channel closed by device".to_string()))
            }
            Ok(read) => buffer.push_str(&String::from_utf8_lossy(&chunk[..read])),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_prompt(shell: &mut Shell, timeout: Duration) -> Result<String, TransportError> {
    read_until(shell, timeout, ends_with_prompt)
}

fn exchange(shell: &mut Shell, command: &str, timeout: Duration) -> Result<String, TransportError> {
    write_line(shell, command)?;
    let raw = read_prompt(shell, timeout)?;
    Ok(clean_output(&raw, command))
}

pub struct SshTransport {
    shell: Option<Shell>,
}

impl SshTransport {
    /// Run `work` against the shell on the blocking pool
    async fn with_shell<T, F>(&mut self, work: F) -> Result<T, TransportError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Shell) -> Result<T, TransportError> + Send + 'static,
    {
        let mut shell = self
            .shell
            .take()
            .ok_or_else(|| TransportError::Protocol("SSH shell already closed".to_string()))?;
        let (shell, result) = tokio::task::spawn_blocking(move || {
            let result = work(&mut shell);
            (shell, result)
        })
        .await
        .map_err(|e| TransportError::Protocol(format!("SSH worker failed: {}", e)))?;
        self.shell = Some(shell);
        result
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn send_command(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let command = command.to_string();
        self.with_shell(move |shell| exchange(shell, &command, timeout))
            .await
    }

    async fn send_config_set(
        &mut self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let commands = commands.to_vec();
        self.with_shell(move |shell| {
            let mut transcript = vec![exchange(shell, "configure terminal", timeout)?];
            for command in &commands {
                transcript.push(exchange(shell, command, timeout)?);
            }
            transcript.push(exchange(shell, "end", timeout)?);
            Ok(transcript
                .into_iter()
                .filter(|output| !output.is_empty())
                .collect::<Vec<_>>()
                .join("\n"))
        })
        .await
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(mut shell) = self.shell.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || {
            let _ = write_line(&mut shell, "exit");
            let _ = shell.channel.close();
            shell
                .session
                .disconnect(None, "closing", None)
                .map_err(ssh_error)
        })
        .await
        .map_err(|e| TransportError::Protocol(format!("SSH worker failed: {}", e)))?
    }
}
