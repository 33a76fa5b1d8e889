//! Terminal interaction: menus, questions and credentials

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

use anyhow::{Context, Result};

use netprov_interfaces::Selector;

/// Environment variable consulted before prompting for the device password
pub const PASSWORD_ENV: &str = "NETPROV_PASSWORD";

/// Numbered-menu selector on a line-oriented terminal.
///
/// Entering `q`, an empty line, anything that is not a number, or closing
/// the input goes back to the previous menu.
pub struct ConsoleSelector<R, W> {
    input: R,
    output: W,
}

impl ConsoleSelector<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn read_answer(&mut self, prompt: &str) -> Option<String> {
        write!(self.output, "{}", prompt).ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Selector for ConsoleSelector<R, W> {
    fn select(&mut self, heading: &str, items: &[String]) -> Option<usize> {
        let _ = writeln!(self.output, "{}:", heading);
        for (index, item) in items.iter().enumerate() {
            let _ = writeln!(self.output, "  {}. {}", index + 1, item);
        }

        loop {
            let answer = self.read_answer("Select a number (q to go back): ")?;
            let choice: usize = answer.parse().ok()?;
            if (1..=items.len()).contains(&choice) {
                return Some(choice - 1);
            }
            let _ = writeln!(self.output, "Choose between 1 and {}", items.len());
        }
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.read_answer(&format!("{} [y/N]: ", question))
            .map(|answer| answer.to_ascii_lowercase().starts_with('y'))
            .unwrap_or(false)
    }
}

/// Username from the command line, the settings, or a prompt
pub fn resolve_username(flag: Option<String>, configured: Option<String>) -> Result<String> {
    if let Some(username) = flag.or(configured).filter(|name| !name.trim().is_empty()) {
        return Ok(username);
    }

    print!("Username: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read username")?;
    let username = line.trim().to_string();
    if username.is_empty() {
        anyhow::bail!("A username is required");
    }
    Ok(username)
}

/// Device password from the environment or a hidden prompt
pub fn resolve_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        log::debug!("Using device password from {}", PASSWORD_ENV);
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}
