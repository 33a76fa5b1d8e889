use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One parsed row of structured show output, field name to value.
pub type ShowRow = IndexMap<String, String>;

/// Ordered device command lines produced by rendering a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSet {
    lines: Vec<String>,
}

impl CommandSet {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Split rendered template text on `\n`. Trailing empty lines are kept.
    pub fn from_rendered(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(|line| line.trim_end_matches('\r').to_string()).collect(),
        }
    }

    pub fn single(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines that actually need to reach the device
    pub fn executable(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<Vec<String>> for CommandSet {
    fn from(lines: Vec<String>) -> Self {
        Self::new(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_blank_lines_are_preserved() {
        let commands = CommandSet::from_rendered("interface Loopback1\nno shutdown\n\n");
        assert_eq!(commands.len(), 4);
        assert_eq!(commands.lines()[3], "");
        assert_eq!(
            commands.executable(),
            vec!["interface Loopback1".to_string(), "no shutdown".to_string()]
        );
    }
}
