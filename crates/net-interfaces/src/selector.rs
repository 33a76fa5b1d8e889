//! Operator choice collaborator

/// Lets the operator pick from a list and answer yes/no questions.
pub trait Selector: Send {
    /// Index into `items`, or `None` to go back to the previous menu
    fn select(&mut self, heading: &str, items: &[String]) -> Option<usize>;

    fn confirm(&mut self, question: &str) -> bool;
}

/// Non-interactive selector replaying fixed answers
#[derive(Debug, Clone, Default)]
pub struct FixedSelector {
    picks: Vec<Option<usize>>,
    confirm: bool,
}

impl FixedSelector {
    pub fn new(picks: Vec<Option<usize>>, confirm: bool) -> Self {
        Self { picks, confirm }
    }
}

impl Selector for FixedSelector {
    fn select(&mut self, _heading: &str, items: &[String]) -> Option<usize> {
        if self.picks.is_empty() {
            return None;
        }
        self.picks.remove(0).filter(|index| *index < items.len())
    }

    fn confirm(&mut self, _question: &str) -> bool {
        self.confirm
    }
}
