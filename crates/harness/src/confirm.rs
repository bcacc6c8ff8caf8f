use std::cell::RefCell;
use std::collections::VecDeque;

use agrodesk_engine::Confirm;

/// Answers confirmation prompts from a script and records what was asked.
/// Once the script runs out every prompt is declined.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: RefCell<VecDeque<bool>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new([true])
    }

    pub fn declining() -> Self {
        Self::new([false])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or(false)
    }
}
