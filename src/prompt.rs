//! Operator interaction.
//!
//! Every question the updater asks goes through [`Prompter`], so the decision
//! logic can be driven by scripted answers in tests. Confirmations follow the
//! `[Y/n]` convention where an empty answer accepts.

use crate::output;
use dialoguer::Input;

/// Answer to a `[Y/n]` question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    /// Operator just pressed enter.
    DefaultYes,
}

impl Confirmation {
    /// Interprets a typed answer. Only an empty answer, `y` or `yes`
    /// (any case) accept; everything else declines.
    #[must_use]
    pub fn parse(answer: &str) -> Self {
        let answer = answer.trim();
        if answer.is_empty() {
            Confirmation::DefaultYes
        } else if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
            Confirmation::Yes
        } else {
            Confirmation::No
        }
    }

    #[must_use]
    pub fn accepted(self) -> bool {
        matches!(self, Confirmation::Yes | Confirmation::DefaultYes)
    }
}

/// Outcome of picking from an enumerated list that ends with a skip entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Empty answer: keep the proposed default.
    Default,
    Index(usize),
    /// The entry one past the last option.
    Skip,
}

/// Source of operator answers.
pub trait Prompter {
    /// Reads one line of free text. An empty string is a valid answer.
    fn input(&mut self, prompt: &str) -> anyhow::Result<String>;

    fn confirm(&mut self, prompt: &str) -> anyhow::Result<Confirmation> {
        let answer = self.input(&format!("{prompt} [Y/n]"))?;
        Ok(Confirmation::parse(&answer))
    }
}

/// Reads answers from the terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str) -> anyhow::Result<String> {
        let answer: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }
}

/// Asks until the operator picks one of `count` options, the skip entry
/// (index `count`) or the default. Bad answers reprompt.
pub fn choose(prompter: &mut dyn Prompter, prompt: &str, count: usize) -> anyhow::Result<Choice> {
    loop {
        let answer = prompter.input(prompt)?;
        match parse_choice(&answer, count) {
            Ok(choice) => return Ok(choice),
            Err(ChoiceError::NotANumber) => output::warning("Use the number!"),
            Err(ChoiceError::OutOfRange) => output::warning("Not a valid selection. Try again."),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ChoiceError {
    NotANumber,
    OutOfRange,
}

fn parse_choice(answer: &str, count: usize) -> Result<Choice, ChoiceError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(Choice::Default);
    }
    let selection = answer
        .parse::<usize>()
        .map_err(|_| ChoiceError::NotANumber)?;
    match selection {
        s if s == count => Ok(Choice::Skip),
        s if s < count => Ok(Choice::Index(s)),
        _ => Err(ChoiceError::OutOfRange),
    }
}
