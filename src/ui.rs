use console::{style, Term};
use std::{env, fmt::Display};

use crate::result::{ExecutionStatus, MutationResult};

/// Routes human-readable output.
///
/// In normal mode humans read stdout and errors go to stderr. In
/// `--json` mode stdout must stay machine-readable, so every human line
/// moves to stderr. Styling activates only when the stream we actually
/// write to is a TTY and neither NO_COLOR nor CI is set.
#[derive(Debug, Clone)]
pub struct Ui {
    human: Term,
    errors: Term,
    styled: bool,
    muted: bool,
}

impl Ui {
    pub fn new(json: bool) -> Self {
        let human = if json { Term::stderr() } else { Term::stdout() };
        let errors = Term::stderr();
        let styled = human.is_term()
            && env::var_os("NO_COLOR").is_none()
            && env::var_os("CI").is_none();

        Self {
            human,
            errors,
            styled,
            muted: false,
        }
    }

    /// Swallows everything; keeps unit tests quiet.
    #[cfg(test)]
    pub fn silent() -> Self {
        Self {
            human: Term::stdout(),
            errors: Term::stderr(),
            styled: false,
            muted: true,
        }
    }

    pub fn line(&self, msg: impl Display) {
        if !self.muted {
            let _ = self.human.write_line(&msg.to_string());
        }
    }

    pub fn title(&self, msg: impl Display) {
        let s = msg.to_string();
        self.line(if self.styled {
            style(s).bold().to_string()
        } else {
            s
        });
    }

    pub fn warn(&self, msg: impl Display) {
        self.to_stderr(msg, |s| style(s).yellow().to_string());
    }

    pub fn error(&self, msg: impl Display) {
        self.to_stderr(msg, |s| style(s).red().bold().to_string());
    }

    fn to_stderr(&self, msg: impl Display, decorate: impl Fn(String) -> String) {
        if self.muted {
            return;
        }
        let s = msg.to_string();
        let s = if self.styled { decorate(s) } else { s };
        let _ = self.errors.write_line(&s);
    }

    /// One line per executed mutant, coloured by verdict in styled mode.
    pub fn mutant_line(&self, mutant: &MutationResult) {
        let location = match &mutant.point.location {
            Some(l) => format!("{}:{}:{}", l.path.display(), l.line, l.column),
            None => "<no location>".to_string(),
        };

        let verdict = match mutant.result.status {
            ExecutionStatus::Failed => "killed",
            ExecutionStatus::Passed => "survived",
            ExecutionStatus::Invalid => "invalid",
        };

        if !self.styled {
            self.line(format!("{verdict} {} at {location}", mutant.point.operator));
            return;
        }

        let tag = match mutant.result.status {
            ExecutionStatus::Failed => style("KILLED").red().bold(),
            ExecutionStatus::Passed => style("SURVIVED").green().bold(),
            ExecutionStatus::Invalid => style("INVALID").yellow().bold(),
        };

        self.line(format!(
            "{tag} {} at {location} ({}ns)",
            mutant.point.operator, mutant.result.time_ns
        ));
    }

    #[allow(dead_code)]
    pub fn is_styled(&self) -> bool {
        self.styled && !self.muted
    }
}
