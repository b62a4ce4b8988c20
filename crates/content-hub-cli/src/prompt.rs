use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Mutex;

use colored::Colorize;

use content_hub_core::{Interaction, SignInReason};

/// Answers engine questions on the terminal.
///
/// Without a terminal on stdin nothing is asked: sign-in is declined and
/// confirmations fall back to `assume_yes`.
pub struct TerminalInteraction {
    assume_yes: bool,
    interactive: bool,
    lock: Mutex<()>,
}

impl TerminalInteraction {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            interactive: io::stdin().is_terminal(),
            lock: Mutex::new(()),
        }
    }

    fn ask(&self, question: &str) -> bool {
        let answer = self.read_answer(&format!("{} [y/N] ", question));
        matches!(
            answer.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("y") | Some("yes")
        )
    }

    fn read_answer(&self, prompt: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        print!("{}", prompt);
        io::stdout().flush().ok()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input).ok()?;
        Some(input.trim().to_string())
    }

    fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        self.interactive && self.ask(question)
    }
}

impl Interaction for TerminalInteraction {
    fn offer_sign_in(&self, reason: &SignInReason) -> bool {
        if !self.interactive {
            return false;
        }
        let why = match reason {
            SignInReason::NoCredentials => {
                "No GitHub credentials found; anonymous requests are rate limited.".to_string()
            }
            SignInReason::AuthFailed { target, status } => {
                format!("{} rejected the request (HTTP {}).", target, status)
            }
            SignInReason::RateLimited { reset_at: Some(at) } => format!(
                "GitHub API rate limit exceeded until {}.",
                at.format("%H:%M:%S UTC")
            ),
            SignInReason::RateLimited { reset_at: None } => {
                "GitHub API rate limit exceeded.".to_string()
            }
        };
        println!("{} {}", "[AUTH]".yellow().bold(), why);
        self.ask("Sign in with the GitHub CLI?")
    }

    fn confirm_overwrite(&self, path: &Path) -> bool {
        self.confirm(&format!("{} exists. Overwrite?", path.display()))
    }

    fn confirm_replace_dir(&self, path: &Path) -> bool {
        self.confirm(&format!(
            "{} exists. Remove it and download again?",
            path.display()
        ))
    }

    fn choose_filename(&self, suggested: &str) -> Option<String> {
        if self.assume_yes || !self.interactive {
            return Some(suggested.to_string());
        }
        let answer = self.read_answer(&format!("Save as [{}]: ", suggested.cyan()))?;
        if answer.is_empty() {
            Some(suggested.to_string())
        } else {
            Some(answer)
        }
    }
}
