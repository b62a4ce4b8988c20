//! User decisions the engine needs but does not render itself
//!
//! Front ends implement [`Interaction`]; the engine only asks questions.

use std::path::Path;

use chrono::{DateTime, Utc};

/// Why a sign-in is being offered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInReason {
    /// No credential is available before the first bulk fetch
    NoCredentials,
    /// The host answered 401/403 for `target`
    AuthFailed { target: String, status: u16 },
    /// The unauthenticated quota ran out
    RateLimited { reset_at: Option<DateTime<Utc>> },
}

pub trait Interaction: Send + Sync {
    /// Offer an interactive sign-in. `true` means the user wants to sign in.
    fn offer_sign_in(&self, reason: &SignInReason) -> bool;

    /// Confirm replacing an existing file
    fn confirm_overwrite(&self, path: &Path) -> bool;

    /// Confirm removing and recreating an existing bundle folder
    fn confirm_replace_dir(&self, path: &Path) -> bool;

    /// Filename to save a single file under; `None` cancels the download
    fn choose_filename(&self, suggested: &str) -> Option<String> {
        Some(suggested.to_string())
    }
}

/// Non-interactive answers: never signs in, confirms only when `assume_yes`
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive {
    pub assume_yes: bool,
}

impl NonInteractive {
    pub fn yes() -> Self {
        Self { assume_yes: true }
    }
}

impl Interaction for NonInteractive {
    fn offer_sign_in(&self, _reason: &SignInReason) -> bool {
        false
    }

    fn confirm_overwrite(&self, _path: &Path) -> bool {
        self.assume_yes
    }

    fn confirm_replace_dir(&self, _path: &Path) -> bool {
        self.assume_yes
    }
}
