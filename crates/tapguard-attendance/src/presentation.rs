//! Page mapping
//!
//! Every outcome, including a malformed request, ends as a [`Page`]. Messages are generic:
//! they never carry key material, ciphertext or raw cryptographic error text.

use crate::authenticator::{RejectReason, TapDecision, TapOutcome};
use crate::request::RequestError;
use serde::Serialize;
use std::fmt::Write as _;

/// Visual category of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageCategory {
    /// The tap was recorded
    Success,
    /// The tap was not recorded but nothing is wrong with the tag
    Warning,
    /// The tap could not be verified
    Error,
}

/// Title, message and category shown to the person who tapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Short heading
    pub title: String,
    /// Body text; may span lines
    pub message: String,
    /// Visual category
    pub category: PageCategory,
}

impl Page {
    fn new(title: &str, message: impl Into<String>, category: PageCategory) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
            category,
        }
    }

    /// Page for a request that never reached the authenticator
    pub fn for_request_error(_error: &RequestError) -> Self {
        Self::new(
            "Error",
            "Invalid access. Please open this page by tapping an NFC tag.",
            PageCategory::Error,
        )
    }

    /// Page for an authentication decision
    pub fn for_decision(decision: &TapDecision) -> Self {
        match &decision.outcome {
            TapOutcome::Admitted { .. } => {
                let mut message = String::from("Welcome");
                if let Some(uid) = &decision.uid {
                    let _ = write!(message, ", {uid}");
                }
                message.push_str("!\nYour attendance has been recorded.");
                if let Some(counter) = decision.counter {
                    let _ = write!(message, "\n(Tap #{counter})");
                }
                Self::new("Checked in", message, PageCategory::Success)
            }
            TapOutcome::Rejected(reason) => Self::for_rejection(reason),
        }
    }

    fn for_rejection(reason: &RejectReason) -> Self {
        const NOT_RECORDED: &str = "Not recorded";
        match reason {
            RejectReason::DecodeFailed(_) | RejectReason::IntegrityMismatch(_) => Self::new(
                "Verification failed",
                "The security code could not be verified.\nPlease contact an administrator.",
                PageCategory::Error,
            ),
            RejectReason::ReplayDetected { .. } => Self::new(
                NOT_RECORDED,
                "This tag link has already been used.\nPlease tap the tag again.",
                PageCategory::Warning,
            ),
            RejectReason::ServerBusy => Self::new(
                NOT_RECORDED,
                "The server is busy. Please try again in a moment.",
                PageCategory::Warning,
            ),
            RejectReason::LedgerUnavailable(_) | RejectReason::RecordNotStored(_) => Self::new(
                NOT_RECORDED,
                "Your tap could not be saved right now. Please try again in a moment.",
                PageCategory::Warning,
            ),
        }
    }
}

/// Turns a [`Page`] into response text
pub trait PageRenderer {
    /// Render `page`
    fn render(&self, page: &Page) -> String;
}

/// Renders a page as plain text: title, underline, message
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl PageRenderer for PlainTextRenderer {
    fn render(&self, page: &Page) -> String {
        let marker = match page.category {
            PageCategory::Success => "[ok]",
            PageCategory::Warning => "[!]",
            PageCategory::Error => "[x]",
        };
        let heading = format!("{marker} {}", page.title);
        format!(
            "{heading}\n{}\n{}\n",
            "=".repeat(heading.chars().count()),
            page.message
        )
    }
}
