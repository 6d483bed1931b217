//! # Success Policy
//!
//! Decides whether a response status line counts as a delivered webhook.
//!
//! The comparison is isolated here so its polarity can be changed through
//! configuration without touching the transport.

use serde::Deserialize;

/// Default expected status line
pub const DEFAULT_SUCCESS_LINE: &str = "HTTP/1.1 200 OK";

/// What a status line equal to the success line means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolarity {
    /// Matching status line means the webhook accepted the event
    #[default]
    MatchIsSuccess,

    /// Matching status line is treated as a rejection.
    ///
    /// Reproduces legacy firmware behaviour; kept selectable until the
    /// intended semantics are confirmed.
    MatchIsFailure,
}

/// Status-line classification rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessPolicy {
    pub success_line: String,
    pub polarity: MatchPolarity,
}

impl Default for SuccessPolicy {
    fn default() -> Self {
        Self {
            success_line: DEFAULT_SUCCESS_LINE.to_string(),
            polarity: MatchPolarity::default(),
        }
    }
}

impl SuccessPolicy {
    pub fn new(success_line: impl Into<String>, polarity: MatchPolarity) -> Self {
        Self {
            success_line: success_line.into(),
            polarity,
        }
    }

    /// `true` if `status_line` (without terminator) counts as delivered
    pub fn is_success(&self, status_line: &str) -> bool {
        let matches = status_line == self.success_line;
        match self.polarity {
            MatchPolarity::MatchIsSuccess => matches,
            MatchPolarity::MatchIsFailure => !matches,
        }
    }
}
