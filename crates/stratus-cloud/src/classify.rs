//! Retry classification for API errors
//!
//! Classification looks at the error code and message only. How often or
//! for how long an operation has been retried is the caller's business.

use crate::error::{ApiError, CloudError};

/// Whether `err` is an API error with exactly `code` whose message contains
/// `message`. An empty `message` matches any message.
pub fn is_api_error(err: &CloudError, code: &str, message: &str) -> bool {
    err.api_error()
        .is_some_and(|api| api.code == code && api.message.contains(message))
}

/// Decides whether an error is safe to retry.
pub trait Classify {
    fn is_retryable(&self, err: &CloudError) -> bool;
}

impl<F> Classify for F
where
    F: Fn(&CloudError) -> bool,
{
    fn is_retryable(&self, err: &CloudError) -> bool {
        self(err)
    }
}

/// A single known-transient condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRule {
    code: String,
    message: Option<String>,
}

impl RetryRule {
    /// Match on the error code alone.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: None,
        }
    }

    /// Match on the error code plus a substring of the message, for APIs
    /// that reuse one code for distinguishable conditions.
    pub fn code_with_message(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
        }
    }

    pub fn matches_api(&self, err: &ApiError) -> bool {
        if err.code != self.code {
            return false;
        }
        match &self.message {
            Some(fragment) => err.message.contains(fragment.as_str()),
            None => true,
        }
    }

    pub fn matches(&self, err: &CloudError) -> bool {
        err.api_error().is_some_and(|api| self.matches_api(api))
    }
}

/// A set of retry rules.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    rules: Vec<RetryRule>,
    any_api_error: bool,
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self::default()
    }

    /// Retry every API error. Non-API errors (configuration, decoding) are
    /// still terminal.
    pub fn any() -> Self {
        Self {
            rules: Vec::new(),
            any_api_error: true,
        }
    }

    pub fn with_rule(mut self, rule: RetryRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn on_code(self, code: impl Into<String>) -> Self {
        self.with_rule(RetryRule::code(code))
    }

    pub fn on_code_with_message(
        self,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.with_rule(RetryRule::code_with_message(code, message))
    }

    pub fn rules(&self) -> &[RetryRule] {
        &self.rules
    }
}

impl Classify for RetryPolicy {
    fn is_retryable(&self, err: &CloudError) -> bool {
        match err.api_error() {
            Some(api) => self.any_api_error || self.rules.iter().any(|r| r.matches_api(api)),
            None => false,
        }
    }
}

/// Outcome of classifying one error.
#[derive(Debug)]
pub enum RetryDecision {
    /// Transient; the operation may be resubmitted.
    Retry(CloudError),
    /// Permanent; surface this error.
    Terminal(CloudError),
}

impl RetryDecision {
    pub fn classify<C: Classify + ?Sized>(err: CloudError, classifier: &C) -> Self {
        if classifier.is_retryable(&err) {
            RetryDecision::Retry(err)
        } else {
            RetryDecision::Terminal(err)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryDecision::Retry(_))
    }

    pub fn into_error(self) -> CloudError {
        match self {
            RetryDecision::Retry(err) | RetryDecision::Terminal(err) => err,
        }
    }
}
