//! Audience evaluator port — external identity/segment membership checks.

use std::future::Future;

use cadence_domain::schedule::Audience;

/// Errors surfaced by an audience evaluator.
pub type AudienceError = Box<dyn std::error::Error + Send + Sync>;

/// Decides whether the current user/device is a member of an audience.
pub trait AudienceEvaluator {
    /// Evaluate the audience predicate against external identity data.
    fn evaluate(
        &self,
        audience: &Audience,
    ) -> impl Future<Output = Result<bool, AudienceError>> + Send;
}

/// Evaluator that treats everyone as a member. Useful for hosts without
/// an identity source and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAudience;

impl AudienceEvaluator for AllowAllAudience {
    fn evaluate(
        &self,
        _audience: &Audience,
    ) -> impl Future<Output = Result<bool, AudienceError>> + Send {
        async { Ok(true) }
    }
}
