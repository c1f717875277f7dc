//! Ordered "first success" evaluation of fallback tiers.
//!
//! A ladder is data: a list of tagged, lazily started attempts followed by a
//! final estimator that cannot fail. Attempts run strictly in order and stop
//! at the first success.

use futures_util::future::BoxFuture;

/// A lazily started attempt. Nothing runs until the ladder reaches it.
pub type Attempt<'a, T, E> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a>;

/// A value tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tiered<K, T> {
    pub tier: K,
    pub value: T,
}

/// Result of walking a ladder.
#[derive(Debug)]
pub struct LadderOutcome<K, T, E> {
    pub result: Tiered<K, T>,
    /// Failures of the tiers tried before `result`, in order.
    pub failures: Vec<(K, E)>,
}

/// An ordered list of attempts ending in a guaranteed estimator.
pub struct FallbackLadder<'a, K, T, E> {
    attempts: Vec<(K, Attempt<'a, T, E>)>,
}

impl<'a, K, T, E> FallbackLadder<'a, K, T, E>
where
    K: Copy,
{
    /// Empty ladder.
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    /// Append a tier.
    pub fn then<F>(mut self, tier: K, attempt: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a,
    {
        self.attempts.push((tier, Box::new(attempt)));
        self
    }

    /// Walk the tiers; if all fail, tag `estimate()` with `final_tier`.
    pub async fn first_success(self, final_tier: K, estimate: impl FnOnce() -> T) -> LadderOutcome<K, T, E> {
        let mut failures = Vec::new();
        for (tier, attempt) in self.attempts {
            match attempt().await {
                Ok(value) => {
                    return LadderOutcome {
                        result: Tiered { tier, value },
                        failures,
                    };
                }
                Err(error) => failures.push((tier, error)),
            }
        }
        LadderOutcome {
            result: Tiered {
                tier: final_tier,
                value: estimate(),
            },
            failures,
        }
    }
}

impl<K: Copy, T, E> Default for FallbackLadder<'_, K, T, E> {
    fn default() -> Self {
        Self::new()
    }
}
