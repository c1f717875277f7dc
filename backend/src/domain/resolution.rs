//! Request-scoped call accounting and branch outcomes.
//!
//! Resolvers return their call counts alongside their values; nothing here
//! is shared between requests.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Upstream provider calls made while serving one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamCalls {
    pub geocode: u32,
    pub poi_group: u32,
    pub route: u32,
    pub imagery: u32,
}

impl UpstreamCalls {
    /// No calls.
    pub const NONE: Self = Self {
        geocode: 0,
        poi_group: 0,
        route: 0,
        imagery: 0,
    };

    /// `count` reverse-geocode calls.
    pub const fn geocode(count: u32) -> Self {
        Self {
            geocode: count,
            ..Self::NONE
        }
    }

    /// `count` grouped place searches.
    pub const fn poi_groups(count: u32) -> Self {
        Self {
            poi_group: count,
            ..Self::NONE
        }
    }

    /// `count` routing calls.
    pub const fn routes(count: u32) -> Self {
        Self {
            route: count,
            ..Self::NONE
        }
    }

    /// `count` imagery references built.
    pub const fn imagery(count: u32) -> Self {
        Self {
            imagery: count,
            ..Self::NONE
        }
    }

    /// Total calls across every kind.
    pub fn total(&self) -> u32 {
        self.geocode
            .saturating_add(self.poi_group)
            .saturating_add(self.route)
            .saturating_add(self.imagery)
    }
}

impl Add for UpstreamCalls {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            geocode: self.geocode.saturating_add(rhs.geocode),
            poi_group: self.poi_group.saturating_add(rhs.poi_group),
            route: self.route.saturating_add(rhs.route),
            imagery: self.imagery.saturating_add(rhs.imagery),
        }
    }
}

impl AddAssign for UpstreamCalls {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for UpstreamCalls {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::NONE, Add::add)
    }
}

/// How a branch produced its section of the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    /// Fetched from the provider in this request.
    Fresh,
    /// Served entirely from cache.
    Cached,
    /// Some sub-calls failed; the value is usable but incomplete.
    Partial,
    /// The documented fallback value was substituted.
    Fallback,
}

impl BranchStatus {
    /// Merge statuses of independent sub-results.
    ///
    /// All cached stays cached, all fallback stays fallback, any degradation
    /// otherwise makes the whole partial. An empty input is cached.
    pub fn combine(statuses: impl IntoIterator<Item = Self>) -> Self {
        let mut seen = Vec::new();
        for status in statuses {
            if !seen.contains(&status) {
                seen.push(status);
            }
        }
        match seen.as_slice() {
            [] => Self::Cached,
            [only] => *only,
            many if many
                .iter()
                .any(|status| matches!(status, Self::Partial | Self::Fallback)) =>
            {
                Self::Partial
            }
            _ => Self::Fresh,
        }
    }

    /// Whether the branch degraded.
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::Partial | Self::Fallback)
    }
}

/// A resolver's value together with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub status: BranchStatus,
    pub error: Option<String>,
    pub calls: UpstreamCalls,
}

impl<T> Resolved<T> {
    /// Value fetched upstream.
    pub fn fresh(value: T, calls: UpstreamCalls) -> Self {
        Self {
            value,
            status: BranchStatus::Fresh,
            error: None,
            calls,
        }
    }

    /// Value served from cache.
    pub fn cached(value: T) -> Self {
        Self {
            value,
            status: BranchStatus::Cached,
            error: None,
            calls: UpstreamCalls::NONE,
        }
    }

    /// Incomplete value with the last failure recorded.
    pub fn partial(value: T, calls: UpstreamCalls, error: impl Into<String>) -> Self {
        Self {
            value,
            status: BranchStatus::Partial,
            error: Some(error.into()),
            calls,
        }
    }

    /// Substituted fallback value.
    pub fn fallback(value: T, calls: UpstreamCalls, error: impl Into<String>) -> Self {
        Self {
            value,
            status: BranchStatus::Fallback,
            error: Some(error.into()),
            calls,
        }
    }

    /// Transform the value, keeping status and accounting.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            status: self.status,
            error: self.error,
            calls: self.calls,
        }
    }
}
