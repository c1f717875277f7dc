//! Advisory cost of the provider calls made for one request.
//!
//! Rates are configuration, not verified pricing. The estimate only
//! annotates the bundle and never changes what the service does.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::resolution::UpstreamCalls;

/// Per-call price for each kind of provider call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub geocode: f64,
    pub poi_group: f64,
    pub route: f64,
    pub imagery: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            geocode: 0.005,
            poi_group: 0.032,
            route: 0.010,
            imagery: 0.002,
        }
    }
}

/// Rejected rate or ceiling values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CostConfigError {
    /// A rate is negative, NaN, or infinite.
    #[error("rate `{name}` must be a finite, non-negative number (got {value})")]
    InvalidRate { name: &'static str, value: f64 },
    /// The ceiling is negative, NaN, or infinite.
    #[error("budget ceiling must be a finite, non-negative number (got {0})")]
    InvalidCeiling(f64),
}

impl RateTable {
    fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("geocode", self.geocode),
            ("poi_group", self.poi_group),
            ("route", self.route),
            ("imagery", self.imagery),
        ]
    }

    /// Reject rates that would break monotonic cost growth.
    pub fn validate(&self) -> Result<(), CostConfigError> {
        match self
            .entries()
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            Some((name, value)) => Err(CostConfigError::InvalidRate { name, value }),
            None => Ok(()),
        }
    }
}

/// Informational note attached when the estimate exceeds the ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAdvisory {
    pub overrun: f64,
    pub message: String,
}

/// Estimated cost of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub per_category: BTreeMap<String, f64>,
    pub total_cost: f64,
    pub budget_ceiling: f64,
    pub within_budget: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<BudgetAdvisory>,
}

/// Converts call counts into a [`CostEstimate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimator {
    rates: RateTable,
    budget_ceiling: f64,
}

impl CostEstimator {
    /// Build an estimator after checking rates and ceiling.
    pub fn new(rates: RateTable, budget_ceiling: f64) -> Result<Self, CostConfigError> {
        rates.validate()?;
        if !budget_ceiling.is_finite() || budget_ceiling < 0.0 {
            return Err(CostConfigError::InvalidCeiling(budget_ceiling));
        }
        Ok(Self {
            rates,
            budget_ceiling,
        })
    }

    /// Price `calls`. Non-decreasing in every counter.
    ///
    /// # Examples
    /// ```
    /// use geo_analysis::domain::{CostEstimator, RateTable, UpstreamCalls};
    ///
    /// let estimator = CostEstimator::new(RateTable::default(), 0.50).expect("valid rates");
    /// let estimate = estimator.estimate(&UpstreamCalls::poi_groups(4));
    /// assert!(estimate.within_budget);
    /// ```
    pub fn estimate(&self, calls: &UpstreamCalls) -> CostEstimate {
        let counts = [calls.geocode, calls.poi_group, calls.route, calls.imagery];
        let per_category: BTreeMap<String, f64> = self
            .rates
            .entries()
            .into_iter()
            .zip(counts)
            .map(|((name, rate), count)| (name.to_owned(), rate * f64::from(count)))
            .collect();
        let total_cost: f64 = per_category.values().sum();
        let within_budget = total_cost <= self.budget_ceiling;
        let advisory = (!within_budget).then(|| {
            let overrun = total_cost - self.budget_ceiling;
            BudgetAdvisory {
                overrun,
                message: format!(
                    "estimated cost {total_cost:.3} exceeds the {:.3} ceiling by {overrun:.3}",
                    self.budget_ceiling
                ),
            }
        });
        CostEstimate {
            per_category,
            total_cost,
            budget_ceiling: self.budget_ceiling,
            within_budget,
            advisory,
        }
    }
}
