use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::Rng;
use relay_messaging::model::{MonthlyScores, YearlyScores};
use time::OffsetDateTime;

use super::{BankingCredentials, BankingInfoProvider, ProviderError};

pub const DEFAULT_START_FROM_YEAR: i32 = 2015;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const SCORE_RANGE: std::ops::Range<i64> = -1000..1000;

/// Stand-in for a real institution. Scores are random.
#[derive(Debug, Clone)]
pub struct BankA {
    pub start_from_year: i32,
}

impl Default for BankA {
    fn default() -> Self {
        Self {
            start_from_year: DEFAULT_START_FROM_YEAR,
        }
    }
}

impl BankA {
    pub fn new(start_from_year: i32) -> Self {
        Self { start_from_year }
    }

    /// One entry per year from `start_from_year` up to, not including, `current_year`.
    pub fn scores_until(&self, current_year: i32, rng: &mut impl Rng) -> YearlyScores {
        (self.start_from_year..current_year)
            .map(|year| {
                let monthly: MonthlyScores = MONTHS.iter().map(|month| (month.to_string(), rng.gen_range(SCORE_RANGE))).collect();
                (year.to_string(), monthly)
            })
            .collect::<BTreeMap<_, _>>()
    }
}

#[async_trait]
impl BankingInfoProvider for BankA {
    async fn query(&self, credentials: &BankingCredentials) -> Result<YearlyScores, ProviderError> {
        tracing::debug!("Querying BankA for user {}", credentials.username);
        let current_year = OffsetDateTime::now_utc().year();

        Ok(self.scores_until(current_year, &mut rand::thread_rng()))
    }
}
