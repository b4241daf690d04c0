use std::sync::{Arc, Mutex};

use api_types::stats::Period;
use chrono::NaiveDate;

use crate::{Api, InFlight, lock, model::Statistics};

/// Which server-side aggregate to ask for. Unset fields let the backend
/// default to the current day, month or year.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatisticsQuery {
    Daily { date: Option<NaiveDate> },
    Monthly { month: Option<u32>, year: Option<i32> },
    Yearly { year: Option<i32> },
}

impl StatisticsQuery {
    pub fn period(&self) -> Period {
        match self {
            Self::Daily { .. } => Period::Daily,
            Self::Monthly { .. } => Period::Monthly,
            Self::Yearly { .. } => Period::Yearly,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        match *self {
            Self::Daily { date } => {
                if let Some(date) = date {
                    params.push(("date", date.format("%Y-%m-%d").to_string()));
                }
            }
            Self::Monthly { month, year } => {
                if let Some(month) = month {
                    params.push(("month", month.to_string()));
                }
                if let Some(year) = year {
                    params.push(("year", year.to_string()));
                }
            }
            Self::Yearly { year } => {
                if let Some(year) = year {
                    params.push(("year", year.to_string()));
                }
            }
        }
        params
    }
}

#[derive(Debug, Default)]
struct StatisticsState {
    daily: Option<Statistics>,
    monthly: Option<Statistics>,
    yearly: Option<Statistics>,
    error: Option<String>,
}

/// Last server-computed aggregate per period. Not persisted.
#[derive(Clone, Debug)]
pub struct StatisticsStore {
    api: Api,
    state: Arc<Mutex<StatisticsState>>,
    in_flight: InFlight,
}

impl StatisticsStore {
    pub fn new(api: Api) -> Self {
        Self {
            api,
            state: Arc::default(),
            in_flight: InFlight::default(),
        }
    }

    pub fn daily(&self) -> Option<Statistics> {
        lock(&self.state).daily.clone()
    }

    pub fn monthly(&self) -> Option<Statistics> {
        lock(&self.state).monthly.clone()
    }

    pub fn yearly(&self) -> Option<Statistics> {
        lock(&self.state).yearly.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.any()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn clear_error(&self) {
        lock(&self.state).error = None;
    }

    pub async fn fetch_daily(&self, date: Option<NaiveDate>) -> bool {
        self.fetch(StatisticsQuery::Daily { date }).await
    }

    pub async fn fetch_monthly(&self, month: Option<u32>, year: Option<i32>) -> bool {
        self.fetch(StatisticsQuery::Monthly { month, year }).await
    }

    pub async fn fetch_yearly(&self, year: Option<i32>) -> bool {
        self.fetch(StatisticsQuery::Yearly { year }).await
    }

    pub async fn fetch(&self, query: StatisticsQuery) -> bool {
        let _guard = self.in_flight.start();
        self.clear_error();

        let period = query.period();
        match self.api.statistics(period, &query.params()).await {
            Ok(response) => {
                let stats = Some(Statistics::from(response));
                let mut state = lock(&self.state);
                match period {
                    Period::Daily => state.daily = stats,
                    Period::Monthly => state.monthly = stats,
                    Period::Yearly => state.yearly = stats,
                }
                true
            }
            Err(err) => {
                let fallback = format!("failed to load {} statistics", period.as_str());
                lock(&self.state).error = Some(err.user_message(&fallback));
                false
            }
        }
    }
}
