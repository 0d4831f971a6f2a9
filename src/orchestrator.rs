// One alerting run: read destinations, search each one in turn, alert on
// deals, write the rows back.

use crate::config::SearchConfig;
use crate::destinations::{DestinationRow, DestinationStore, StoreError, DEFAULT_THRESHOLD};
use crate::flight_data::{FlightQuote, RoundTripQuery};
use crate::flight_search::FlightSearch;
use crate::notification::{format_alert, Notifier, NotifyError};
use crate::transport::ApiError;
use chrono::{Duration, NaiveDate};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Search(#[from] ApiError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Departure and return dates, both offset from the day of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub departure: NaiveDate,
    pub return_by: NaiveDate,
}

impl DateWindow {
    pub fn starting(today: NaiveDate, start_days: i64, length_days: i64) -> Self {
        Self {
            departure: today + Duration::days(start_days),
            return_by: today + Duration::days(length_days),
        }
    }

    pub fn departure_date(&self) -> String {
        self.departure.format("%Y-%m-%d").to_string()
    }

    pub fn return_date(&self) -> String {
        self.return_by.format("%Y-%m-%d").to_string()
    }
}

/// A fare counts only if it parses and is strictly below the threshold.
pub fn is_deal(quote: &FlightQuote, threshold: f64) -> bool {
    if !quote.is_available() {
        return false;
    }
    quote.numeric_price().unwrap_or(DEFAULT_THRESHOLD) < threshold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Deal,
    NoDeal,
    Unavailable,
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub searched: usize,
    pub deals: usize,
    pub unavailable: usize,
    pub skipped: usize,
    pub rows_written: usize,
}

pub struct DealFinder<S, F, N> {
    config: SearchConfig,
    store: S,
    search: F,
    notifier: N,
}

impl<S, F, N> DealFinder<S, F, N>
where
    S: DestinationStore,
    F: FlightSearch,
    N: Notifier,
{
    pub fn new(config: SearchConfig, store: S, search: F, notifier: N) -> Self {
        Self {
            config,
            store,
            search,
            notifier,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub async fn run(&self, today: NaiveDate) -> Result<RunReport, RunError> {
        let window = DateWindow::starting(
            today,
            self.config.window_start_days,
            self.config.window_length_days,
        );
        tracing::info!(
            "Searching {} to {} from {}",
            window.departure_date(),
            window.return_date(),
            self.config.origin_airport
        );

        let mut rows = self.store.fetch_rows().await?;
        let mut report = RunReport::default();

        for row in rows.iter_mut() {
            match self.process_row(row, &window).await? {
                RowOutcome::Deal => {
                    report.searched += 1;
                    report.deals += 1;
                }
                RowOutcome::NoDeal => report.searched += 1,
                RowOutcome::Unavailable => {
                    report.searched += 1;
                    report.unavailable += 1;
                }
                RowOutcome::Skipped => report.skipped += 1,
            }
        }

        report.rows_written = self.store.update_destinations(&rows).await?;
        Ok(report)
    }

    pub async fn process_row(
        &self,
        row: &mut DestinationRow,
        window: &DateWindow,
    ) -> Result<RowOutcome, RunError> {
        if row.iata_code.is_empty() {
            let code = if row.city.is_empty() {
                String::new()
            } else {
                self.search.resolve_city_code(&row.city).await?
            };
            if code.is_empty() {
                tracing::warn!("Skipping row {}: no IATA code for {:?}", row.id, row.city);
                row.num_flights = 0;
                return Ok(RowOutcome::Skipped);
            }
            tracing::info!("Resolved {} to {code}", row.city);
            row.iata_code = code;
        }

        let query = RoundTripQuery::new(
            &self.config.origin_airport,
            &row.iata_code,
            &window.departure_date(),
            &window.return_date(),
        )
        .with_destination_city(&row.city)
        .with_origin_city(&self.config.origin_city);

        let quote = self.search.search_cheapest_round_trip(&query).await?;
        row.num_flights = quote.total_segments;
        tracing::info!(
            "{} → {}: {} ({} flights)",
            self.config.origin_airport,
            row.city,
            quote.price,
            quote.total_segments
        );

        if !quote.is_available() {
            return Ok(RowOutcome::Unavailable);
        }
        if !is_deal(&quote, row.threshold()) {
            return Ok(RowOutcome::NoDeal);
        }

        self.notifier.send_alert(&format_alert(&quote)).await?;
        Ok(RowOutcome::Deal)
    }
}
