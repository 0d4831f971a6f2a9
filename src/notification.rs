// Deal alerts through Pushover.

use crate::config::PushoverConfig;
use crate::flight_data::FlightQuote;
use crate::transport::{ApiError, HttpRequest, Transport};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Notification rejected: {status} - {body}")]
    Rejected { status: u16, body: String },
}

pub fn format_alert(quote: &FlightQuote) -> String {
    format!(
        "💸 Flight Deal Found!\n\n\
         {} → {}\n\n\
         Price: ${}\n\
         Flights: {} total\n\n\
         Depart: {}\n\
         Return: {}",
        quote.origin_city,
        quote.destination_city,
        quote.price,
        quote.total_segments,
        quote.out_date,
        quote.return_date,
    )
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(&self, text: &str) -> Result<(), NotifyError>;
}

pub struct PushoverNotifier<T> {
    transport: T,
    config: PushoverConfig,
}

impl<T: Transport> PushoverNotifier<T> {
    pub fn new(config: PushoverConfig, transport: T) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl<T: Transport> Notifier for PushoverNotifier<T> {
    async fn send_alert(&self, text: &str) -> Result<(), NotifyError> {
        let request = HttpRequest::post(&self.config.url).with_form(&[
            ("token", self.config.token.as_str()),
            ("user", self.config.user.as_str()),
            ("message", text),
        ]);

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(NotifyError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        tracing::info!("📲 Pushover notification sent.");
        Ok(())
    }
}
