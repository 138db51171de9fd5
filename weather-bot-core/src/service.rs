//! Request orchestration: coordinates, provider call, normalization, rendering.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    error::{ForecastError, StoreError},
    model::{Coordinates, ForecastKind, WeatherRequest},
    normalize::{TOMORROW_OFFSET, normalize_with_offset},
    provider::WeatherProvider,
    render::render,
    store::CoordinateStore,
};

/// Answers forecast and location requests for chat users.
///
/// Cheap to share behind an `Arc`; each call is independent of the others.
#[derive(Debug)]
pub struct ForecastService<S, P> {
    store: Arc<S>,
    provider: P,
    tomorrow_offset: usize,
}

impl<S, P> ForecastService<S, P>
where
    S: CoordinateStore + 'static,
    P: WeatherProvider,
{
    pub fn new(store: Arc<S>, provider: P) -> Self {
        Self {
            store,
            provider,
            tomorrow_offset: TOMORROW_OFFSET,
        }
    }

    pub fn with_tomorrow_offset(mut self, offset: usize) -> Self {
        self.tomorrow_offset = offset;
        self
    }

    /// Store the location the user just shared.
    pub async fn remember_location(
        &self,
        user_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), ForecastError> {
        let coordinates = Coordinates::new(latitude, longitude);
        if !coordinates.is_valid() {
            return Err(ForecastError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }

        self.with_store(move |store| store.upsert(user_id, coordinates)).await?;
        info!(user_id, "Location updated");
        Ok(())
    }

    /// Build the forecast message for the user.
    pub async fn get_forecast(
        &self,
        user_id: i64,
        kind: ForecastKind,
    ) -> Result<String, ForecastError> {
        let coordinates = self
            .with_store(move |store| store.get(user_id))
            .await?
            .ok_or(ForecastError::NoLocationKnown(user_id))?;

        debug!(user_id, %kind, "Fetching forecast");
        let request = WeatherRequest::for_kind(kind, coordinates);
        let payload = self.provider.fetch(&request).await?;

        let offset = if kind.applies_offset() { self.tomorrow_offset } else { 0 };
        let rows = normalize_with_offset(payload, offset);
        debug!(user_id, rows = rows.len(), "Normalized forecast");

        Ok(render(&rows)?)
    }

    /// Like [`Self::get_forecast`], but always yields text to show the user.
    pub async fn reply(&self, user_id: i64, kind: ForecastKind) -> String {
        match self.get_forecast(user_id, kind).await {
            Ok(message) => message,
            Err(err) => {
                match &err {
                    ForecastError::NoLocationKnown(_)
                    | ForecastError::InvalidCoordinates { .. } => {
                        debug!(user_id, %kind, "{err}")
                    }
                    _ if err.is_retryable() => warn!(user_id, %kind, "Forecast failed: {err}"),
                    _ => error!(user_id, %kind, "Forecast failed: {err}"),
                }
                err.user_message()
            }
        }
    }

    /// Run a store call on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Storage(format!("Store task failed: {e}")))?
    }
}
