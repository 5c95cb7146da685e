//! Domain types shared across the ingestion core: the tracked item, the
//! price time series, upstream credentials, and watchlist/alert state.

pub mod credential;
pub mod item;
pub mod observation;
pub mod watch;

pub use credential::ApiCredential;
pub use item::{Item, ItemCatalogEntry};
pub use observation::{PriceObservation, PriceSource};
pub use watch::{AlertKind, AlertState, OutboundAlert, PriceUpdate, UserAlert, UserWatch, SYSTEM_ALERT_USER_ID};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("item error: {0}")]
    Item(#[from] item::ItemError),
    #[error("observation error: {0}")]
    Observation(#[from] observation::ObservationError),
}
