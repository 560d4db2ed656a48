//! Optional reverse-geocoding capability.

use async_trait::async_trait;

use super::geo::Coordinate;

/// Looks up a display address for a coordinate.
///
/// Purely cosmetic: the address is stored on the alarm for display and plays
/// no role in evaluation. Implementations return `None` when no address can
/// be resolved.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn address_for(&self, coordinate: Coordinate) -> Option<String>;
}
