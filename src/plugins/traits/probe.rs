use async_trait::async_trait;

use crate::models::{AvailabilityVerdict, TrackedItem};
use crate::scraper::BrowsingSession;
use crate::utils::error::Result;

/// Retailer-specific availability check.
///
/// An implementation navigates the shared session to the item page and reads
/// the rendered document. It returns `Available` only when the page offers a
/// purchase and shows none of the retailer's out-of-stock copy. Errors are
/// turned into `CheckFailed` by the caller.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    async fn check_availability(
        &self,
        session: &mut dyn BrowsingSession,
        item: &TrackedItem,
    ) -> Result<AvailabilityVerdict>;
}
