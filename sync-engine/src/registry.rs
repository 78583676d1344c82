//! Provider registry - the set of platform adapters the scheduler knows.

use crate::providers::{InstagramProvider, TwitterProvider, YouTubeProvider};
use crate::MetricsProvider;
use std::sync::Arc;

/// Returns all available metrics providers.
pub fn all_providers() -> Vec<Arc<dyn MetricsProvider>> {
    vec![
        Arc::new(YouTubeProvider::new()),
        Arc::new(TwitterProvider::new()),
        Arc::new(InstagramProvider::new()),
    ]
}

/// Looks up a registered provider by name.
pub fn find_provider<'a>(
    providers: &'a [Arc<dyn MetricsProvider>],
    name: &str,
) -> Option<&'a Arc<dyn MetricsProvider>> {
    providers.iter().find(|p| p.name() == name)
}
