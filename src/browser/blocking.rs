//! Resource-type request blocking.
//!
//! Heavy resource categories are aborted before the network request
//! proceeds, cutting page load time and bandwidth. The denylist check is a
//! pure predicate; the CDP wiring lives in [`install_request_blocking`].

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::debug;

/// Whether a resource category is denylisted.
pub fn is_blocked_resource(resource_type: &ResourceType) -> bool {
    matches!(
        resource_type,
        ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font | ResourceType::Media
    )
}

/// Pause every request through the Fetch domain and abort denylisted
/// resource types. The listener task ends when the page closes.
pub(crate) async fn install_request_blocking(page: &Page) -> Result<()> {
    let mut events = page.event_listener::<EventRequestPaused>().await?;
    page.execute(EnableParams::builder().build()).await?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let request_id = event.request_id.clone();
            let result = if is_blocked_resource(&event.resource_type) {
                page.execute(FailRequestParams::new(request_id, ErrorReason::Aborted))
                    .await
                    .map(|_| ())
            } else {
                page.execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ())
            };
            if let Err(e) = result {
                // Page is likely gone; the stream will end shortly.
                debug!("Request interception command failed: {}", e);
            }
        }
    });

    Ok(())
}
