use tracing::debug;

use crate::errors::AppResult;
use crate::gmail::MailboxApi;
use crate::types::{MessageId, Query};

/// Collects every message ID matching `query`, page by page, in the order
/// the pages arrive. Listing errors are returned to the caller untouched.
pub async fn collect_message_ids(
    api: &dyn MailboxApi,
    query: &Query,
) -> AppResult<Vec<MessageId>> {
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = api
            .list_message_ids(query.as_str(), page_token.as_deref())
            .await?;

        if page.ids.is_empty() {
            // A cursor alongside an empty page is not expected; stop anyway.
            debug!(query = %query, next = ?page.next_page_token, "No messages found.");
            break;
        }

        debug!(
            query = %query,
            count = page.ids.len(),
            next = ?page.next_page_token,
            "Collected page of message ids"
        );
        ids.extend(page.ids);

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(ids)
}
