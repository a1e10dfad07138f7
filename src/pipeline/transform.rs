use crate::types::{AnalyticsDocument, EventBody, EventRecord, RawIntakeItem};
use std::collections::BTreeMap;

/// Header names used as keys of the stored `headers` sub-document.
#[derive(Debug, Clone)]
pub struct HeaderKeys {
    pub user_id: String,
    pub user_agent: String,
}

/// Turn a claimed intake item into the record handed to the writer.
///
/// The body bytes are decoded again here; a failure means the item must be
/// skipped, never persisted as an empty event.
pub fn build_record(
    item: RawIntakeItem,
    keys: &HeaderKeys,
) -> Result<EventRecord, serde_json::Error> {
    let body = EventBody::parse(&item.body)?;

    let mut headers = BTreeMap::new();
    headers.insert(keys.user_id.clone(), item.user_id.clone());
    headers.insert(keys.user_agent.clone(), item.user_agent);

    Ok(EventRecord {
        user_id: item.user_id,
        document: AnalyticsDocument { headers, body },
    })
}
