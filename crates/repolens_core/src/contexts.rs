use std::collections::BTreeMap;

/// One retrieved-context attribution shown next to an answer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextItem {
    pub id: Option<String>,
    pub filename: String,
    pub content: String,
    pub score: Option<f64>,
}

/// Per-conversation cache: message id -> context items used for it.
pub type ContextMap = BTreeMap<String, Vec<ContextItem>>;

/// A row from the server's context-history endpoint. `message_id` is
/// `None` for late-arriving rows the server never tied to a message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerContextRow {
    pub message_id: Option<String>,
    pub query_id: String,
    pub contexts: Vec<ContextItem>,
}

/// Merge the locally cached map with an authoritative server fetch.
///
/// Server rows win per message id; local-only entries are retained, never
/// silently dropped. Rows without a message id are best-effort assigned to
/// the most recent assistant messages that do not yet have contexts,
/// newest-first (`recent_assistant_ids` is ordered newest-first).
pub fn merge_context_rows(
    local: &ContextMap,
    rows: &[ServerContextRow],
    recent_assistant_ids: &[String],
) -> ContextMap {
    let mut merged = local.clone();
    let mut orphans = Vec::new();
    for row in rows {
        match &row.message_id {
            Some(id) => {
                merged.insert(id.clone(), row.contexts.clone());
            }
            None => orphans.push(row),
        }
    }

    let free: Vec<String> = recent_assistant_ids
        .iter()
        .filter(|id| !merged.contains_key(*id))
        .cloned()
        .collect();
    for (row, id) in orphans.into_iter().zip(free) {
        merged.insert(id, row.contexts.clone());
    }
    merged
}
