//! Per-request context injected by middleware.

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    /// Request id from an optional extension, as handlers receive it
    pub fn id_of(context: Option<&RequestContext>) -> Option<String> {
        context.map(|c| c.request_id.clone())
    }
}
