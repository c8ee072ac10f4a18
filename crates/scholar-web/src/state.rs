use scholar_core::Actions;

/// Shared application state accessible from all handlers.
///
/// Immutable after startup: each request carries its own paper text.
pub struct AppState {
    pub actions: Actions,
    pub max_upload_bytes: usize,
}
