use std::future::Future;

use uuid::Uuid;

tokio::task_local! {
    static REQUEST_ID: String;
}

pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns the correlation id of the enclosing request scope, or `None` when
/// called outside of one.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Runs `future` with a freshly generated correlation id bound for its whole
/// duration. The previous binding (possibly none) is restored on every exit
/// path, including panics and cancellation.
pub async fn with_new_request_id<F: Future>(future: F) -> F::Output {
    with_request_id(generate_request_id(), future).await
}

/// Runs `future` with the given correlation id bound. Scopes nest LIFO: an
/// inner binding shadows the outer one and the outer id is visible again once
/// the inner future completes.
pub async fn with_request_id<F: Future>(id: String, future: F) -> F::Output {
    REQUEST_ID.scope(id, future).await
}
