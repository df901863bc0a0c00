//! Missing-container classification
//!
//! Stop and remove are idempotent: a container that is already gone counts
//! as success. The local runtime reports this with a typed error, but the
//! agent only returns generic HTTP error bodies, so classification falls back
//! in order: typed `NotFound`, the agent body's `detail` field, the raw agent
//! body, then the rendered message of every error in the cause chain.

use std::error::Error;

use crate::errors::ContainerError;

/// Lower-case substrings that identify a missing container
pub const MISSING_CONTAINER_MARKERS: [&str; 4] =
    ["not found", "no such container", "404", "missing container"];

fn has_marker(text: &str) -> bool {
    let text = text.to_lowercase();
    MISSING_CONTAINER_MARKERS.iter().any(|m| text.contains(m))
}

fn classify_container_error(err: &ContainerError) -> bool {
    match err {
        ContainerError::NotFound { .. } => true,
        ContainerError::Agent { status, detail, body } => {
            *status == 404 || detail.as_deref().is_some_and(has_marker) || has_marker(body)
        }
        ContainerError::Runtime { message, .. } => has_marker(message),
        // messages embed the agent URL
        ContainerError::Timeout { .. }
        | ContainerError::Network { .. }
        | ContainerError::InvalidAgentUrl { .. }
        | ContainerError::MissingContainerId => false,
    }
}

/// Whether an error, or anything in its cause chain, means the container
/// does not exist.
///
/// A `ContainerError` anywhere in the chain decides. Without one, the
/// rendered message of every error in the chain is matched against
/// `MISSING_CONTAINER_MARKERS`.
pub fn is_missing_container(err: &(dyn Error + 'static)) -> bool {
    let chain = || std::iter::successors(Some(err), |&e| e.source());

    if let Some(container_err) = chain().find_map(|e| e.downcast_ref::<ContainerError>()) {
        return classify_container_error(container_err);
    }

    chain().any(|e| has_marker(&e.to_string()))
}
