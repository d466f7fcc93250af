//! Completion test and record extraction for requests targeting a stream.

use tracing::debug;

use crate::buffer::StreamBuffer;
use crate::index::{PendingRequest, RequestIndex};
use crate::types::StreamKey;

/// A request is satisfiable once every required component's high-water mark
/// has reached the window end. A component never seen in the buffer keeps
/// the request pending.
fn satisfiable(buffer: &StreamBuffer, request: &PendingRequest) -> bool {
    request.components.iter().all(|&component| {
        buffer
            .high_water(request.key(), component)
            .map_or(false, |mark| mark >= request.window.end)
    })
}

/// Complete every request targeting `key` that the buffer can now satisfy.
///
/// Requests are visited in registration order. Completed ones are retired
/// from the index with all overlapping records attached per required
/// component; the rest stay pending untouched.
pub fn complete_for_key(
    buffer: &StreamBuffer,
    index: &mut RequestIndex,
    key: &StreamKey,
) -> Vec<PendingRequest> {
    let mut completed = Vec::new();
    for id in index.ids_for_key(key) {
        let satisfied = index.get(&id).map_or(false, |r| satisfiable(buffer, r));
        if !satisfied {
            continue;
        }
        let Ok(mut request) = index.retire(&id) else {
            continue;
        };
        let components = request.components.clone();
        for component in components {
            let records = buffer.extract(key, component, request.window);
            request.data.insert(component, records);
        }
        request.finished = true;
        debug!(pick = %request.pick.id, stream = %key, "request satisfied from live buffer");
        completed.push(request);
    }
    completed
}
