use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::util::generate_call_id;

/// Correlates translated function calls with the responses that answer them.
///
/// Scoped to the translation of one request. Every call id is queued under
/// its function name; a response that carries no id of its own consumes the
/// oldest pending id for that name.
#[derive(Debug, Default)]
pub struct CallIdBindings {
    pending_by_name: FxHashMap<String, VecDeque<String>>,
}

impl CallIdBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a function call and return the wire id to use for it.
    pub fn bind_call(&mut self, name: &str, source_id: Option<&str>) -> String {
        let id = source_id.map_or_else(|| generate_call_id(name), ToOwned::to_owned);
        self.pending_by_name
            .entry(name.to_owned())
            .or_default()
            .push_back(id.clone());
        id
    }

    /// Resolve the wire id for a function response.
    ///
    /// An explicit id wins and retires the matching pending call. Otherwise
    /// the oldest pending call with the same name is used, and only when no
    /// call is pending is a placeholder generated.
    pub fn resolve_response(&mut self, name: &str, source_id: Option<&str>) -> String {
        if let Some(id) = source_id {
            if let Some(queue) = self.pending_by_name.get_mut(name) {
                if let Some(pos) = queue.iter().position(|pending| pending == id) {
                    queue.remove(pos);
                }
            }
            return id.to_owned();
        }
        self.pending_by_name
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| generate_call_id(name))
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending_by_name.values().map(VecDeque::len).sum()
    }
}
