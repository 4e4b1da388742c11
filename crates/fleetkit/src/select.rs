//! Target selection over the fleet registry.

use crate::types::{Server, ServerType};

/// User-facing selection criteria, resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every server in the registry
    All,
    /// Explicit server ids
    Ids(Vec<String>),
    /// Every server of one type
    Type(ServerType),
}

impl Selection {
    /// Resolve raw criteria as they arrive from a command line.
    ///
    /// Applies the classic input-mistake disambiguation: a single id that
    /// exactly matches a known type name, with no explicit type filter
    /// given, is treated as a type filter. `--servers compute` selects
    /// every compute server, not a server whose id is literally
    /// "compute".
    pub fn from_args(ids: Option<Vec<String>>, kind: Option<ServerType>) -> Self {
        match (ids, kind) {
            (Some(ids), None) if ids.len() == 1 => match ServerType::from_name(&ids[0]) {
                Some(kind) => Selection::Type(kind),
                None => Selection::Ids(ids),
            },
            (Some(ids), _) => Selection::Ids(ids),
            (None, Some(kind)) => Selection::Type(kind),
            (None, None) => Selection::All,
        }
    }
}

/// Resolve a selection into a concrete target list.
///
/// Id filtering preserves registry order, not the order the ids were
/// given in; type filtering is an exact match. An empty result is valid
/// and means "nothing to do", never an error.
pub fn select(servers: &[Server], selection: &Selection) -> Vec<Server> {
    match selection {
        Selection::All => servers.to_vec(),
        Selection::Ids(ids) => servers
            .iter()
            .filter(|server| ids.iter().any(|id| *id == server.id))
            .cloned()
            .collect(),
        Selection::Type(kind) => servers
            .iter()
            .filter(|server| server.kind == *kind)
            .cloned()
            .collect(),
    }
}
