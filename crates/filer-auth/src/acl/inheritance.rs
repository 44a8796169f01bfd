//! Folder grant inheritance.
//!
//! Inheritance rules:
//! - The walk starts at the node's anchor folder and climbs parent by parent.
//! - At the anchor both `This` and `Children` grants apply; above it only
//!   `Children` grants do.
//! - The closest level carrying an explicit allow or deny for the right
//!   decides. Within that level a deny beats any allow.
//! - A chain that revisits a folder or exceeds the depth bound is corrupt
//!   and never grants anything.

use std::collections::{HashMap, HashSet};

use filer_core::types::FolderId;
use filer_entity::folder::Folder;
use filer_entity::permission::{FolderPermission, GrantState, Right};
use filer_entity::user::Actor;

/// Outcome of walking one ancestor chain for one right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainVerdict {
    /// An explicit grant decided at `level` (0 = the anchor folder).
    Explicit {
        /// Allow or deny.
        state: GrantState,
        /// Folder carrying the deciding grants.
        folder_id: FolderId,
        /// Distance from the anchor.
        level: usize,
    },
    /// No grant on the chain mentions the right.
    Unset,
    /// The chain revisits a folder or is deeper than allowed.
    Corrupt,
}

/// Walk `chain` (anchor first) and return the closest explicit decision.
///
/// `grants` maps folder ids to the grants attached to them; only grants
/// held by `actor` are considered.
pub fn walk_chain(
    chain: &[Folder],
    grants: &HashMap<FolderId, Vec<FolderPermission>>,
    actor: &Actor,
    right: Right,
    max_depth: usize,
) -> ChainVerdict {
    let mut visited: HashSet<FolderId> = HashSet::with_capacity(chain.len());

    for (level, folder) in chain.iter().enumerate() {
        if level >= max_depth || !visited.insert(folder.id) {
            return ChainVerdict::Corrupt;
        }

        let at_anchor = level == 0;
        let decided = grants
            .get(&folder.id)
            .into_iter()
            .flatten()
            .filter(|g| g.scope.applies(at_anchor) && actor.holds(&g.principal))
            .filter_map(|g| g.state(right))
            .reduce(GrantState::merge);

        if let Some(state) = decided {
            return ChainVerdict::Explicit {
                state,
                folder_id: folder.id,
                level,
            };
        }
    }

    ChainVerdict::Unset
}
