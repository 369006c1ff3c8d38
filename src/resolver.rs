// Compartment tree discovery: every ACTIVE compartment under a root, flattened with
// slash-joined path names. Inactive compartments prune their whole subtree.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::cloud::IdentityApi;
use crate::models::{Compartment, CompartmentRecord};

/// Pre-order walk: a compartment is always followed by its own descendants before its
/// next sibling. API errors abort the walk.
#[instrument(skip(identity), fields(operation = "resolve_compartments"))]
pub async fn resolve_compartments<I>(identity: &I, root_id: &str) -> anyhow::Result<Vec<Compartment>>
where
    I: IdentityApi + ?Sized,
{
    let root = identity.get_compartment(root_id).await?;
    if !root.lifecycle_state.is_active() {
        warn!(
            compartment = %root_id,
            state = ?root.lifecycle_state,
            "root compartment is not active, nothing to scan"
        );
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![Compartment {
        name: root.name.trim().to_string(),
        id: root.id.clone(),
        lifecycle_state: root.lifecycle_state,
    }];

    while let Some(current) = stack.pop() {
        if !seen.insert(current.id.clone()) {
            continue;
        }
        let children = identity.list_compartments(&current.id).await?;
        let active: Vec<Compartment> = children
            .into_iter()
            .filter(|c| c.lifecycle_state.is_active())
            .map(|c| child_of(&current, c))
            .collect();
        debug!(compartment = %current.name, children = active.len(), "listed children");
        out.push(current);
        stack.extend(active.into_iter().rev());
    }

    Ok(out)
}

fn child_of(parent: &Compartment, record: CompartmentRecord) -> Compartment {
    Compartment {
        name: format!("{}/{}", parent.name, record.name.trim()),
        id: record.id,
        lifecycle_state: record.lifecycle_state,
    }
}
