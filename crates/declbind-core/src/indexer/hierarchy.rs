//! Base-class resolution and `isalgorithm` propagation.

use tracing::debug;

use crate::errors::{DeclbindError, DeclbindResult};
use crate::models::DeclModel;

/// Per-node state of the propagation walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Visit {
    Unvisited,
    Visiting,
    Done,
}

/// Find the known class a base reference names: segments are tried from
/// most to least qualified, dropping the second-to-last one each time.
pub fn resolve_base_name(model: &DeclModel, base: &str) -> Option<String> {
    let mut chunks: Vec<&str> = base.split('_').collect();
    loop {
        let candidate = chunks.join("_");
        if model.classes.contains_key(&candidate) {
            return Some(candidate);
        }
        if chunks.len() <= 1 {
            return None;
        }
        chunks.remove(chunks.len() - 2);
    }
}

/// Resolve every base reference, then propagate `isalgorithm` down
/// inheritance chains of any depth.
pub fn resolve_hierarchy(model: &mut DeclModel) -> DeclbindResult<()> {
    let names: Vec<String> = model.classes.keys().cloned().collect();
    for name in &names {
        let Some(base) = model.classes[name].base.clone() else {
            continue;
        };
        let resolved = resolve_base_name(model, &base).ok_or_else(|| DeclbindError::UnresolvedBase {
            base: base.clone(),
            class: name.clone(),
        })?;
        let base_is_algorithm = model.classes[&resolved].isalgorithm;
        let class = &mut model.classes[name];
        if resolved != base {
            debug!(class = %name, base = %base, resolved = %resolved, "resolved base by dropping qualifiers");
        }
        class.base = Some(resolved);
        class.isalgorithm |= base_is_algorithm;
    }
    propagate_algorithm(model);
    Ok(())
}

/// Memoized walk over the class arena. A node met again while still
/// `Visiting` reads as "not yet algorithm".
fn propagate_algorithm(model: &mut DeclModel) {
    let count = model.classes.len();
    let base_of: Vec<Option<usize>> = model
        .classes
        .values()
        .map(|c| c.base.as_ref().and_then(|b| model.classes.get_index_of(b)))
        .collect();
    let mut flags: Vec<bool> = model.classes.values().map(|c| c.isalgorithm).collect();
    let mut state = vec![Visit::Unvisited; count];

    for start in 0..count {
        if state[start] == Visit::Done {
            continue;
        }
        // Walk up to the first node whose answer is known, then settle the
        // chain on the way back.
        let mut chain = Vec::new();
        let mut node = Some(start);
        let mut inherited = false;
        while let Some(idx) = node {
            match state[idx] {
                Visit::Done => {
                    inherited = flags[idx];
                    break;
                }
                Visit::Visiting => break,
                Visit::Unvisited => {
                    if flags[idx] {
                        state[idx] = Visit::Done;
                        inherited = true;
                        break;
                    }
                    state[idx] = Visit::Visiting;
                    chain.push(idx);
                    node = base_of[idx];
                }
            }
        }
        for idx in chain.into_iter().rev() {
            flags[idx] |= inherited;
            inherited = flags[idx];
            state[idx] = Visit::Done;
        }
    }

    let changed = model
        .classes
        .values()
        .zip(&flags)
        .filter(|(class, flag)| **flag && !class.isalgorithm)
        .count();
    if changed > 0 {
        debug!(classes = changed, "isalgorithm propagated through base chains");
    }
    for (class, flag) in model.classes.values_mut().zip(flags) {
        class.isalgorithm = flag;
    }
}
