//! Table load ordering.
//!
//! Two strategies are available through [`Ordering`]:
//!
//! - **Anchors**: each named table is moved to the head of the list, in list
//!   order, so the last anchor ends up first. Everything else keeps its
//!   relative order. Anchors missing from the worklist are ignored.
//! - **Dependencies**: Kahn's algorithm over explicit edges. Among tables
//!   that are ready at the same time the one with the lowest original index
//!   goes first, so independent tables keep their input order.
//!
//! Both return a permutation of the input.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::config::{Dependency, Ordering};
use crate::error::{Result, SyncError};

/// Reorder `tables` using the configured strategy.
pub fn plan(tables: &[String], ordering: &Ordering) -> Result<Vec<String>> {
    let planned = match ordering {
        Ordering::Anchors(anchors) => reorder(tables, anchors),
        Ordering::Dependencies(deps) => dependency_order(tables, deps)?,
    };
    debug!("Table order: {}", planned.join(","));
    Ok(planned)
}

/// Move anchor tables to the front by remove-then-insert-at-head.
pub fn reorder<S: AsRef<str>>(tables: &[String], anchors: &[S]) -> Vec<String> {
    let mut ordered = tables.to_vec();
    for anchor in anchors {
        if let Some(pos) = ordered.iter().position(|t| t == anchor.as_ref()) {
            let table = ordered.remove(pos);
            ordered.insert(0, table);
        }
    }
    ordered
}

/// Topologically sort `tables` so every table follows its dependencies.
///
/// Edges naming tables outside the worklist are ignored. A cycle is a
/// configuration error.
pub fn dependency_order(tables: &[String], deps: &[Dependency]) -> Result<Vec<String>> {
    let index: HashMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();

    let mut indegree = vec![0usize; tables.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];

    for dep in deps {
        let Some(&child) = index.get(dep.table.as_str()) else {
            continue;
        };
        for parent in &dep.depends_on {
            let Some(&parent) = index.get(parent.as_str()) else {
                continue;
            };
            if parent == child {
                return Err(SyncError::Config(format!(
                    "table {} depends on itself",
                    tables[child]
                )));
            }
            if !dependents[parent].contains(&child) {
                dependents[parent].push(child);
                indegree[child] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..tables.len()).filter(|&i| indegree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(tables.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(tables[next].clone());
        for &child in &dependents[next] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if ordered.len() != tables.len() {
        let cyclic: Vec<&str> = (0..tables.len())
            .filter(|&i| indegree[i] > 0)
            .map(|i| tables[i].as_str())
            .collect();
        return Err(SyncError::Config(format!(
            "dependency cycle between tables: {}",
            cyclic.join(", ")
        )));
    }

    Ok(ordered)
}
