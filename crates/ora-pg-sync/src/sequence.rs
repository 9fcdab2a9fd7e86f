//! Sequence allocator reconciliation.
//!
//! For each sequence known to both stores, with source last value `S` and
//! destination last value `D`: nothing happens when `D >= S`; otherwise the
//! destination is moved so its next value is `S + 1`. Destinations that can
//! restart a sequence do so directly. The others widen the increment step
//! to `S - D + 1`, allocate once and put the step back to 1.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::core::{DestinationStore, SequenceState, Store};
use crate::dialect::SequenceStrategy;
use crate::error::Result;

pub struct SequenceReconciler<'a> {
    source: &'a dyn Store,
    destination: &'a dyn DestinationStore,
}

impl<'a> SequenceReconciler<'a> {
    pub fn new(source: &'a dyn Store, destination: &'a dyn DestinationStore) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Align every shared sequence; returns the ones that were advanced.
    pub async fn reconcile(&self) -> Result<Vec<SequenceState>> {
        let destination: HashMap<String, i64> = self
            .destination
            .sequences()
            .await?
            .into_iter()
            .map(|s| (s.name.to_uppercase(), s.last_value))
            .collect();

        let mut adjusted = Vec::new();
        for seq in self.source.sequences().await? {
            let name = seq.name.to_uppercase();
            let Some(&destination_last) = destination.get(&name) else {
                warn!(
                    "sequence {} not found in {}, ignore",
                    name,
                    self.destination.dialect().backend()
                );
                continue;
            };

            let state = SequenceState {
                name,
                source_last: seq.last_value,
                destination_last,
            };
            if !state.needs_advance() {
                debug!(
                    "sequence {} has value not less than source [{} >= {}], ignore",
                    state.name, state.destination_last, state.source_last
                );
                continue;
            }

            self.advance(&state).await?;
            adjusted.push(state);
        }
        Ok(adjusted)
    }

    async fn advance(&self, state: &SequenceState) -> Result<()> {
        let dialect = self.destination.dialect();
        match dialect.sequence_strategy() {
            SequenceStrategy::Restart => {
                let sql = dialect.restart_sequence_sql(&state.name, state.source_last + 1);
                info!("{}", sql);
                self.destination.execute(&sql).await?;
            }
            SequenceStrategy::IncrementStep => {
                let step = state.source_last - state.destination_last + 1;
                let widen = dialect.sequence_increment_sql(&state.name, step);
                info!("{}", widen);
                self.destination.execute(&widen).await?;
                let value = self.destination.next_sequence_value(&state.name).await?;
                debug!("{} allocated {}", state.name, value);
                self.destination
                    .execute(&dialect.sequence_increment_sql(&state.name, 1))
                    .await?;
                info!("sequence {} incremented by {}", state.name, step);
            }
        }
        Ok(())
    }
}
