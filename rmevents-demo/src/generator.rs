use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rmevents::error::StreamResult;
use rmevents::source::{MemorySourceSender, OwnedValue};
use rmevents_config::shared::WatchedTable;

const NODE_STATES: &[&str] = &["RUNNING", "UNHEALTHY", "DECOMMISSIONING"];
const CONTAINER_STATES: &[&str] = &["NEW", "RUNNING", "COMPLETE"];

/// Produces the row changes of synthetic events with random fan-outs and arrival order.
pub struct EventGenerator {
    rng: StdRng,
    max_fan_out: u32,
    next_id: i32,
}

impl EventGenerator {
    pub fn new(seed: u64, max_fan_out: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_fan_out,
            next_id: 0,
        }
    }

    /// Sends every row of the next event to the matching sender.
    pub fn send_event(&mut self, senders: &[(WatchedTable, MemorySourceSender)]) -> StreamResult<()> {
        for (table, row) in self.next_event() {
            if let Some((_, sender)) = senders.iter().find(|(existing, _)| *existing == table) {
                sender.send(row)?;
            }
        }

        Ok(())
    }

    fn next_event(&mut self) -> Vec<(WatchedTable, Vec<OwnedValue>)> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(0);

        let fan_out = self.rng.gen_range(0..=self.max_fan_out) as i32;
        let node = format!("node-{}", self.rng.gen_range(0..64));
        let node_state = NODE_STATES[self.rng.gen_range(0..NODE_STATES.len())];

        let mut rows = vec![
            (
                WatchedTable::PendingEvents,
                vec![
                    OwnedValue::Int32(id),
                    OwnedValue::text(&node),
                    OwnedValue::text("NODE_UPDATE"),
                    OwnedValue::text("NEW"),
                    OwnedValue::Int32(fan_out),
                ],
            ),
            (
                WatchedTable::RmNode,
                vec![
                    OwnedValue::text(&node),
                    OwnedValue::text(format!("{node}.cluster.local")),
                    OwnedValue::Int32(45454),
                    OwnedValue::Int32(8042),
                    OwnedValue::text(""),
                    OwnedValue::Int64(self.rng.gen_range(1_600_000_000_000..1_800_000_000_000)),
                    OwnedValue::text(node_state),
                    OwnedValue::text("3.3.6"),
                    OwnedValue::Int32(id),
                ],
            ),
            (
                WatchedTable::Resource,
                vec![
                    OwnedValue::text(&node),
                    OwnedValue::Int32(self.rng.gen_range(1..=64) * 1024),
                    OwnedValue::Int32(self.rng.gen_range(1..=32)),
                    OwnedValue::Int32(id),
                ],
            ),
        ];

        for n in 0..fan_out {
            let container = format!("container_{id}_{n:04}");
            rows.push((
                WatchedTable::UpdatedContainerInfo,
                vec![
                    OwnedValue::text(&node),
                    OwnedValue::text(&container),
                    OwnedValue::Int32(n),
                    OwnedValue::Int32(id),
                ],
            ));

            let state = CONTAINER_STATES[self.rng.gen_range(0..CONTAINER_STATES.len())];
            rows.push((
                WatchedTable::ContainerStatus,
                vec![
                    OwnedValue::text(&container),
                    OwnedValue::text(&node),
                    OwnedValue::text("UPDATE"),
                    OwnedValue::text(state),
                    OwnedValue::Null,
                    OwnedValue::Int32(0),
                    OwnedValue::Int32(n),
                    OwnedValue::Int32(id),
                ],
            ));
        }

        rows.shuffle(&mut self.rng);
        rows
    }
}
