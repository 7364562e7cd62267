//! Row builders for the watched tables, in column order.

use rmevents_config::shared::WatchedTable;

use crate::source::OwnedValue;

fn text(value: &str) -> OwnedValue {
    OwnedValue::text(value)
}

pub fn pending_event_row(id: i32, fan_out: i32) -> Vec<OwnedValue> {
    vec![
        OwnedValue::Int32(id),
        text(&format!("node-{id}")),
        text("NODE_UPDATE"),
        text("NEW"),
        OwnedValue::Int32(fan_out),
    ]
}

pub fn rm_node_row(id: i32) -> Vec<OwnedValue> {
    vec![
        text(&format!("node-{id}")),
        text(&format!("host-{id}.example.com")),
        OwnedValue::Int32(8041),
        OwnedValue::Int32(8042),
        text("healthy"),
        OwnedValue::Int64(1_700_000_000_000 + i64::from(id)),
        text("RUNNING"),
        text("3.3.6"),
        OwnedValue::Int32(id),
    ]
}

pub fn resource_row(id: i32) -> Vec<OwnedValue> {
    vec![
        text(&format!("node-{id}")),
        OwnedValue::Int32(4096),
        OwnedValue::Int32(8),
        OwnedValue::Int32(id),
    ]
}

pub fn updated_container_info_row(id: i32, n: i32) -> Vec<OwnedValue> {
    vec![
        text(&format!("node-{id}")),
        text(&format!("container-{id}-{n}")),
        OwnedValue::Int32(n),
        OwnedValue::Int32(id),
    ]
}

pub fn container_status_row(id: i32, n: i32) -> Vec<OwnedValue> {
    vec![
        text(&format!("container-{id}-{n}")),
        text(&format!("node-{id}")),
        text("UPDATE"),
        text("COMPLETE"),
        OwnedValue::Null,
        OwnedValue::Int32(0),
        OwnedValue::Int32(n),
        OwnedValue::Int32(id),
    ]
}

/// Every row change of one complete event, root last.
pub fn complete_event_rows(id: i32, fan_out: i32) -> Vec<(WatchedTable, Vec<OwnedValue>)> {
    let mut rows = vec![
        (WatchedTable::RmNode, rm_node_row(id)),
        (WatchedTable::Resource, resource_row(id)),
    ];
    for n in 0..fan_out {
        rows.push((
            WatchedTable::UpdatedContainerInfo,
            updated_container_info_row(id, n),
        ));
        rows.push((WatchedTable::ContainerStatus, container_status_row(id, n)));
    }
    rows.push((WatchedTable::PendingEvents, pending_event_row(id, fan_out)));

    rows
}
