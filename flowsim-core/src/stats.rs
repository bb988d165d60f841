//! Simulation statistics snapshots.
//!
//! [`SimStats`] provides a point-in-time snapshot of every element's
//! counters. Obtain one via [`Simulation::stats`](crate::simulation::Simulation::stats).

use crate::{element::ElementId, sink::FlowKey, time::Time};

/// Snapshot of a single packet source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStats {
    pub id: ElementId,
    /// `src` label of the emitted packets.
    pub label: String,
    pub flow_id: u64,
    /// Packets emitted so far.
    pub packets_sent: u64,
}

/// Snapshot of a single switch port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortStats {
    pub id: ElementId,
    /// Every packet `put` into the port, admitted or not.
    pub packets_received: u64,
    /// Packets rejected because the buffer was full.
    pub packets_dropped: u64,
    /// Packets that completed their service and left the port.
    pub packets_sent: u64,
    /// Bytes of the packets waiting in the buffer.
    pub byte_size: f64,
    /// Packets waiting in the buffer.
    pub queue_len: usize,
    /// Whether a packet is in service.
    pub busy: bool,
}

/// Snapshot of a single channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub id: ElementId,
    pub channel_id: u64,
    pub packets_received: u64,
    /// Packets lost to the loss distribution.
    pub packets_dropped: u64,
    pub packets_forwarded: u64,
    /// Packets still inside the channel.
    pub in_flight: usize,
}

/// Totals of one flow at a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowTotals {
    pub key: FlowKey,
    pub packets_received: u64,
    pub bytes_received: f64,
}

/// Snapshot of a single sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkStats {
    pub id: ElementId,
    /// Per flow totals, ordered by key.
    pub flows: Vec<FlowTotals>,
}

/// Point-in-time snapshot of the entire simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimStats {
    /// The simulated time of the snapshot.
    pub now: Time,
    pub sources: Vec<SourceStats>,
    pub ports: Vec<PortStats>,
    pub channels: Vec<ChannelStats>,
    pub sinks: Vec<SinkStats>,
}
