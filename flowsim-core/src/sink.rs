use crate::{element::ElementId, packet::Packet, time::Time};
use std::{collections::BTreeMap, fmt};
use tracing::debug;

/// How a [`PacketSink`] groups the packets it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyBy {
    /// one [`FlowStats`] per flow id
    #[default]
    FlowId,
    /// one [`FlowStats`] per source label (the packet's `src`)
    Source,
}

/// Key of the per flow statistics of a [`PacketSink`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlowKey {
    Flow(u64),
    Source(String),
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flow(flow_id) => write!(f, "flow {flow_id}"),
            Self::Source(src) => f.write_str(src),
        }
    }
}

impl From<u64> for FlowKey {
    fn from(flow_id: u64) -> Self {
        Self::Flow(flow_id)
    }
}

impl From<&str> for FlowKey {
    fn from(src: &str) -> Self {
        Self::Source(src.to_owned())
    }
}

/// Per flow record of a [`PacketSink`]. Every sequence is in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowStats {
    waits: Vec<f64>,
    packet_sizes: Vec<f64>,
    packet_times: Vec<Time>,
    perhop_times: Vec<BTreeMap<ElementId, Time>>,
    arrivals: Vec<f64>,
    first_arrival: Time,
    last_arrival: Time,
    packets_received: u64,
    bytes_received: f64,
}

impl FlowStats {
    /// time between the creation of each packet and its arrival at the sink
    pub fn waits(&self) -> &[f64] {
        &self.waits
    }

    pub fn packet_sizes(&self) -> &[f64] {
        &self.packet_sizes
    }

    /// creation time of each packet
    pub fn packet_times(&self) -> &[Time] {
        &self.packet_times
    }

    /// [`Packet::perhop`] of each packet, as it reached the sink
    pub fn perhop_times(&self) -> &[BTreeMap<ElementId, Time>] {
        &self.perhop_times
    }

    /// arrival times, absolute or relative to the previous arrival depending
    /// on the sink configuration
    pub fn arrivals(&self) -> &[f64] {
        &self.arrivals
    }

    /// time of the first recorded arrival
    pub fn first_arrival(&self) -> Time {
        self.first_arrival
    }

    /// time of the last recorded arrival
    pub fn last_arrival(&self) -> Time {
        self.last_arrival
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn bytes_received(&self) -> f64 {
        self.bytes_received
    }

    pub fn mean_wait(&self) -> Option<f64> {
        if self.waits.is_empty() {
            None
        } else {
            Some(self.waits.iter().sum::<f64>() / self.waits.len() as f64)
        }
    }

    /// bytes per second between the first and the last recorded arrival
    ///
    /// The first packet only opens the window, its bytes are not counted.
    pub fn throughput(&self) -> Option<f64> {
        let elapsed = self.last_arrival - self.first_arrival;
        let first = self.packet_sizes.first()?;
        if elapsed <= 0.0 {
            return None;
        }
        Some((self.packet_sizes.iter().sum::<f64>() - first) / elapsed)
    }

    /// bytes per second over the last `window` packets
    ///
    /// The window opens with the arrival of the `window`-th packet from
    /// the end and closes at the last arrival. Requires waits to be recorded.
    pub fn recent_throughput(&self, window: usize) -> Option<f64> {
        let len = self.packet_sizes.len();
        if window < 2 || len < window {
            return None;
        }
        let start = len - window;
        let opened = self.packet_times[start] + self.waits[start];
        let closed = self.packet_times[len - 1] + self.waits[len - 1];
        let elapsed = closed - opened;
        if elapsed <= 0.0 {
            return None;
        }
        let bytes: f64 = self.packet_sizes[start + 1..].iter().sum();
        Some(bytes / elapsed)
    }
}

/// Terminal element collecting per flow statistics.
///
/// A sink never drops and never blocks. On every arrival it increments
/// the packet and byte counters of the packet's flow and, depending on
/// its configuration:
///
/// * records the wait (`now - packet.time()`), size, creation time and
///   per hop log of the packet;
/// * records the arrival time, either absolute or as the delta from the
///   previous arrival of the same flow (the first delta being measured
///   from time `0`).
///
/// Sinks are created with [`Simulation::new_sink`].
///
/// [`Simulation::new_sink`]: crate::simulation::Simulation::new_sink
#[derive(Debug)]
pub struct PacketSink {
    id: ElementId,
    config: SinkConfig,
    flows: BTreeMap<FlowKey, FlowStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SinkConfig {
    pub(crate) record_arrivals: bool,
    pub(crate) absolute_arrivals: bool,
    pub(crate) record_waits: bool,
    pub(crate) key_by: KeyBy,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            record_arrivals: true,
            absolute_arrivals: true,
            record_waits: true,
            key_by: KeyBy::FlowId,
        }
    }
}

impl PacketSink {
    pub(crate) fn new(id: ElementId, config: SinkConfig) -> Self {
        Self {
            id,
            config,
            flows: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ElementId {
        self.id
    }

    #[inline]
    pub fn key_by(&self) -> KeyBy {
        self.config.key_by
    }

    /// statistics of one flow, if any of its packets arrived
    ///
    /// ```
    /// # use flowsim_core::{Simulation, Time, dist::Constant, sink::FlowKey};
    /// let mut sim = Simulation::new();
    /// let sink = sim.new_sink().build();
    /// let source = sim
    ///     .new_source(Constant::new(1.5).unwrap(), Constant::new(100.0).unwrap())
    ///     .build()
    ///     .unwrap();
    /// sim.connect(source, sink).unwrap();
    /// sim.run_until(Time::from_secs(10.0)).unwrap();
    ///
    /// let flow = sim.sink(sink).unwrap().flow(&FlowKey::Flow(0)).unwrap();
    /// assert_eq!(flow.arrivals(), &[1.5, 3.0, 4.5, 6.0, 7.5, 9.0]);
    /// ```
    pub fn flow(&self, key: &FlowKey) -> Option<&FlowStats> {
        self.flows.get(key)
    }

    /// every flow seen so far, ordered by key
    pub fn flows(&self) -> impl Iterator<Item = (&FlowKey, &FlowStats)> {
        self.flows.iter()
    }

    pub fn packets_received(&self) -> u64 {
        self.flows.values().map(FlowStats::packets_received).sum()
    }

    pub fn bytes_received(&self) -> f64 {
        self.flows.values().map(FlowStats::bytes_received).sum()
    }

    /// The flow key takes the packet's source label and the flow's per hop
    /// log takes its hop map, so nothing is copied per arrival.
    pub(crate) fn put(&mut self, mut packet: Packet, now: Time) {
        let packet_id = packet.packet_id();
        let flow_id = packet.flow_id();
        let size = packet.size();
        let sent = packet.time();
        let key = match self.config.key_by {
            KeyBy::FlowId => FlowKey::Flow(flow_id),
            KeyBy::Source => FlowKey::Source(packet.take_src()),
        };
        let config = self.config;
        let stats = self.flows.entry(key).or_default();

        if config.record_waits {
            stats.waits.push(now - sent);
            stats.packet_sizes.push(size);
            stats.packet_times.push(sent);
            stats.perhop_times.push(packet.into_perhop());
        }

        if config.record_arrivals {
            if stats.arrivals.is_empty() {
                stats.first_arrival = now;
            }
            let arrival = if config.absolute_arrivals {
                now.as_secs()
            } else {
                now - stats.last_arrival
            };
            stats.arrivals.push(arrival);
            stats.last_arrival = now;
        }

        stats.packets_received += 1;
        stats.bytes_received += size;

        debug!(
            element = %self.id,
            packet = packet_id,
            flow = flow_id,
            time = %now,
            "packet arrived",
        );
    }
}
