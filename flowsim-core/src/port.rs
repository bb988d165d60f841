use crate::{
    element::ElementId, measure::Rate, packet::Packet, scheduler::Context,
    simulation::SimError,
};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Capacity of a [`SwitchPort`]'s buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum QueueLimit {
    /// every packet is admitted
    #[default]
    Unlimited,
    /// drop-tail on bytes: a packet is admitted only if the occupied bytes,
    /// including the new packet, stay strictly below the limit
    Bytes(f64),
    /// drop-tail on packets: a packet is admitted only if the number of
    /// waiting packets is strictly below `limit - 1`, one place being kept
    /// for the packet in service
    Packets(usize),
}

/// What a [`PortMonitor`](crate::monitor::PortMonitor) reads from a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorMode {
    /// waiting packets, plus one while a packet is in service
    #[default]
    Packets,
    /// occupied bytes, see [`SwitchPort::byte_size`]
    Bytes,
}

/// A finite buffer served at a fixed [`Rate`].
///
/// ```text
///  put ──► [ admission ] ──► [ FIFO buffer ] ──► [ server ] ──► out
///              │                                  size*8/rate
///              ▼
///           dropped
/// ```
///
/// The port is either idle (nothing buffered, nothing in service) or
/// serving. A packet put into an idle port starts its service at the same
/// instant, once the events already due at this instant ran. When a
/// service completes the packet is forwarded and the next buffered packet,
/// if any, starts its service immediately.
///
/// # Occupancy
///
/// [`SwitchPort::byte_size`] counts the bytes of the packets *waiting* in
/// the buffer: a packet's size is added on admission and removed the
/// moment its service begins. Admission decisions use that counter, so a
/// packet in service does not hold buffer room.
///
/// Dropping is silent for the caller of `put`; it is only visible in
/// [`SwitchPort::packets_dropped`].
///
/// Ports are created with [`Simulation::new_port`].
///
/// [`Simulation::new_port`]: crate::simulation::Simulation::new_port
pub struct SwitchPort {
    id: ElementId,
    rate: Rate,
    limit: QueueLimit,
    out: Option<ElementId>,

    queue: VecDeque<Packet>,
    in_service: Option<Packet>,
    byte_size: f64,
    state: PortState,

    packets_received: u64,
    packets_dropped: u64,
    packets_sent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortState {
    /// nothing buffered, nothing in service
    Idle,
    /// a packet was buffered while idle, service starts at this instant
    Starting,
    /// transmitting `in_service`
    Serving,
}

impl SwitchPort {
    pub(crate) fn new(id: ElementId, rate: Rate, limit: QueueLimit) -> Self {
        Self {
            id,
            rate,
            limit,
            out: None,
            queue: VecDeque::new(),
            in_service: None,
            byte_size: 0.0,
            state: PortState::Idle,
            packets_received: 0,
            packets_dropped: 0,
            packets_sent: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> ElementId {
        self.id
    }

    #[inline]
    pub fn rate(&self) -> Rate {
        self.rate
    }

    #[inline]
    pub fn limit(&self) -> QueueLimit {
        self.limit
    }

    #[inline]
    pub fn out(&self) -> Option<ElementId> {
        self.out
    }

    /// bytes of the packets waiting in the buffer
    #[inline]
    pub fn byte_size(&self) -> f64 {
        self.byte_size
    }

    /// number of packets waiting in the buffer (not counting the packet in
    /// service)
    #[inline]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// `true` while a packet is in service
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.in_service.is_some()
    }

    #[inline]
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    #[inline]
    pub fn packets_dropped(&self) -> u64 {
        self.packets_dropped
    }

    #[inline]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// bytes of the waiting packets, recounted from the buffer
    #[cfg(test)]
    pub(crate) fn queued_bytes(&self) -> f64 {
        self.queue.iter().map(Packet::size).sum()
    }

    /// the occupancy a monitor observes
    pub fn occupancy(&self, mode: MonitorMode) -> f64 {
        match mode {
            MonitorMode::Bytes => self.byte_size,
            MonitorMode::Packets => (self.queue.len() + usize::from(self.is_busy())) as f64,
        }
    }

    pub(crate) fn set_out(&mut self, out: ElementId) {
        self.out = Some(out);
    }

    fn admits(&self, prospective_bytes: f64) -> bool {
        match self.limit {
            QueueLimit::Unlimited => true,
            QueueLimit::Bytes(limit) => prospective_bytes < limit,
            QueueLimit::Packets(limit) => self.queue.len() < limit.saturating_sub(1),
        }
    }

    pub(crate) fn put(&mut self, mut packet: Packet, ctx: &mut Context<'_>) {
        self.packets_received += 1;
        let prospective_bytes = self.byte_size + packet.size();

        if !self.admits(prospective_bytes) {
            self.packets_dropped += 1;
            debug!(
                element = %self.id,
                packet = packet.packet_id(),
                flow = packet.flow_id(),
                byte_size = self.byte_size,
                queue_len = self.queue.len(),
                reason = "buffer full",
                "dropping packet",
            );
            return;
        }

        self.byte_size = prospective_bytes;
        packet.record_hop(self.id, ctx.now());
        self.queue.push_back(packet);

        if self.state == PortState::Idle {
            self.state = PortState::Starting;
            ctx.wake_now();
        }
    }

    pub(crate) fn wake(&mut self, ctx: &mut Context<'_>) -> Result<(), SimError> {
        match self.state {
            PortState::Idle => {}
            PortState::Starting => self.serve_next(ctx),
            PortState::Serving => {
                let Some(out) = self.out else {
                    return Err(SimError::Unwired { element: self.id });
                };
                if let Some(packet) = self.in_service.take() {
                    trace!(
                        element = %self.id,
                        packet = packet.packet_id(),
                        time = %ctx.now(),
                        "service completed",
                    );
                    self.packets_sent += 1;
                    ctx.forward(out, packet);
                }
                self.serve_next(ctx);
            }
        }
        Ok(())
    }

    fn serve_next(&mut self, ctx: &mut Context<'_>) {
        let Some(packet) = self.queue.pop_front() else {
            self.state = PortState::Idle;
            return;
        };

        self.byte_size -= packet.size();
        if self.queue.is_empty() {
            // keep the counter exact once the buffer drained
            self.byte_size = 0.0;
        }
        let service_time = self.rate.service_time(packet.size());
        trace!(
            element = %self.id,
            packet = packet.packet_id(),
            service_time,
            "service started",
        );

        self.in_service = Some(packet);
        self.state = PortState::Serving;
        ctx.wake_in(service_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scheduler::Harness, time::Time};

    const PORT: ElementId = ElementId::new(0);
    const OUT: ElementId = ElementId::new(1);

    fn port(limit: QueueLimit) -> SwitchPort {
        let mut port = SwitchPort::new(PORT, Rate::new(8_000.0), limit);
        port.set_out(OUT);
        port
    }

    fn packet(id: u64, size: f64) -> Packet {
        Packet::builder(Time::ZERO, id).size(size).build().unwrap()
    }

    #[test]
    fn serves_one_packet() {
        let mut h = Harness::new();
        let mut port = port(QueueLimit::Unlimited);

        h.with(PORT, |ctx| port.put(packet(1, 100.0), ctx));
        assert!(!port.is_busy());
        assert_eq!(port.byte_size(), 100.0);

        // service starts at the same instant
        assert_eq!(h.next(), Some(PORT));
        assert_eq!(h.now, Time::ZERO);
        h.with(PORT, |ctx| port.wake(ctx)).unwrap();
        assert!(port.is_busy());
        assert_eq!(port.byte_size(), 0.0);

        assert_eq!(h.next(), Some(PORT));
        assert_eq!(h.now, Time::from_secs(0.1));
        h.with(PORT, |ctx| port.wake(ctx)).unwrap();
        assert!(!port.is_busy());
        assert_eq!(port.packets_sent(), 1);
        assert!(h.next().is_none());

        let (to, sent) = &h.forwarded[0];
        assert_eq!(*to, OUT);
        assert_eq!(sent.perhop().get(&PORT), Some(&Time::ZERO));
    }

    #[test]
    fn byte_limit_is_strict() {
        let mut h = Harness::new();
        let mut port = port(QueueLimit::Bytes(1_000.0));

        h.with(PORT, |ctx| {
            port.put(packet(1, 500.0), ctx);
            port.put(packet(2, 500.0), ctx);
        });
        assert_eq!(port.packets_received(), 2);
        assert_eq!(port.packets_dropped(), 1);
        assert_eq!(port.queue_len(), 1);
    }

    #[test]
    fn packet_in_service_frees_buffer_room() {
        let mut h = Harness::new();
        let mut port = port(QueueLimit::Bytes(1_000.0));

        h.with(PORT, |ctx| port.put(packet(1, 900.0), ctx));
        h.next();
        h.with(PORT, |ctx| port.wake(ctx)).unwrap();
        assert!(port.is_busy());

        h.with(PORT, |ctx| port.put(packet(2, 900.0), ctx));
        assert_eq!(port.packets_dropped(), 0);
        assert_eq!(port.byte_size(), 900.0);
    }

    #[test]
    fn packet_limit_keeps_one_place() {
        let mut h = Harness::new();
        let mut single = port(QueueLimit::Packets(1));
        let mut pair = port(QueueLimit::Packets(2));

        h.with(PORT, |ctx| {
            single.put(packet(1, 10.0), ctx);
            pair.put(packet(1, 10.0), ctx);
            pair.put(packet(2, 10.0), ctx);
        });

        assert_eq!(single.packets_dropped(), 1);
        assert_eq!(pair.packets_dropped(), 1);
        assert_eq!(pair.queue_len(), 1);
    }

    #[test]
    fn occupancy() {
        let mut h = Harness::new();
        let mut port = port(QueueLimit::Unlimited);

        h.with(PORT, |ctx| {
            for id in 1..=3 {
                port.put(packet(id, 100.0), ctx);
            }
        });
        assert_eq!(port.occupancy(MonitorMode::Packets), 3.0);
        assert_eq!(port.occupancy(MonitorMode::Bytes), 300.0);

        h.next();
        h.with(PORT, |ctx| port.wake(ctx)).unwrap();
        assert_eq!(port.occupancy(MonitorMode::Packets), 3.0);
        assert_eq!(port.occupancy(MonitorMode::Bytes), 200.0);
    }

    #[test]
    fn unwired_port() {
        let mut h = Harness::new();
        let mut port = SwitchPort::new(PORT, Rate::new(8_000.0), QueueLimit::Unlimited);

        h.with(PORT, |ctx| port.put(packet(1, 100.0), ctx));
        h.next();
        h.with(PORT, |ctx| port.wake(ctx)).unwrap();
        h.next();
        let err = h.with(PORT, |ctx| port.wake(ctx)).unwrap_err();
        assert_eq!(err, SimError::Unwired { element: PORT });
    }
}
