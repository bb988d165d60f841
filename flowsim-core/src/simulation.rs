//! The simulation: an arena of elements driven by a single event queue.
//!
//! Elements are registered with builders ([`Simulation::new_source`],
//! [`Simulation::new_port`], ...), wired with [`Simulation::connect`] and
//! then driven with [`Simulation::run_until`]. Everything runs on a single
//! thread: at any instant at most one element is active, and elements only
//! interact through the packets they forward to each other.
//!
//! ```
//! use flowsim_core::{Simulation, Time, dist::{Constant, Exponential}, measure::Rate};
//!
//! let mut sim = Simulation::new();
//! sim.set_seed(42);
//!
//! let source = sim
//!     .new_source(Exponential::new(10.0).unwrap(), Constant::new(100.0).unwrap())
//!     .build()
//!     .unwrap();
//! let port = sim.new_port(Rate::new(100_000.0)).build().unwrap();
//! let sink = sim.new_sink().build();
//!
//! sim.connect(source, port).unwrap();
//! sim.connect(port, sink).unwrap();
//! sim.run_until(Time::from_secs(60.0)).unwrap();
//!
//! let stats = sim.stats();
//! assert_eq!(stats.ports[0].packets_dropped, 0);
//! ```

use crate::{
    channel::Channel,
    defaults,
    dist::{Distribution, SimRng},
    element::{ChannelId, ElementId, Emitter, MonitorId, PortId, Receiver, SinkId, SourceId},
    measure::Rate,
    monitor::PortMonitor,
    packet::Packet,
    port::{MonitorMode, QueueLimit, SwitchPort},
    scheduler::{Context, Scheduler},
    sink::{KeyBy, PacketSink, SinkConfig},
    source::{PacketSource, SourceConfig},
    stats::{ChannelStats, FlowTotals, PortStats, SimStats, SinkStats, SourceStats},
    time::Time,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Error returned while wiring or running a [`Simulation`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("Element ({element}) has no output connected")]
    Unwired { element: ElementId },
    #[error("Element ({element}) Not Found")]
    ElementNotFound { element: ElementId },
    #[error("Element ({element}) does not accept packets")]
    NotAReceiver { element: ElementId },
    #[error("Element ({element}) is not a switch port")]
    NotAPort { element: ElementId },
    #[error("Element ({element}) built an invalid packet: {reason}")]
    InvalidPacket { element: ElementId, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error returned by the builders when a parameter is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("port rate must be finite and strictly positive, got {0}")]
    InvalidRate(Rate),
    #[error("byte limit must not be negative, got {0}")]
    InvalidByteLimit(f64),
    #[error("initial delay must be finite and not negative, got {0}")]
    InvalidInitialDelay(f64),
    #[error("a constant interval must be strictly positive, got {0}")]
    NonPositiveInterval(f64),
}

/// A constant interval of zero or less would rearm the element at the same
/// instant forever.
fn check_interval(interval: &dyn Distribution) -> Result<(), ConfigError> {
    match interval.fixed_value() {
        Some(value) if value.is_nan() || value <= 0.0 => {
            Err(ConfigError::NonPositiveInterval(value))
        }
        _ => Ok(()),
    }
}

enum Element {
    Source(PacketSource),
    Port(SwitchPort),
    Channel(Channel),
    Sink(PacketSink),
    Monitor(PortMonitor),
}

impl Element {
    /// the downstream element, for the kinds that have one
    fn out(&self) -> Option<Option<ElementId>> {
        match self {
            Self::Source(source) => Some(source.out()),
            Self::Port(port) => Some(port.out()),
            Self::Channel(channel) => Some(channel.out()),
            Self::Sink(_) | Self::Monitor(_) => None,
        }
    }
}

/// A packet level discrete event simulation.
///
/// Time only advances inside [`run_until`](Simulation::run_until), and
/// jumps from one event to the next. Events due at the same instant run in
/// the order they were scheduled, so a run is fully determined by the
/// topology and the seed.
pub struct Simulation {
    now: Time,
    elements: Vec<Element>,
    scheduler: Scheduler,

    /// every random draw of every element comes from this generator
    rng: SimRng,
}

/// Builder for a [`PacketSource`].
///
/// Obtained via [`Simulation::new_source`].
///
/// ## Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | Label (`src` of the packets) | `"source"` |
/// | Initial delay | `0` |
/// | Finish | never |
/// | Flow id | `0` |
/// | Record emissions | no |
pub struct SourceBuilder<'a> {
    config: SourceConfig,

    simulation: &'a mut Simulation,
}

/// Builder for a [`SwitchPort`].
///
/// Obtained via [`Simulation::new_port`]. The buffer is unlimited unless a
/// limit is set with [`set_limit`](PortBuilder::set_limit).
pub struct PortBuilder<'a> {
    rate: Rate,
    limit: QueueLimit,

    simulation: &'a mut Simulation,
}

/// Builder for a [`Channel`].
///
/// Obtained via [`Simulation::new_channel`]. Channels are lossless unless a
/// loss distribution is set with [`set_loss`](ChannelBuilder::set_loss).
pub struct ChannelBuilder<'a> {
    channel_id: u64,
    delay: Box<dyn Distribution>,
    loss: Option<Box<dyn Distribution>>,

    simulation: &'a mut Simulation,
}

/// Builder for a [`PacketSink`].
///
/// Obtained via [`Simulation::new_sink`]. By default the sink records
/// waits and absolute arrival times, keyed by flow id.
pub struct SinkBuilder<'a> {
    config: SinkConfig,

    simulation: &'a mut Simulation,
}

/// Builder for a [`PortMonitor`].
///
/// Obtained via [`Simulation::new_monitor`]. Monitors count packets unless
/// told otherwise with [`set_mode`](MonitorBuilder::set_mode).
pub struct MonitorBuilder<'a> {
    port: PortId,
    interval: Box<dyn Distribution>,
    mode: MonitorMode,

    simulation: &'a mut Simulation,
}

impl SourceBuilder<'_> {
    /// Set the `src` of the emitted packets.
    pub fn set_label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Wait `delay` seconds before the first arrival interval starts.
    pub fn set_initial_delay(mut self, delay: f64) -> Self {
        self.config.initial_delay = delay;
        self
    }

    /// Stop arming new arrivals once the clock reaches `finish`.
    pub fn set_finish(mut self, finish: Time) -> Self {
        self.config.finish = finish;
        self
    }

    pub fn set_flow_id(mut self, flow_id: u64) -> Self {
        self.config.flow_id = flow_id;
        self
    }

    /// Keep the emission times and sizes, see [`PacketSource::time_rec`].
    pub fn record_flow(mut self, record: bool) -> Self {
        self.config.record = record;
        self
    }

    /// Register the source. It starts at the current simulated time.
    pub fn build(self) -> Result<SourceId, ConfigError> {
        let Self { config, simulation } = self;

        let delay = config.initial_delay;
        if !delay.is_finite() || delay < 0.0 {
            return Err(ConfigError::InvalidInitialDelay(delay));
        }
        check_interval(config.arrival.as_ref())?;

        let id = simulation.register(|id| Element::Source(PacketSource::new(id, config)));
        simulation.scheduler.schedule(simulation.now, id);

        Ok(SourceId::new(id))
    }
}

impl PortBuilder<'_> {
    pub fn set_limit(mut self, limit: QueueLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn build(self) -> Result<PortId, ConfigError> {
        let Self {
            rate,
            limit,
            simulation,
        } = self;

        if !rate.is_valid() {
            return Err(ConfigError::InvalidRate(rate));
        }
        if let QueueLimit::Bytes(bytes) = limit
            && (bytes.is_nan() || bytes < 0.0)
        {
            return Err(ConfigError::InvalidByteLimit(bytes));
        }

        let id = simulation.register(|id| Element::Port(SwitchPort::new(id, rate, limit)));
        Ok(PortId::new(id))
    }
}

impl ChannelBuilder<'_> {
    /// Sample a loss probability for every packet. The distribution is
    /// handed the packet's sequence id.
    pub fn set_loss<D>(mut self, loss: D) -> Self
    where
        D: Distribution + 'static,
    {
        self.loss = Some(Box::new(loss));
        self
    }

    /// Label the channel in the logs.
    pub fn set_channel_id(mut self, channel_id: u64) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn build(self) -> ChannelId {
        let Self {
            channel_id,
            delay,
            loss,
            simulation,
        } = self;

        let id = simulation
            .register(|id| Element::Channel(Channel::new(id, channel_id, delay, loss)));
        ChannelId::new(id)
    }
}

impl SinkBuilder<'_> {
    pub fn record_arrivals(mut self, record: bool) -> Self {
        self.config.record_arrivals = record;
        self
    }

    /// Record arrival times as absolute times (the default) or as the time
    /// elapsed since the previous arrival of the same flow.
    pub fn absolute_arrivals(mut self, absolute: bool) -> Self {
        self.config.absolute_arrivals = absolute;
        self
    }

    pub fn record_waits(mut self, record: bool) -> Self {
        self.config.record_waits = record;
        self
    }

    pub fn key_by(mut self, key_by: KeyBy) -> Self {
        self.config.key_by = key_by;
        self
    }

    pub fn build(self) -> SinkId {
        let Self { config, simulation } = self;

        let id = simulation.register(|id| Element::Sink(PacketSink::new(id, config)));
        SinkId::new(id)
    }
}

impl MonitorBuilder<'_> {
    pub fn set_mode(mut self, mode: MonitorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Register the monitor. It starts at the current simulated time.
    ///
    /// # Errors
    ///
    /// [`SimError::NotAPort`] if `port` does not designate a switch port of
    /// this simulation, [`ConfigError::NonPositiveInterval`] for a constant
    /// interval that is not strictly positive.
    pub fn build(self) -> Result<MonitorId, SimError> {
        let Self {
            port,
            interval,
            mode,
            simulation,
        } = self;

        check_interval(interval.as_ref())?;

        if simulation.port(port).is_none() {
            return Err(SimError::NotAPort {
                element: port.element(),
            });
        }

        let id =
            simulation.register(|id| Element::Monitor(PortMonitor::new(id, port, interval, mode)));
        simulation.scheduler.schedule(simulation.now, id);

        Ok(MonitorId::new(id))
    }
}

impl Simulation {
    /// Create an empty simulation at time `0`, seeded with the default seed.
    pub fn new() -> Self {
        Self {
            now: Time::ZERO,
            elements: Vec::new(),
            scheduler: Scheduler::new(),
            rng: SimRng::seed_from_u64(defaults::DEFAULT_SEED),
        }
    }

    /// Re-seed the random number generator shared by every element.
    ///
    /// Two simulations with the same topology and the same seed produce
    /// exactly the same run.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = SimRng::seed_from_u64(seed);
    }

    /// The current simulated time.
    #[inline]
    pub fn now(&self) -> Time {
        self.now
    }

    /// The time of the next pending event, if any.
    pub fn next_event_time(&self) -> Option<Time> {
        self.scheduler.time_to_next_event()
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    /// `true` when no event is pending: running further only moves the
    /// clock.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_empty()
    }

    /// Create a packet source emitting at intervals drawn from `arrival`,
    /// packets of sizes drawn from `size` (in bytes).
    ///
    /// Intervals must be strictly positive. A [`Constant`](crate::dist::Constant) interval of zero
    /// is rejected by [`build`](SourceBuilder::build); a sampled interval of
    /// zero or less rearms the source at the same instant.
    pub fn new_source<A, S>(&mut self, arrival: A, size: S) -> SourceBuilder<'_>
    where
        A: Distribution + 'static,
        S: Distribution + 'static,
    {
        SourceBuilder {
            config: SourceConfig {
                label: defaults::DEFAULT_SOURCE_LABEL.to_owned(),
                arrival: Box::new(arrival),
                size: Box::new(size),
                initial_delay: defaults::DEFAULT_INITIAL_DELAY,
                finish: Time::NEVER,
                flow_id: defaults::DEFAULT_FLOW_ID,
                record: false,
            },
            simulation: self,
        }
    }

    /// Create a switch port serving its buffer at `rate`.
    pub fn new_port(&mut self, rate: Rate) -> PortBuilder<'_> {
        PortBuilder {
            rate,
            limit: QueueLimit::default(),
            simulation: self,
        }
    }

    /// Create a channel delaying every packet by a duration drawn from
    /// `delay` (in seconds).
    pub fn new_channel<D>(&mut self, delay: D) -> ChannelBuilder<'_>
    where
        D: Distribution + 'static,
    {
        ChannelBuilder {
            channel_id: 0,
            delay: Box::new(delay),
            loss: None,
            simulation: self,
        }
    }

    pub fn new_sink(&mut self) -> SinkBuilder<'_> {
        SinkBuilder {
            config: SinkConfig::default(),
            simulation: self,
        }
    }

    /// Create a monitor sampling `port` at intervals drawn from `interval`.
    ///
    /// As for [`new_source`](Self::new_source), intervals must be strictly
    /// positive.
    pub fn new_monitor<D>(&mut self, port: PortId, interval: D) -> MonitorBuilder<'_>
    where
        D: Distribution + 'static,
    {
        MonitorBuilder {
            port,
            interval: Box::new(interval),
            mode: MonitorMode::default(),
            simulation: self,
        }
    }

    fn register(&mut self, element: impl FnOnce(ElementId) -> Element) -> ElementId {
        let id = ElementId::new(self.elements.len());
        self.elements.push(element(id));
        id
    }

    /// Set the `out` of `from` to `to`, replacing any previous connection.
    ///
    /// # Errors
    ///
    /// - [`SimError::ElementNotFound`] if either element is not part of
    ///   this simulation.
    /// - [`SimError::NotAReceiver`] if `to` does not accept packets.
    pub fn connect<E, R>(&mut self, from: E, to: R) -> Result<(), SimError>
    where
        E: Emitter,
        R: Receiver,
    {
        let from = Emitter::element(from);
        let to = Receiver::element(to);

        match self.elements.get(to.index()) {
            None => return Err(SimError::ElementNotFound { element: to }),
            Some(Element::Source(_) | Element::Monitor(_)) => {
                return Err(SimError::NotAReceiver { element: to });
            }
            Some(_) => {}
        }

        match self.elements.get_mut(from.index()) {
            Some(Element::Source(source)) => source.set_out(to),
            Some(Element::Port(port)) => port.set_out(to),
            Some(Element::Channel(channel)) => channel.set_out(to),
            Some(Element::Sink(_) | Element::Monitor(_)) | None => {
                return Err(SimError::ElementNotFound { element: from });
            }
        }

        debug!(from = %from, to = %to, "connected");
        Ok(())
    }

    /// Put `packet` into `to` at the current simulated time, as if an
    /// upstream element forwarded it.
    pub fn put<R: Receiver>(&mut self, to: R, packet: Packet) -> Result<(), SimError> {
        self.deliver(Receiver::element(to), packet)
    }

    /// Check that every source, port and channel has an output connected.
    pub fn validate(&self) -> Result<(), SimError> {
        for (index, element) in self.elements.iter().enumerate() {
            if let Some(None) = element.out() {
                return Err(SimError::Unwired {
                    element: ElementId::new(index),
                });
            }
        }
        Ok(())
    }

    /// Process every event due strictly before `horizon`, then move the
    /// clock to `horizon`.
    ///
    /// Runs can be chained: `run_until(a)` followed by `run_until(b)` is
    /// the same as `run_until(b)`. A horizon in the past processes nothing
    /// and leaves the clock untouched.
    ///
    /// # Errors
    ///
    /// [`SimError::Unwired`] if an emitting element has no output, see
    /// [`validate`](Simulation::validate).
    pub fn run_until(&mut self, horizon: Time) -> Result<(), SimError> {
        self.validate()?;

        while let Some((time, id)) = self.scheduler.pop_before(horizon) {
            self.now = time;
            self.dispatch(id)?;
        }

        if self.now < horizon {
            self.now = horizon;
        }
        Ok(())
    }

    fn dispatch(&mut self, id: ElementId) -> Result<(), SimError> {
        trace!(element = %id, time = %self.now, "wake up");

        let occupancy = match self.elements.get(id.index()) {
            None => return Err(SimError::ElementNotFound { element: id }),
            Some(Element::Monitor(monitor)) => self
                .port(monitor.port())
                .map(|port| port.occupancy(monitor.mode()))
                .unwrap_or_default(),
            Some(_) => 0.0,
        };

        let mut outbox = Vec::new();
        let Self {
            now,
            elements,
            scheduler,
            rng,
        } = self;
        let mut ctx = Context::new(*now, id, scheduler, rng, &mut outbox);

        match &mut elements[id.index()] {
            Element::Source(source) => source.wake(&mut ctx)?,
            Element::Port(port) => port.wake(&mut ctx)?,
            Element::Channel(channel) => channel.wake(&mut ctx)?,
            Element::Monitor(monitor) => monitor.wake(&mut ctx, occupancy),
            Element::Sink(_) => {}
        }

        for (to, packet) in outbox {
            self.deliver(to, packet)?;
        }
        Ok(())
    }

    fn deliver(&mut self, to: ElementId, packet: Packet) -> Result<(), SimError> {
        let mut outbox = Vec::new();
        let Self {
            now,
            elements,
            scheduler,
            rng,
        } = self;
        let mut ctx = Context::new(*now, to, scheduler, rng, &mut outbox);

        match elements.get_mut(to.index()) {
            Some(Element::Port(port)) => port.put(packet, &mut ctx),
            Some(Element::Channel(channel)) => channel.put(packet, &mut ctx),
            Some(Element::Sink(sink)) => sink.put(packet, *now),
            Some(Element::Source(_) | Element::Monitor(_)) => {
                return Err(SimError::NotAReceiver { element: to });
            }
            None => return Err(SimError::ElementNotFound { element: to }),
        }

        debug_assert!(outbox.is_empty(), "put never forwards synchronously");
        Ok(())
    }

    pub fn source(&self, id: SourceId) -> Option<&PacketSource> {
        match self.elements.get(id.element().index()) {
            Some(Element::Source(source)) => Some(source),
            _ => None,
        }
    }

    pub fn port(&self, id: PortId) -> Option<&SwitchPort> {
        match self.elements.get(id.element().index()) {
            Some(Element::Port(port)) => Some(port),
            _ => None,
        }
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        match self.elements.get(id.element().index()) {
            Some(Element::Channel(channel)) => Some(channel),
            _ => None,
        }
    }

    pub fn sink(&self, id: SinkId) -> Option<&PacketSink> {
        match self.elements.get(id.element().index()) {
            Some(Element::Sink(sink)) => Some(sink),
            _ => None,
        }
    }

    pub fn monitor(&self, id: MonitorId) -> Option<&PortMonitor> {
        match self.elements.get(id.element().index()) {
            Some(Element::Monitor(monitor)) => Some(monitor),
            _ => None,
        }
    }

    /// Snapshot the counters of every element, in registration order.
    pub fn stats(&self) -> SimStats {
        let mut stats = SimStats {
            now: self.now,
            sources: Vec::new(),
            ports: Vec::new(),
            channels: Vec::new(),
            sinks: Vec::new(),
        };

        for element in &self.elements {
            match element {
                Element::Source(source) => stats.sources.push(SourceStats {
                    id: source.id(),
                    label: source.label().to_owned(),
                    flow_id: source.flow_id(),
                    packets_sent: source.packets_sent(),
                }),
                Element::Port(port) => stats.ports.push(PortStats {
                    id: port.id(),
                    packets_received: port.packets_received(),
                    packets_dropped: port.packets_dropped(),
                    packets_sent: port.packets_sent(),
                    byte_size: port.byte_size(),
                    queue_len: port.queue_len(),
                    busy: port.is_busy(),
                }),
                Element::Channel(channel) => stats.channels.push(ChannelStats {
                    id: channel.id(),
                    channel_id: channel.channel_id(),
                    packets_received: channel.packets_received(),
                    packets_dropped: channel.packets_dropped(),
                    packets_forwarded: channel.packets_forwarded(),
                    in_flight: channel.in_flight(),
                }),
                Element::Sink(sink) => stats.sinks.push(SinkStats {
                    id: sink.id(),
                    flows: sink
                        .flows()
                        .map(|(key, flow)| FlowTotals {
                            key: key.clone(),
                            packets_received: flow.packets_received(),
                            bytes_received: flow.bytes_received(),
                        })
                        .collect(),
                }),
                Element::Monitor(_) => {}
            }
        }

        stats
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dist::{Constant, Exponential},
        sink::FlowKey,
    };

    fn constant(value: f64) -> Constant {
        Constant::new(value).unwrap()
    }

    fn packet(id: u64, size: f64) -> Packet {
        Packet::builder(Time::ZERO, id).size(size).build().unwrap()
    }

    fn secs(secs: f64) -> Time {
        Time::from_secs(secs)
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} != {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    // ------------------------------------------------------------------
    // Wiring
    // ------------------------------------------------------------------

    #[test]
    fn ids_in_registration_order() {
        let mut sim = Simulation::new();
        let sink = sim.new_sink().build();
        let port = sim.new_port(Rate::new(1_000.0)).build().unwrap();

        assert_eq!(sink.element(), ElementId::new(0));
        assert_eq!(port.element(), ElementId::new(1));
    }

    #[test]
    fn unwired_source_fails_fast() {
        let mut sim = Simulation::new();
        let source = sim.new_source(constant(1.0), constant(100.0)).build().unwrap();

        let err = sim.run_until(secs(10.0)).unwrap_err();
        assert_eq!(
            err,
            SimError::Unwired {
                element: source.element()
            }
        );
        assert_eq!(sim.now(), Time::ZERO);
    }

    #[test]
    fn connect_to_foreign_element() {
        let mut other = Simulation::new();
        other.new_sink().build();
        other.new_sink().build();
        let foreign = other.new_sink().build();

        let mut sim = Simulation::new();
        let source = sim.new_source(constant(1.0), constant(100.0)).build().unwrap();

        assert_eq!(
            sim.connect(source, foreign),
            Err(SimError::ElementNotFound {
                element: foreign.element()
            })
        );
    }

    #[test]
    fn monitor_needs_a_port() {
        let mut sim = Simulation::new();
        sim.new_sink().build();
        let mut other = Simulation::new();
        let port = other.new_port(Rate::new(1_000.0)).build().unwrap();

        let err = sim.new_monitor(port, constant(1.0)).build().unwrap_err();
        assert!(matches!(err, SimError::NotAPort { .. }));
    }

    #[test]
    fn invalid_configuration() {
        let mut sim = Simulation::new();

        assert!(matches!(
            sim.new_port(Rate::new(0.0)).build(),
            Err(ConfigError::InvalidRate(_))
        ));
        assert!(matches!(
            sim.new_port(Rate::new(1_000.0))
                .set_limit(QueueLimit::Bytes(-1.0))
                .build(),
            Err(ConfigError::InvalidByteLimit(_))
        ));
        assert!(matches!(
            sim.new_source(constant(1.0), constant(1.0))
                .set_initial_delay(f64::NAN)
                .build(),
            Err(ConfigError::InvalidInitialDelay(_))
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut sim = Simulation::new();

        assert_eq!(
            sim.new_source(constant(0.0), constant(100.0)).build(),
            Err(ConfigError::NonPositiveInterval(0.0))
        );
        assert!(sim.new_source(constant(-1.0), constant(100.0)).build().is_err());
        assert_eq!(sim.stats().sources.len(), 0);

        let port = sim.new_port(Rate::new(1_000.0)).build().unwrap();
        assert_eq!(
            sim.new_monitor(port, constant(0.0)).build(),
            Err(SimError::Config(ConfigError::NonPositiveInterval(0.0)))
        );
        assert!(sim.new_monitor(port, constant(0.5)).build().is_ok());

        let err = SimError::from(ConfigError::NonPositiveInterval(0.0));
        assert_eq!(
            err.to_string(),
            "a constant interval must be strictly positive, got 0"
        );
    }

    // ------------------------------------------------------------------
    // Sources and sinks
    // ------------------------------------------------------------------

    #[test]
    fn constant_source_into_sink() {
        let mut sim = Simulation::new();
        let source = sim.new_source(constant(1.5), constant(100.0)).build().unwrap();
        let sink = sim.new_sink().build();
        sim.connect(source, sink).unwrap();

        sim.run_until(secs(10.0)).unwrap();

        let flow = sim.sink(sink).unwrap().flow(&FlowKey::Flow(0)).unwrap();
        assert_eq!(flow.arrivals(), &[1.5, 3.0, 4.5, 6.0, 7.5, 9.0]);
        assert_eq!(flow.waits(), &[0.0; 6]);
        assert_eq!(sim.source(source).unwrap().packets_sent(), 6);
        assert_eq!(sim.now(), secs(10.0));
    }

    #[test]
    fn source_stops_after_finish() {
        let mut sim = Simulation::new();
        let source = sim
            .new_source(constant(2.0), constant(100.0))
            .set_finish(secs(5.0))
            .record_flow(true)
            .build()
            .unwrap();
        let sink = sim.new_sink().build();
        sim.connect(source, sink).unwrap();

        sim.run_until(secs(100.0)).unwrap();

        assert!(sim.is_idle());
        let source = sim.source(source).unwrap();
        assert!(source.is_stopped());
        assert_eq!(source.packets_sent(), 3);
        assert_eq!(source.time_rec(), &[secs(2.0), secs(4.0), secs(6.0)]);
        assert_eq!(source.size_rec(), &[100.0; 3]);
    }

    #[test]
    fn initial_delay_then_labelled_packets() {
        let mut sim = Simulation::new();
        let source = sim
            .new_source(constant(2.0), constant(100.0))
            .set_initial_delay(1.0)
            .set_label("left")
            .set_flow_id(7)
            .build()
            .unwrap();
        let sink = sim.new_sink().key_by(KeyBy::Source).build();
        sim.connect(source, sink).unwrap();

        sim.run_until(secs(6.0)).unwrap();

        let sink = sim.sink(sink).unwrap();
        assert!(sink.flow(&FlowKey::Flow(7)).is_none());
        let flow = sink.flow(&"left".into()).unwrap();
        assert_eq!(flow.arrivals(), &[3.0, 5.0]);
    }

    #[test]
    fn runs_can_be_chained() {
        let mut sim = Simulation::new();
        let source = sim.new_source(constant(1.0), constant(100.0)).build().unwrap();
        let sink = sim.new_sink().build();
        sim.connect(source, sink).unwrap();

        sim.run_until(secs(2.5)).unwrap();
        assert_eq!(sim.sink(sink).unwrap().packets_received(), 2);
        sim.run_until(secs(5.5)).unwrap();
        assert_eq!(sim.sink(sink).unwrap().packets_received(), 5);

        // the past is left alone
        sim.run_until(secs(1.0)).unwrap();
        assert_eq!(sim.now(), secs(5.5));
    }

    #[test]
    fn same_seed_same_run() {
        fn run(seed: u64) -> Vec<f64> {
            let mut sim = Simulation::new();
            sim.set_seed(seed);
            let source = sim
                .new_source(Exponential::new(2.0).unwrap(), constant(100.0))
                .build()
                .unwrap();
            let sink = sim.new_sink().build();
            sim.connect(source, sink).unwrap();
            sim.run_until(secs(50.0)).unwrap();
            sim.sink(sink)
                .unwrap()
                .flow(&FlowKey::Flow(0))
                .unwrap()
                .arrivals()
                .to_vec()
        }

        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
    }

    // ------------------------------------------------------------------
    // Switch ports
    // ------------------------------------------------------------------

    fn port_into_sink(sim: &mut Simulation, rate: f64, limit: QueueLimit) -> (PortId, SinkId) {
        let port = sim
            .new_port(Rate::new(rate))
            .set_limit(limit)
            .build()
            .unwrap();
        let sink = sim.new_sink().build();
        sim.connect(port, sink).unwrap();
        (port, sink)
    }

    #[test]
    fn byte_limit_burst() {
        let mut sim = Simulation::new();
        let (port, sink) = port_into_sink(&mut sim, 8_000.0, QueueLimit::Bytes(1_000.0));

        for id in 1..=5 {
            sim.put(port, packet(id, 500.0)).unwrap();
        }
        assert_eq!(sim.port(port).unwrap().packets_dropped(), 4);
        assert_eq!(sim.port(port).unwrap().byte_size(), 500.0);

        sim.run_until(secs(10.0)).unwrap();

        let p = sim.port(port).unwrap();
        assert_eq!(p.packets_received(), 5);
        assert_eq!(p.packets_sent(), p.packets_received() - p.packets_dropped());
        assert_eq!(p.byte_size(), 0.0);
        assert!(!p.is_busy());

        let flow = sim.sink(sink).unwrap().flow(&FlowKey::Flow(0)).unwrap();
        assert_eq!(flow.waits(), &[0.5]);
    }

    #[test]
    fn packet_limit_keeps_room_for_service() {
        let mut sim = Simulation::new();
        let (port, sink) = port_into_sink(&mut sim, 8_000.0, QueueLimit::Packets(3));

        for id in 1..=5 {
            sim.put(port, packet(id, 100.0)).unwrap();
        }
        sim.run_until(secs(10.0)).unwrap();

        assert_eq!(sim.port(port).unwrap().packets_dropped(), 3);
        assert_eq!(sim.sink(sink).unwrap().packets_received(), 2);
    }

    #[test]
    fn port_serves_in_order() {
        let mut sim = Simulation::new();
        let (port, sink) = port_into_sink(&mut sim, 8_000.0, QueueLimit::Unlimited);

        for (id, size) in [(1, 100.0), (2, 200.0), (3, 300.0)] {
            sim.put(port, packet(id, size)).unwrap();
        }
        sim.run_until(secs(10.0)).unwrap();

        let flow = sim.sink(sink).unwrap().flow(&FlowKey::Flow(0)).unwrap();
        assert_eq!(flow.packet_sizes(), &[100.0, 200.0, 300.0]);
        assert_close(flow.arrivals(), &[0.1, 0.3, 0.6]);
    }

    #[test]
    fn port_records_hop() {
        let mut sim = Simulation::new();
        let source = sim.new_source(constant(1.0), constant(100.0)).build().unwrap();
        let (port, sink) = port_into_sink(&mut sim, 8_000.0, QueueLimit::Unlimited);
        sim.connect(source, port).unwrap();

        sim.run_until(secs(1.5)).unwrap();

        let flow = sim.sink(sink).unwrap().flow(&FlowKey::Flow(0)).unwrap();
        assert_eq!(flow.perhop_times()[0].get(&port.element()), Some(&secs(1.0)));
        assert_close(flow.waits(), &[0.1]);
    }

    #[test]
    fn byte_limit_bounds_occupancy() {
        let mut sim = Simulation::new();
        sim.set_seed(3);
        let source = sim
            .new_source(Exponential::new(20.0).unwrap(), Exponential::with_mean(100.0).unwrap())
            .build()
            .unwrap();
        let (port, _) = port_into_sink(&mut sim, 8_000.0, QueueLimit::Bytes(1_000.0));
        sim.connect(source, port).unwrap();

        for step in 1..=200 {
            sim.run_until(secs(f64::from(step) * 0.05)).unwrap();
            let p = sim.port(port).unwrap();
            assert!(p.byte_size() < 1_000.0);
            assert!(
                (p.byte_size() - p.queued_bytes()).abs() < 1e-9,
                "byte counter {} drifted from buffer contents {}",
                p.byte_size(),
                p.queued_bytes()
            );
        }

        let p = sim.port(port).unwrap();
        assert!(p.packets_dropped() > 0);
        let in_port = p.queue_len() as u64 + u64::from(p.is_busy());
        assert_eq!(p.packets_received() - p.packets_dropped(), p.packets_sent() + in_port);
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    #[test]
    fn channel_delays_without_loss() {
        let mut sim = Simulation::new();
        let source = sim.new_source(constant(1.0), constant(100.0)).build().unwrap();
        let channel = sim.new_channel(constant(2.0)).build();
        let sink = sim.new_sink().build();
        sim.connect(source, channel).unwrap();
        sim.connect(channel, sink).unwrap();

        sim.run_until(secs(10.0)).unwrap();

        let flow = sim.sink(sink).unwrap().flow(&FlowKey::Flow(0)).unwrap();
        assert_eq!(flow.arrivals(), &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(flow.waits(), &[2.0; 7]);
        assert_eq!(sim.channel(channel).unwrap().in_flight(), 2);
    }

    #[test]
    fn congested_channel_degrades_to_queueing_delay() {
        let mut sim = Simulation::new();
        let mut first = true;
        let delay = move |_: &mut SimRng, _: Option<u64>| {
            if std::mem::take(&mut first) { 5.0 } else { 0.5 }
        };
        let channel = sim.new_channel(delay).build();
        let sink = sim.new_sink().build();
        sim.connect(channel, sink).unwrap();

        for id in 1..=3 {
            sim.put(channel, packet(id, 100.0)).unwrap();
        }
        sim.run_until(secs(10.0)).unwrap();

        let flow = sim.sink(sink).unwrap().flow(&FlowKey::Flow(0)).unwrap();
        assert_eq!(flow.arrivals(), &[5.0, 5.0, 5.0]);
    }

    #[test]
    fn loss_sees_packet_ids() {
        let mut sim = Simulation::new();
        let even = |_: &mut SimRng, id: Option<u64>| {
            if id.unwrap_or(1) % 2 == 0 { 1.0 } else { 0.0 }
        };
        let channel = sim.new_channel(constant(0.0)).set_loss(even).build();
        let sink = sim.new_sink().build();
        sim.connect(channel, sink).unwrap();

        for id in 1..=10 {
            sim.put(channel, packet(id, 100.0)).unwrap();
        }
        sim.run_until(secs(1.0)).unwrap();

        let c = sim.channel(channel).unwrap();
        assert_eq!(c.packets_dropped(), 5);
        assert_eq!(c.packets_forwarded(), 5);
        assert_eq!(sim.sink(sink).unwrap().packets_received(), 5);
    }

    #[test]
    fn constant_loss_converges() {
        let mut sim = Simulation::new();
        sim.set_seed(11);
        let channel = sim
            .new_channel(constant(0.0))
            .set_loss(constant(0.2))
            .set_channel_id(4)
            .build();
        let sink = sim.new_sink().build();
        sim.connect(channel, sink).unwrap();

        let count = 10_000;
        for id in 1..=count {
            sim.put(channel, packet(id, 100.0)).unwrap();
        }
        sim.run_until(secs(1.0)).unwrap();

        let stats = sim.stats();
        let c = &stats.channels[0];
        assert_eq!(c.channel_id, 4);
        assert_eq!(c.packets_received, count);
        assert_eq!(c.packets_dropped + c.packets_forwarded, count);
        let ratio = c.packets_dropped as f64 / count as f64;
        assert!((ratio - 0.2).abs() < 0.02, "loss ratio {ratio}");
    }

    #[test]
    fn certain_loss_drops_everything() {
        let mut sim = Simulation::new();
        let channel = sim
            .new_channel(constant(0.0))
            .set_loss(constant(1.0))
            .build();
        let sink = sim.new_sink().build();
        sim.connect(channel, sink).unwrap();

        for id in 1..=100 {
            sim.put(channel, packet(id, 100.0)).unwrap();
        }
        sim.run_until(secs(1.0)).unwrap();

        assert_eq!(sim.channel(channel).unwrap().packets_dropped(), 100);
        assert_eq!(sim.sink(sink).unwrap().packets_received(), 0);
    }

    // ------------------------------------------------------------------
    // Monitors
    // ------------------------------------------------------------------

    fn monitored_burst(mode: MonitorMode) -> Vec<f64> {
        let mut sim = Simulation::new();
        let (port, _) = port_into_sink(&mut sim, 8_000.0, QueueLimit::Unlimited);
        let monitor = sim
            .new_monitor(port, constant(0.5))
            .set_mode(mode)
            .build()
            .unwrap();

        for id in 1..=3 {
            sim.put(port, packet(id, 1_000.0)).unwrap();
        }
        sim.run_until(secs(2.9)).unwrap();

        let monitor = sim.monitor(monitor).unwrap();
        let times: Vec<_> = monitor.samples().iter().map(|s| s.time.as_secs()).collect();
        assert_eq!(times, vec![0.5, 1.0, 1.5, 2.0, 2.5]);
        monitor.occupancies().collect()
    }

    #[test]
    fn monitor_counts_packets() {
        assert_eq!(
            monitored_burst(MonitorMode::Packets),
            vec![3.0, 2.0, 2.0, 1.0, 1.0]
        );
    }

    #[test]
    fn monitor_counts_bytes() {
        assert_eq!(
            monitored_burst(MonitorMode::Bytes),
            vec![2_000.0, 1_000.0, 1_000.0, 0.0, 0.0]
        );
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    #[test]
    fn stats_snapshot() {
        let mut sim = Simulation::new();
        let source = sim
            .new_source(constant(1.0), constant(100.0))
            .set_label("a")
            .build()
            .unwrap();
        let (port, _) = port_into_sink(&mut sim, 8_000.0, QueueLimit::Unlimited);
        sim.connect(source, port).unwrap();
        sim.run_until(secs(3.5)).unwrap();

        let stats = sim.stats();
        assert_eq!(stats.now, secs(3.5));
        assert_eq!(stats.sources[0].label, "a");
        assert_eq!(stats.sources[0].packets_sent, 3);
        assert_eq!(stats.ports[0].packets_sent, 3);
        assert_eq!(stats.sinks[0].flows[0].packets_received, 3);
        assert_eq!(stats.sinks[0].flows[0].bytes_received, 300.0);
    }
}
