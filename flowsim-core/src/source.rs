use crate::{
    dist::Distribution,
    element::ElementId,
    packet::Packet,
    scheduler::Context,
    simulation::SimError,
    time::Time,
};
use tracing::debug;

/// Generates packets at intervals drawn from an arrival distribution, with
/// sizes drawn from a size distribution, and sends them to its `out`.
///
/// Once started the source repeatedly waits for a sampled interval, then
/// emits a packet stamped with the current time, until the clock reaches
/// its `finish` time. The stop condition is checked before each wait: the
/// last packet may be emitted after `finish`.
///
/// Emission is fire and forget: the source never learns whether a
/// downstream element dropped the packet.
///
/// Sources are created with [`Simulation::new_source`].
///
/// [`Simulation::new_source`]: crate::simulation::Simulation::new_source
pub struct PacketSource {
    id: ElementId,
    label: String,
    arrival: Box<dyn Distribution>,
    size: Box<dyn Distribution>,
    initial_delay: f64,
    finish: Time,
    flow_id: u64,
    out: Option<ElementId>,

    state: SourceState,
    packets_sent: u64,

    record: bool,
    time_rec: Vec<Time>,
    size_rec: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    /// registered, waiting for the simulation to start the process
    Starting,
    /// waiting for the initial delay to elapse
    Delaying,
    /// waiting for the next arrival interval to elapse
    Waiting,
    /// the stop time was reached
    Stopped,
}

pub(crate) struct SourceConfig {
    pub(crate) label: String,
    pub(crate) arrival: Box<dyn Distribution>,
    pub(crate) size: Box<dyn Distribution>,
    pub(crate) initial_delay: f64,
    pub(crate) finish: Time,
    pub(crate) flow_id: u64,
    pub(crate) record: bool,
}

impl PacketSource {
    pub(crate) fn new(id: ElementId, config: SourceConfig) -> Self {
        let SourceConfig {
            label,
            arrival,
            size,
            initial_delay,
            finish,
            flow_id,
            record,
        } = config;

        Self {
            id,
            label,
            arrival,
            size,
            initial_delay,
            finish,
            flow_id,
            out: None,
            state: SourceState::Starting,
            packets_sent: 0,
            record,
            time_rec: Vec::new(),
            size_rec: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// the `src` of every packet this source emits
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn flow_id(&self) -> u64 {
        self.flow_id
    }

    #[inline]
    pub fn finish(&self) -> Time {
        self.finish
    }

    #[inline]
    pub fn out(&self) -> Option<ElementId> {
        self.out
    }

    /// number of packets emitted so far. This is also the sequence id of
    /// the last emitted packet.
    #[inline]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// `true` once the source passed its stop time and will not emit again
    pub fn is_stopped(&self) -> bool {
        self.state == SourceState::Stopped
    }

    /// emission times, when recording is enabled
    pub fn time_rec(&self) -> &[Time] {
        &self.time_rec
    }

    /// emitted sizes, when recording is enabled
    pub fn size_rec(&self) -> &[f64] {
        &self.size_rec
    }

    pub(crate) fn set_out(&mut self, out: ElementId) {
        self.out = Some(out);
    }

    pub(crate) fn wake(&mut self, ctx: &mut Context<'_>) -> Result<(), SimError> {
        match self.state {
            SourceState::Starting => {
                self.state = SourceState::Delaying;
                ctx.wake_in(self.initial_delay);
            }
            SourceState::Delaying => self.arm(ctx),
            SourceState::Waiting => {
                self.emit(ctx)?;
                self.arm(ctx);
            }
            SourceState::Stopped => {}
        }
        Ok(())
    }

    fn arm(&mut self, ctx: &mut Context<'_>) {
        if ctx.now() < self.finish {
            let interval = self.arrival.sample(ctx.rng(), None);
            self.state = SourceState::Waiting;
            ctx.wake_in(interval);
        } else {
            self.state = SourceState::Stopped;
        }
    }

    fn emit(&mut self, ctx: &mut Context<'_>) -> Result<(), SimError> {
        let Some(out) = self.out else {
            return Err(SimError::Unwired { element: self.id });
        };

        self.packets_sent += 1;
        let size = self.size.sample(ctx.rng(), None).max(0.0);
        let packet = Packet::builder(ctx.now(), self.packets_sent)
            .size(size)
            .src(self.label.as_str())
            .flow_id(self.flow_id)
            .build()
            .map_err(|error| SimError::InvalidPacket {
                element: self.id,
                reason: error.to_string(),
            })?;

        if self.record {
            self.time_rec.push(packet.time());
            self.size_rec.push(packet.size());
        }

        debug!(
            element = %self.id,
            packet = packet.packet_id(),
            flow = packet.flow_id(),
            time = %ctx.now(),
            "sent packet",
        );

        ctx.forward(out, packet);
        Ok(())
    }
}
