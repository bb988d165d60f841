use crate::{
    dist::Distribution, element::ElementId, packet::Packet, scheduler::Context,
    simulation::SimError,
};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// A transmission medium with a sampled propagation delay and an optional
/// sampled loss probability.
///
/// Packets are handled one at a time, in arrival order. For each packet
/// the channel first draws a uniform number `u` in `[0, 1)` and a loss
/// probability `p` from the loss distribution (which receives the
/// packet's sequence id). The packet is dropped when `u < p`.
///
/// A forwarded packet is held for a freshly sampled delay counted from the
/// moment it entered the channel. If the packet already waited that long
/// behind the packets ahead of it, it leaves immediately. An uncongested
/// channel therefore delays every packet by the sampled delay while a
/// congested one degrades to pure queueing delay. The channel never
/// reorders packets.
///
/// Channels are created with [`Simulation::new_channel`].
///
/// [`Simulation::new_channel`]: crate::simulation::Simulation::new_channel
pub struct Channel {
    id: ElementId,
    channel_id: u64,
    delay: Box<dyn Distribution>,
    loss: Option<Box<dyn Distribution>>,
    out: Option<ElementId>,

    queue: VecDeque<Packet>,
    state: ChannelState,

    packets_received: u64,
    packets_dropped: u64,
    packets_forwarded: u64,
}

enum ChannelState {
    /// nothing to forward
    Idle,
    /// a packet arrived while idle, processing starts at this instant
    Starting,
    /// holding a packet for the rest of its delay
    Delaying(Packet),
}

impl Channel {
    pub(crate) fn new(
        id: ElementId,
        channel_id: u64,
        delay: Box<dyn Distribution>,
        loss: Option<Box<dyn Distribution>>,
    ) -> Self {
        Self {
            id,
            channel_id,
            delay,
            loss,
            out: None,
            queue: VecDeque::new(),
            state: ChannelState::Idle,
            packets_received: 0,
            packets_dropped: 0,
            packets_forwarded: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// user supplied label, used in logs
    #[inline]
    pub fn channel_id(&self) -> u64 {
        self.channel_id
    }

    #[inline]
    pub fn out(&self) -> Option<ElementId> {
        self.out
    }

    #[inline]
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// packets lost to the loss distribution
    #[inline]
    pub fn packets_dropped(&self) -> u64 {
        self.packets_dropped
    }

    #[inline]
    pub fn packets_forwarded(&self) -> u64 {
        self.packets_forwarded
    }

    /// packets inside the channel: waiting, plus the one being delayed
    pub fn in_flight(&self) -> usize {
        let delaying = matches!(self.state, ChannelState::Delaying(_));
        self.queue.len() + usize::from(delaying)
    }

    pub(crate) fn set_out(&mut self, out: ElementId) {
        self.out = Some(out);
    }

    pub(crate) fn put(&mut self, mut packet: Packet, ctx: &mut Context<'_>) {
        self.packets_received += 1;
        trace!(
            element = %self.id,
            channel = self.channel_id,
            packet = packet.packet_id(),
            time = %ctx.now(),
            "entered channel",
        );

        packet.set_entered_at(ctx.now());
        self.queue.push_back(packet);

        if matches!(self.state, ChannelState::Idle) {
            self.state = ChannelState::Starting;
            ctx.wake_now();
        }
    }

    pub(crate) fn wake(&mut self, ctx: &mut Context<'_>) -> Result<(), SimError> {
        let out = self.out.ok_or(SimError::Unwired { element: self.id })?;

        match std::mem::replace(&mut self.state, ChannelState::Idle) {
            ChannelState::Idle => return Ok(()),
            ChannelState::Starting => {}
            ChannelState::Delaying(packet) => self.deliver(out, packet, ctx),
        }

        while let Some(packet) = self.queue.pop_front() {
            if self.is_lost(&packet, ctx) {
                self.packets_dropped += 1;
                debug!(
                    element = %self.id,
                    channel = self.channel_id,
                    packet = packet.packet_id(),
                    time = %ctx.now(),
                    reason = "loss",
                    "dropping packet",
                );
                continue;
            }

            let queued_time = ctx.now() - packet.entered_at();
            let delay = self.delay.sample(ctx.rng(), None);
            if queued_time < delay {
                self.state = ChannelState::Delaying(packet);
                ctx.wake_in(delay - queued_time);
                return Ok(());
            }
            self.deliver(out, packet, ctx);
        }

        Ok(())
    }

    fn is_lost(&mut self, packet: &Packet, ctx: &mut Context<'_>) -> bool {
        let Some(loss) = self.loss.as_mut() else {
            return false;
        };
        let draw = ctx.rng().uniform();
        let probability = loss.sample(ctx.rng(), Some(packet.packet_id()));
        draw < probability
    }

    fn deliver(&mut self, out: ElementId, packet: Packet, ctx: &mut Context<'_>) {
        trace!(
            element = %self.id,
            channel = self.channel_id,
            packet = packet.packet_id(),
            time = %ctx.now(),
            "left channel",
        );
        self.packets_forwarded += 1;
        ctx.forward(out, packet);
    }
}
