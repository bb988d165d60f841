use crate::{dist::SimRng, element::ElementId, packet::Packet, time::Time};
use core::cmp::Reverse;
use std::collections::BinaryHeap;

/// The event queue driving a [`Simulation`].
///
/// An event is a wake up call addressed to an element at a given time.
/// Events are popped by increasing time and, for events scheduled at the
/// same time, in the order they were scheduled.
///
/// [`Simulation`]: crate::simulation::Simulation
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    queue: BinaryHeap<Reverse<Scheduled>>,
    sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scheduled {
    time: Time,
    sequence: u64,
    target: ElementId,
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .cmp(&other.time)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub(crate) fn time_to_next_event(&self) -> Option<Time> {
        self.queue.peek().map(|Reverse(e)| e.time)
    }

    pub(crate) fn schedule(&mut self, time: Time, target: ElementId) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.queue.push(Reverse(Scheduled {
            time,
            sequence,
            target,
        }));
    }

    /// pop the next event if it is due strictly before `horizon`
    pub(crate) fn pop_before(&mut self, horizon: Time) -> Option<(Time, ElementId)> {
        match self.queue.peek() {
            Some(Reverse(next)) if next.time < horizon => {
                let Reverse(next) = self.queue.pop()?;
                Some((next.time, next.target))
            }
            _ => None,
        }
    }
}

/// What an element sees of the simulation while it handles an event or
/// a `put`: the clock, the shared random number generator, its own wake
/// up calls and the packets it forwards.
pub(crate) struct Context<'a> {
    now: Time,
    id: ElementId,
    scheduler: &'a mut Scheduler,
    rng: &'a mut SimRng,
    outbox: &'a mut Vec<(ElementId, Packet)>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        now: Time,
        id: ElementId,
        scheduler: &'a mut Scheduler,
        rng: &'a mut SimRng,
        outbox: &'a mut Vec<(ElementId, Packet)>,
    ) -> Self {
        Self {
            now,
            id,
            scheduler,
            rng,
            outbox,
        }
    }

    #[inline]
    pub(crate) fn now(&self) -> Time {
        self.now
    }

    #[inline]
    pub(crate) fn rng(&mut self) -> &mut SimRng {
        &mut *self.rng
    }

    /// wake the running element again once `delay` seconds have elapsed
    ///
    /// negative (or NaN) delays are treated as `0`: the clock never goes
    /// backward.
    pub(crate) fn wake_in(&mut self, delay: f64) {
        let at = self.now + delay.max(0.0);
        self.scheduler.schedule(at, self.id);
    }

    /// wake the running element again at the current instant, after every
    /// event already scheduled for this instant
    pub(crate) fn wake_now(&mut self) {
        self.scheduler.schedule(self.now, self.id);
    }

    /// hand `packet` to the `put` of the element `to`
    ///
    /// Delivery happens at the current instant, as soon as the running
    /// element returns.
    pub(crate) fn forward(&mut self, to: ElementId, packet: Packet) {
        self.outbox.push((to, packet));
    }
}

/// Drives a single element by hand, without a [`Simulation`].
///
/// [`Simulation`]: crate::simulation::Simulation
#[cfg(test)]
pub(crate) struct Harness {
    pub(crate) now: Time,
    pub(crate) scheduler: Scheduler,
    pub(crate) rng: SimRng,
    pub(crate) forwarded: Vec<(ElementId, Packet)>,
}

#[cfg(test)]
impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            now: Time::ZERO,
            scheduler: Scheduler::new(),
            rng: SimRng::seed_from_u64(0),
            forwarded: Vec::new(),
        }
    }

    /// run `f` as the element `id`, at the current time
    pub(crate) fn with<R>(&mut self, id: ElementId, f: impl FnOnce(&mut Context<'_>) -> R) -> R {
        let mut ctx = Context::new(
            self.now,
            id,
            &mut self.scheduler,
            &mut self.rng,
            &mut self.forwarded,
        );
        f(&mut ctx)
    }

    /// move the clock to the next event and return its target
    pub(crate) fn next(&mut self) -> Option<ElementId> {
        let (time, id) = self.scheduler.pop_before(Time::NEVER)?;
        self.now = time;
        Some(id)
    }
}
