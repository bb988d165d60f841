use crate::{
    dist::Distribution,
    element::{ElementId, PortId},
    port::MonitorMode,
    scheduler::Context,
    time::Time,
};

/// One occupancy sample taken by a [`PortMonitor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub time: Time,
    pub occupancy: f64,
}

/// Periodically samples the occupancy of a [`SwitchPort`].
///
/// The monitor waits for an interval drawn from its distribution, reads
/// the port, and starts over, for as long as the simulation runs. It never
/// modifies the port.
///
/// Monitors are created with [`Simulation::new_monitor`].
///
/// [`SwitchPort`]: crate::port::SwitchPort
/// [`Simulation::new_monitor`]: crate::simulation::Simulation::new_monitor
pub struct PortMonitor {
    id: ElementId,
    port: PortId,
    interval: Box<dyn Distribution>,
    mode: MonitorMode,
    started: bool,
    samples: Vec<Snapshot>,
}

impl PortMonitor {
    pub(crate) fn new(
        id: ElementId,
        port: PortId,
        interval: Box<dyn Distribution>,
        mode: MonitorMode,
    ) -> Self {
        Self {
            id,
            port,
            interval,
            mode,
            started: false,
            samples: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// the observed port
    #[inline]
    pub fn port(&self) -> PortId {
        self.port
    }

    #[inline]
    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    pub fn samples(&self) -> &[Snapshot] {
        &self.samples
    }

    pub fn occupancies(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.occupancy)
    }

    /// `occupancy` is the port's occupancy at the current instant
    pub(crate) fn wake(&mut self, ctx: &mut Context<'_>, occupancy: f64) {
        if self.started {
            self.samples.push(Snapshot {
                time: ctx.now(),
                occupancy,
            });
        } else {
            self.started = true;
        }

        let interval = self.interval.sample(ctx.rng(), None);
        ctx.wake_in(interval);
    }
}
