/// Default seed of the [`Simulation`]'s random number generator.
///
/// ```
/// # use flowsim_core::defaults::*;
/// assert_eq!(DEFAULT_SEED, 0);
/// ```
///
/// [`Simulation`]: crate::simulation::Simulation
pub const DEFAULT_SEED: u64 = 0;

/// Default `src` label of the packets emitted by a [`PacketSource`]
/// and of packets built with [`Packet::builder`].
///
/// [`PacketSource`]: crate::source::PacketSource
/// [`Packet::builder`]: crate::packet::Packet::builder
pub const DEFAULT_SOURCE_LABEL: &str = "source";

/// Default `dst` of a packet. The destination is carried but never used
/// for forwarding: packets follow the `out` wiring.
pub const DEFAULT_DESTINATION: &str = "destination";

/// Default flow identifier of a [`PacketSource`].
///
/// [`PacketSource`]: crate::source::PacketSource
pub const DEFAULT_FLOW_ID: u64 = 0;

/// Default start offset of a [`PacketSource`], in seconds.
///
/// [`PacketSource`]: crate::source::PacketSource
pub const DEFAULT_INITIAL_DELAY: f64 = 0.0;
