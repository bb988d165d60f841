//! Packet level discrete event simulation of queueing networks.
//!
//! A network is built from a handful of components wired output to input:
//!
//! - [`PacketSource`](source::PacketSource) emits packets at sampled
//!   intervals;
//! - [`SwitchPort`](port::SwitchPort) is a finite buffer served at a fixed
//!   rate, dropping packets when full;
//! - [`Channel`](channel::Channel) delays packets and may lose some;
//! - [`PacketSink`](sink::PacketSink) records what arrives;
//! - [`PortMonitor`](monitor::PortMonitor) samples a port's occupancy.
//!
//! Everything lives in a [`Simulation`], which owns the clock, the event
//! queue and the random number generator.
//!
//! ```
//! use flowsim_core::{Simulation, Time, dist::Constant, measure::Rate, port::QueueLimit};
//!
//! let mut sim = Simulation::new();
//! let source = sim
//!     .new_source(Constant::new(0.01).unwrap(), Constant::new(500.0).unwrap())
//!     .build()
//!     .unwrap();
//! let port = sim
//!     .new_port("200kbps".parse::<Rate>().unwrap())
//!     .set_limit(QueueLimit::Bytes(5_000.0))
//!     .build()
//!     .unwrap();
//! let sink = sim.new_sink().build();
//! sim.connect(source, port).unwrap();
//! sim.connect(port, sink).unwrap();
//!
//! sim.run_until("10s".parse::<Time>().unwrap()).unwrap();
//!
//! // 400 kbps offered to a 200 kbps port: about half the packets are lost
//! let port = sim.port(port).unwrap();
//! assert!(port.packets_dropped() > 0);
//! ```

pub mod channel;
pub mod defaults;
pub mod dist;
pub mod element;
pub mod measure;
pub mod monitor;
pub mod packet;
pub mod port;
mod scheduler;
pub mod simulation;
pub mod sink;
pub mod source;
pub mod stats;
pub mod time;

pub use self::{
    element::{ChannelId, ElementId, MonitorId, PortId, SinkId, SourceId},
    measure::Rate,
    packet::{Packet, PacketBuilder},
    simulation::{ConfigError, SimError, Simulation},
    time::Time,
};
