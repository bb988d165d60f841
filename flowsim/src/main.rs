//! Flowsim CLI
//!
//! Run one of the bundled queueing scenarios and print what the sinks saw.
//!
//! # Example
//!
//! ```bash
//! # the two flows example, 100 simulated seconds
//! flowsim two-flows
//!
//! # a burst of 5 packets of 500 bytes into a 1000 bytes buffer
//! flowsim switch --rate 8kbps --limit-bytes 1000 --packets 5 --size 500
//!
//! # 20% loss on a channel, reproducible
//! flowsim --seed 42 lossy --loss 0.2 --count 10000
//! ```

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use flowsim_core::{
    Packet, Rate, Simulation, Time,
    dist::{Constant, Distribution as _, Exponential, Gaussian, SimRng},
    port::QueueLimit,
    sink::{FlowStats, KeyBy, PacketSink},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Flowsim
///
/// Packet level queueing simulations. Single threaded, reproducible when
/// the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "flowsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Seed of the random number generator
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Simulated time to run for (`100`, `100s`, `1500ms`, `2m`, ...)
    #[arg(long, default_value = "100s")]
    horizon: Time,

    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand, Debug)]
enum Scenario {
    /// Two sources, through two channels, into one sink
    TwoFlows,

    /// A burst of packets put at once into a single switch port
    Switch {
        /// Service rate of the port (`8kbps`, `1.5mbps`, ...)
        #[arg(long, default_value = "8kbps")]
        rate: Rate,

        /// Drop-tail limit on the buffered bytes
        #[arg(long, conflicts_with = "limit_packets")]
        limit_bytes: Option<f64>,

        /// Drop-tail limit on the number of packets
        #[arg(long)]
        limit_packets: Option<usize>,

        /// Number of packets in the burst
        #[arg(long, default_value = "5")]
        packets: u64,

        /// Size of every packet, in bytes
        #[arg(long, default_value = "500")]
        size: f64,
    },

    /// Packets put at once into a channel with a constant loss probability
    Lossy {
        /// Probability for a packet to be lost
        #[arg(long, default_value = "0.1")]
        loss: f64,

        /// Number of packets to send through the channel
        #[arg(long, default_value = "1000")]
        count: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,flowsim=info")),
        )
        .init();

    let args = Args::parse();

    let mut sim = Simulation::new();
    sim.set_seed(args.seed);

    info!(seed = args.seed, horizon = %args.horizon, scenario = ?args.scenario, "Starting simulation");

    match args.scenario {
        Scenario::TwoFlows => two_flows(&mut sim, args.horizon),
        Scenario::Switch {
            rate,
            limit_bytes,
            limit_packets,
            packets,
            size,
        } => {
            let limit = match (limit_bytes, limit_packets) {
                (Some(bytes), _) => QueueLimit::Bytes(bytes),
                (None, Some(packets)) => QueueLimit::Packets(packets),
                (None, None) => QueueLimit::Unlimited,
            };
            switch(&mut sim, args.horizon, rate, limit, packets, size)
        }
        Scenario::Lossy { loss, count } => lossy(&mut sim, args.horizon, loss, count),
    }
}

fn two_flows(sim: &mut Simulation, horizon: Time) -> Result<()> {
    let size = {
        let mut size = Exponential::with_mean(100.0)?;
        move |rng: &mut SimRng, id: Option<u64>| size.sample(rng, id).floor()
    };

    let sink = sim.new_sink().key_by(KeyBy::Source).build();
    let flow_1 = sim
        .new_source(Constant::new(1.5)?, size.clone())
        .set_label("flow_1")
        .set_flow_id(0)
        .build()?;
    let flow_2 = sim
        .new_source(Constant::new(2.0)?, size)
        .set_label("flow_2")
        .set_flow_id(1)
        .build()?;
    let wire_1 = sim
        .new_channel(Gaussian::new(0.1, 0.02)?)
        .set_channel_id(1)
        .build();
    let wire_2 = sim
        .new_channel(Constant::new(0.1)?)
        .set_channel_id(2)
        .build();

    sim.connect(flow_1, wire_1)?;
    sim.connect(flow_2, wire_2)?;
    sim.connect(wire_1, sink)?;
    sim.connect(wire_2, sink)?;

    sim.run_until(horizon)?;

    let sink = sim.sink(sink).context("sink is registered")?;
    for label in ["flow_1", "flow_2"] {
        let flow = sink
            .flow(&label.into())
            .with_context(|| format!("No packet of {label} arrived"))?;
        print_flow(label, flow);
    }
    Ok(())
}

fn switch(
    sim: &mut Simulation,
    horizon: Time,
    rate: Rate,
    limit: QueueLimit,
    packets: u64,
    size: f64,
) -> Result<()> {
    let port = sim.new_port(rate).set_limit(limit).build()?;
    let sink = sim.new_sink().build();
    sim.connect(port, sink)?;

    for id in 1..=packets {
        let packet = Packet::builder(sim.now(), id).size(size).build()?;
        sim.put(port, packet)?;
    }
    sim.run_until(horizon)?;

    let stats = sim.stats();
    let Some(port) = stats.ports.first() else {
        bail!("The port is missing from the statistics")
    };
    println!(
        "port: received {}, dropped {}, sent {}, waiting {} ({} bytes)",
        port.packets_received,
        port.packets_dropped,
        port.packets_sent,
        port.queue_len,
        port.byte_size,
    );
    print_sink(sim.sink(sink).context("sink is registered")?);
    Ok(())
}

fn lossy(sim: &mut Simulation, horizon: Time, loss: f64, count: u64) -> Result<()> {
    let channel = sim
        .new_channel(Constant::new(0.0)?)
        .set_loss(Constant::new(loss)?)
        .build();
    let sink = sim.new_sink().record_arrivals(false).build();
    sim.connect(channel, sink)?;

    for id in 1..=count {
        let packet = Packet::builder(sim.now(), id).size(100.0).build()?;
        sim.put(channel, packet)?;
    }
    sim.run_until(horizon)?;

    let channel = sim.channel(channel).context("channel is registered")?;
    let dropped = channel.packets_dropped();
    println!(
        "channel: received {}, dropped {}, forwarded {}",
        channel.packets_received(),
        dropped,
        channel.packets_forwarded(),
    );
    if count > 0 {
        println!("drop fraction: {:.4}", dropped as f64 / count as f64);
    }
    Ok(())
}

fn print_sink(sink: &PacketSink) {
    for (key, flow) in sink.flows() {
        print_flow(&key.to_string(), flow);
    }
}

fn print_flow(name: &str, flow: &FlowStats) {
    let join = |values: &[f64]| {
        values
            .iter()
            .map(|v| format!("{v:.2}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("{name}: {} packets, {} bytes", flow.packets_received(), flow.bytes_received());
    println!("{name} packet delays: {}", join(flow.waits()));
    println!("{name} packet arrival times: {}", join(flow.arrivals()));
}
