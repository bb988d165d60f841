use anyhow::{Context, Result};
use flowsim_core::{
    Simulation, Time,
    dist::{Constant, Exponential},
    port::{MonitorMode, QueueLimit},
    sink::FlowKey,
};
use indicatif::ProgressBar;

const HORIZON: u64 = 3_600;

/// An M/D/1 port close to saturation, run for an hour of simulated time.
///
/// The port is fed at 95% of its rate: the queue builds up and drains in
/// long cycles and the monitor shows how far the buffer fills.
fn main() -> Result<()> {
    let mut sim = Simulation::new();
    sim.set_seed(2024);

    let source = sim
        .new_source(Exponential::new(95.0)?, Constant::new(1_250.0)?)
        .build()?;
    let port = sim
        .new_port("1mbps".parse()?)
        .set_limit(QueueLimit::Bytes(50_000.0))
        .build()?;
    let sink = sim.new_sink().build();
    let monitor = sim
        .new_monitor(port, Constant::new(1.0)?)
        .set_mode(MonitorMode::Bytes)
        .build()?;

    sim.connect(source, port)?;
    sim.connect(port, sink)?;

    let pb = ProgressBar::new(HORIZON);
    for second in 1..=HORIZON {
        sim.run_until(Time::from_secs(second as f64))?;
        pb.inc(1);
    }
    pb.finish_with_message("Simulation complete");

    let stats = sim.stats();
    let port = &stats.ports[0];
    let flow = sim
        .sink(sink)
        .and_then(|sink| sink.flow(&FlowKey::Flow(0)))
        .context("No packet reached the sink")?;
    let peak = sim
        .monitor(monitor)
        .map(|monitor| monitor.occupancies().fold(0.0, f64::max))
        .unwrap_or_default();

    println!("received: {}", port.packets_received);
    println!("dropped:  {}", port.packets_dropped);
    println!("mean wait: {:.4}s", flow.mean_wait().unwrap_or_default());
    println!("throughput: {:.0}B/s", flow.throughput().unwrap_or_default());
    println!("peak buffer: {peak:.0}B");

    Ok(())
}
