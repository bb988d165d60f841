use crate::{defaults, element::ElementId, time::Time};
use anyhow::{Result, bail};
use std::{collections::BTreeMap, fmt};

/// # A simulated packet
///
/// The origin fields (`time`, `size`, `packet_id`, `src`, `dst`,
/// `flow_id`, `payload`) are set once by the builder and only readable
/// afterwards. The annotation fields are written by the elements the
/// packet crosses:
///
/// * [`Packet::entered_at`] is stamped by every [`Channel`] on ingress
///   and used to compute how long the packet already waited inside it;
/// * [`Packet::perhop`] logs, per [`SwitchPort`], the time the packet was
///   admitted to that port's buffer.
///
/// [`Channel`]: crate::channel::Channel
/// [`SwitchPort`]: crate::port::SwitchPort
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    time: Time,
    size: f64,
    packet_id: u64,
    src: String,
    dst: String,
    flow_id: u64,
    payload: Option<Vec<u8>>,

    entered_at: Time,
    perhop: BTreeMap<ElementId, Time>,
}

pub struct PacketBuilder {
    time: Time,
    size: Option<f64>,
    packet_id: u64,
    src: String,
    dst: String,
    flow_id: u64,
    payload: Option<Vec<u8>>,
}

impl PacketBuilder {
    pub fn new(time: Time, packet_id: u64) -> Self {
        Self {
            time,
            size: None,
            packet_id,
            src: defaults::DEFAULT_SOURCE_LABEL.to_owned(),
            dst: defaults::DEFAULT_DESTINATION.to_owned(),
            flow_id: defaults::DEFAULT_FLOW_ID,
            payload: None,
        }
    }

    /// size of the packet in bytes
    pub fn size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.src = src.into();
        self
    }

    pub fn dst(mut self, dst: impl Into<String>) -> Self {
        self.dst = dst.into();
        self
    }

    pub fn flow_id(mut self, flow_id: u64) -> Self {
        self.flow_id = flow_id;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn build(self) -> Result<Packet> {
        let Some(size) = self.size else {
            bail!("Missing packet size (`size')")
        };
        if !(size.is_finite() && size >= 0.0) {
            bail!("Packet size must be a finite, non negative number of bytes, got {size}")
        }

        Ok(Packet {
            time: self.time,
            size,
            packet_id: self.packet_id,
            src: self.src,
            dst: self.dst,
            flow_id: self.flow_id,
            payload: self.payload,
            entered_at: self.time,
            perhop: BTreeMap::new(),
        })
    }
}

impl Packet {
    /// start building a packet created at `time` with the sequence id `packet_id`
    ///
    /// ```
    /// # use flowsim_core::{Packet, Time};
    /// let packet = Packet::builder(Time::from_secs(1.5), 1)
    ///     .size(100.0)
    ///     .src("flow_1")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(packet.to_string(), "id: 1, src: flow_1, time: 1.5, size: 100");
    /// ```
    pub fn builder(time: Time, packet_id: u64) -> PacketBuilder {
        PacketBuilder::new(time, packet_id)
    }

    /// simulation time at which the packet was sent
    #[inline]
    pub fn time(&self) -> Time {
        self.time
    }

    /// size in bytes
    #[inline]
    pub fn size(&self) -> f64 {
        self.size
    }

    /// sequence number, monotonic per source
    #[inline]
    pub fn packet_id(&self) -> u64 {
        self.packet_id
    }

    #[inline]
    pub fn src(&self) -> &str {
        &self.src
    }

    #[inline]
    pub fn dst(&self) -> &str {
        &self.dst
    }

    #[inline]
    pub fn flow_id(&self) -> u64 {
        self.flow_id
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// consume the packet and get the payload, if any
    pub fn into_payload(self) -> Option<Vec<u8>> {
        self.payload
    }

    /// the last time the packet entered a [`Channel`](crate::channel::Channel)
    #[inline]
    pub fn entered_at(&self) -> Time {
        self.entered_at
    }

    /// per hop admission time, keyed by the element that admitted the packet
    #[inline]
    pub fn perhop(&self) -> &BTreeMap<ElementId, Time> {
        &self.perhop
    }

    /// consume the packet, keeping its per hop log
    pub fn into_perhop(self) -> BTreeMap<ElementId, Time> {
        self.perhop
    }

    pub(crate) fn take_src(&mut self) -> String {
        std::mem::take(&mut self.src)
    }

    pub(crate) fn set_entered_at(&mut self, now: Time) {
        self.entered_at = now;
    }

    pub(crate) fn record_hop(&mut self, hop: ElementId, now: Time) {
        self.perhop.insert(hop, now);
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id: {}, src: {}, time: {}, size: {}",
            self.packet_id,
            self.src,
            self.time.as_secs(),
            self.size
        )
    }
}
