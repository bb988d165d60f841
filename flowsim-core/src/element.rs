use std::fmt;

/// Identifier of any component registered with a [`Simulation`].
///
/// Identifiers are assigned sequentially, in registration order, starting
/// at `0`. They also serve as the hop key of [`Packet::perhop`].
///
/// [`Simulation`]: crate::simulation::Simulation
/// [`Packet::perhop`]: crate::packet::Packet::perhop
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(usize);

impl ElementId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A component with an `out` reference: it forwards packets downstream.
pub trait Emitter: Copy {
    fn element(self) -> ElementId;
}

/// A component with a `put` ingress: it accepts packets from upstream.
pub trait Receiver: Copy {
    fn element(self) -> ElementId;
}

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident $(: $role:ident)*) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(ElementId);

        impl $name {
            pub(crate) const fn new(id: ElementId) -> Self {
                Self(id)
            }

            #[inline]
            pub fn element(self) -> ElementId {
                self.0
            }
        }

        impl From<$name> for ElementId {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        $(
            impl $role for $name {
                #[inline]
                fn element(self) -> ElementId {
                    self.0
                }
            }
        )*
    };
}

typed_id!(
    /// Handle to a [`PacketSource`](crate::source::PacketSource).
    SourceId: Emitter
);
typed_id!(
    /// Handle to a [`SwitchPort`](crate::port::SwitchPort).
    PortId: Emitter: Receiver
);
typed_id!(
    /// Handle to a [`Channel`](crate::channel::Channel).
    ChannelId: Emitter: Receiver
);
typed_id!(
    /// Handle to a [`PacketSink`](crate::sink::PacketSink).
    SinkId: Receiver
);
typed_id!(
    /// Handle to a [`PortMonitor`](crate::monitor::PortMonitor).
    MonitorId
);
