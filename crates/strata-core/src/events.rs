//! Region change notifications
//!
//! Regions are owned and mutated by whoever holds them (a playlist, an
//! editor); everything else learns about changes by subscribing here.
//! Events are broadcast over a bounded crossbeam channel so subscribers can
//! live on other threads without sharing the region itself.
//!
//! The engine publishes two kinds of event: `PropertyChanged` for edits that
//! leave the audible content alone (a rename, a sync-point move) and
//! `ContentsChanged` for anything that alters what a read would produce
//! (gain, fades, trims, mute). Consumers that cache rendered audio key off
//! `ContentsChanged`.

/// Which region property an edit touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionProperty {
    Position,
    Start,
    Length,
    SyncPosition,
    Muted,
    Opaque,
    ScaleAmplitude,
    FadeIn,
    FadeOut,
    FadeInActive,
    FadeOutActive,
    Envelope,
    EnvelopeActive,
}

/// Events broadcast to all subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionEvent {
    /// A property changed on the named region.
    PropertyChanged {
        region: String,
        property: RegionProperty,
    },

    /// The audible content of the named region changed; cached renders of it
    /// are stale.
    ContentsChanged { region: String },
}

/// Event bus for broadcasting region events to multiple subscribers.
pub struct RegionEventBus {
    sender: crossbeam::channel::Sender<RegionEvent>,
    receiver: crossbeam::channel::Receiver<RegionEvent>,
}

impl RegionEventBus {
    /// Create a new event bus with bounded capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam::channel::bounded(capacity);
        Self { sender, receiver }
    }

    /// Get a sender for attaching to regions.
    pub fn sender(&self) -> crossbeam::channel::Sender<RegionEvent> {
        self.sender.clone()
    }

    /// Get a receiver for subscribing to events.
    pub fn subscribe(&self) -> crossbeam::channel::Receiver<RegionEvent> {
        self.receiver.clone()
    }
}

impl Default for RegionEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_fan_out() {
        let bus = RegionEventBus::new(16);
        let rx = bus.subscribe();

        bus.sender()
            .send(RegionEvent::ContentsChanged {
                region: "take-1".to_string(),
            })
            .unwrap();

        match rx.recv().unwrap() {
            RegionEvent::ContentsChanged { region } => assert_eq!(region, "take-1"),
            other => panic!("wrong event: {:?}", other),
        }
    }
}
