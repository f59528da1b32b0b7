// Copyright 2026 keel contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A generic, thread-safe event channel.

/// A multi-producer event channel generic over the message type `T`.
///
/// Keeps `keel-core` decoupled from the concrete report and event
/// types defined in higher-level crates; the module manager uses one
/// as its hook-report sink.
#[derive(Debug)]
pub struct EventBus<T: Send + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Send + 'static> EventBus<T> {
    /// Creates a new bus backed by an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    /// Sends an event, logging an error if every receiver is gone.
    ///
    /// Publishing never blocks and never fails the caller: a sink with
    /// no consumer loses the message, not the producer's frame.
    pub fn publish(&self, event: T) {
        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to publish event: {e}. Receiver likely disconnected.");
        }
    }

    /// Returns a clone of the sender end, for handing to producers.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns a reference to the receiver end. Intended for the bus
    /// owner to process events.
    pub fn receiver(&self) -> &flume::Receiver<T> {
        &self.receiver
    }

    /// Drains every event currently queued, without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T: Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::TryRecvError;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Report {
        module: String,
        success: bool,
    }

    fn report(module: &str, success: bool) -> Report {
        Report {
            module: module.to_string(),
            success,
        }
    }

    #[test]
    fn starts_empty() {
        let bus = EventBus::<Report>::new();
        assert!(bus.receiver().is_empty());
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn publish_then_drain_preserves_order() {
        let bus = EventBus::new();
        bus.publish(report("a", true));
        bus.publish(report("b", false));
        bus.publish(report("c", true));

        let drained = bus.drain();
        assert_eq!(
            drained,
            vec![report("a", true), report("b", false), report("c", true)]
        );
        assert_eq!(bus.receiver().try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn cloned_senders_feed_the_same_receiver() {
        let bus = EventBus::new();
        let sender = bus.sender();

        let handle = thread::spawn(move || {
            sender.send(report("from-thread", true)).expect("send failed");
        });
        handle.join().expect("thread join failed");

        match bus.receiver().recv_timeout(Duration::from_secs(1)) {
            Ok(received) => assert_eq!(received, report("from-thread", true)),
            Err(e) => panic!("Failed to receive event: {e:?}"),
        }
    }

    #[test]
    fn publish_after_receiver_drop_is_swallowed() {
        let bus = EventBus::new();
        let sender = bus.sender();
        drop(bus);

        // publish() logs instead of failing; the raw sender reports the error.
        assert!(sender.send(report("late", false)).is_err());
    }
}
