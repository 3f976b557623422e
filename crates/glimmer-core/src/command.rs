//! The one-way pixel command queue
//!
//! Structure adapters mirror every pixel write and end-of-frame marker into
//! this queue so on-screen simulators can render the logical state of an
//! installation. The queue is strictly advisory: it is not authoritative
//! device state and nothing ever flows back.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::Color;

/// Structure-specific coordinates carried by a pixel command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelAddress {
    /// Linear physical index on the owning structure.
    Linear(usize),
    /// Serpentine grid coordinate.
    Grid { x: usize, y: usize },
    /// Stage truss coordinate.
    Truss {
        side: usize,
        led: usize,
        layer: usize,
    },
    /// Polyhedron strip coordinate.
    Strip { strip: usize, led: usize },
    /// Dome strut coordinate.
    Strut { strut: usize, led: usize },
}

/// Value object pushed to the simulator queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelCommand {
    pub address: PixelAddress,
    pub color: Color,
    /// Marks the end of a painted frame rather than a pixel write.
    pub end_of_frame: bool,
}

impl PixelCommand {
    /// A pixel write.
    pub fn set(address: PixelAddress, color: Color) -> Self {
        Self {
            address,
            color,
            end_of_frame: false,
        }
    }

    /// An end-of-frame marker.
    pub fn end_of_frame() -> Self {
        Self {
            address: PixelAddress::Linear(0),
            color: Color::BLACK,
            end_of_frame: true,
        }
    }
}

/// Producer half of the simulator queue. Cloneable; sends never block and
/// a vanished consumer is silently ignored.
#[derive(Clone)]
pub struct CommandSink {
    tx: Sender<PixelCommand>,
}

impl CommandSink {
    /// Create a sink together with the consumer end simulators read.
    pub fn channel() -> (CommandSink, Receiver<PixelCommand>) {
        let (tx, rx) = unbounded();
        (CommandSink { tx }, rx)
    }

    /// A sink nobody listens to, for structures without a simulator.
    pub fn disconnected() -> CommandSink {
        Self::channel().0
    }

    /// Push a command; a disconnected consumer is ignored.
    pub fn send(&self, command: PixelCommand) {
        let _ = self.tx.send(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_arrive_in_order() {
        let (sink, rx) = CommandSink::channel();
        sink.send(PixelCommand::set(
            PixelAddress::Grid { x: 1, y: 2 },
            Color::from_rgb(9, 8, 7),
        ));
        sink.send(PixelCommand::end_of_frame());

        let first = rx.recv().unwrap();
        assert_eq!(first.address, PixelAddress::Grid { x: 1, y: 2 });
        assert!(!first.end_of_frame);

        let second = rx.recv().unwrap();
        assert!(second.end_of_frame);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_consumer_ignored() {
        let sink = CommandSink::disconnected();
        // Must not panic or block.
        sink.send(PixelCommand::end_of_frame());
    }
}
