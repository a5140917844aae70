// Transport module - audio thread → consumer thread telemetry plumbing
//
// Two lock-free single-producer/single-consumer paths leave the audio thread:
// - ring: fixed-width telemetry records in a header + payload atomic ring,
//   the shared-memory layout consumed by the pitch engine
// - channel: bounded rtrb queues for typed readings (brightness, detector
//   output) that do not fit the fixed record layout
//
// Neither path blocks, locks or allocates on the producer side.

pub mod channel;
pub mod frame;
pub mod ring;

pub use channel::{reading_channel, ReadingReceiver, ReadingSender};
pub use frame::{TelemetryFrame, VALUES_PER_FRAME};
pub use ring::{RingState, TelemetryConsumer, TelemetryProducer, TelemetryRing};
