pub mod countdown_latch;
pub mod error;
pub mod message_queue;
pub mod traffic_light;

pub use countdown_latch::CountdownLatch;
pub use error::{Error, Result};
pub use message_queue::MessageQueue;
pub use traffic_light::{CycleConfig, Phase, PhaseReceiver, TrafficLight};
