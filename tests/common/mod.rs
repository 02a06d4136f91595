//! Shared test harness: an in-memory mock transport so endpoint and host
//! scenarios run without spawning a real process or socket.

mod mock_transport;

pub use mock_transport::{mock_pair, MockPeer, MockTransport};
