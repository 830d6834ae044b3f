//! `file-over-udp`: reliable one-way file transfer over UDP using a
//! sliding window with cumulative ACKs.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐   DATA / terminal / FINACK   ┌──────────────────┐
//!  │   Transfer   │─────────────────────────────▶│ ReferenceReceiver│
//!  │   (sender)   │                              │  (or any peer)   │
//!  └──────┬───────┘                              └────────┬─────────┘
//!         │            ack <next> / fin                   │
//!         │◀──────────────────────────────────────────────┘
//!         │
//!  ┌──────▼─────────────────────────────────────┐
//!  │ window · ack · timer · teardown · metrics  │
//!  │        (pure state, no I/O)                │
//!  └──────┬─────────────────────────────────────┘
//!         │ raw UDP datagrams
//!  ┌──────▼────┐
//!  │  Socket   │  (thin async wrapper around tokio UdpSocket)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]: wire format and reply tokens
//! - [`config`]: transfer tunables and validation
//! - [`window`]: segmentation and the in-flight window
//! - [`ack`]: cumulative ACKs and duplicate-ACK fast retransmit
//! - [`timer`]: fixed retransmission timeout and absolute deadlines
//! - [`teardown`]: termination handshake state machine
//! - [`state`]: finite-state-machine types
//! - [`metrics`]: delay samples, throughput and score
//! - [`connection`]: the transfer engine driving all of the above
//! - [`receiver`]: reference receiver used for local runs and tests
//! - [`simulator`]: optional lossy/reorder network layer for testing
//! - [`socket`]: async UDP socket abstraction

pub mod ack;
pub mod config;
pub mod connection;
pub mod metrics;
pub mod packet;
pub mod receiver;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod teardown;
pub mod timer;
pub mod window;

pub use config::TransferConfig;
pub use connection::{run_trials, send_file, Transfer, TransferError};
pub use metrics::{TransferReport, TrialSummary};
pub use receiver::{ReceiverConfig, ReferenceReceiver};
