//! Testbed Types - Core types for test-session telemetry
//!
//! These types are shared between the controller process, which owns the
//! session-wide state, and the worker processes that execute partitions of
//! the suite and report back over a message channel.
//!
//! ## Key Concepts
//!
//! - **NodeId**: Stable identifier of a collected test (`file_path::test_name`)
//! - **WorkerId**: Origin of a result, either a named worker or the controller
//! - **TestItem**: A discovered, not-yet-executed test with its requirement tags
//! - **ResultRecord**: The outcome of one test, as reported by a worker
//! - **WorkerMessage**: The envelope workers send to the controller

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod ids;
pub mod item;
pub mod message;
pub mod result;

pub use ids::{NodeId, WorkerId};
pub use item::TestItem;
pub use message::WorkerMessage;
pub use result::{Outcome, ParseOutcomeError, ResultRecord};
