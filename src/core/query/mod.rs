// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod job;
pub mod join;

pub use self::job::Job;
pub use self::join::{CompiledEdge, JoinExecutor};
