// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod error;
pub mod event;
pub mod executor;
pub mod processor;
pub mod query;
pub mod stream;
