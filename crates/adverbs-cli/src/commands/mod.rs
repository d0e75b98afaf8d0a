// SPDX-License-Identifier: Apache-2.0
//! CLI command implementations.

pub mod common;
pub mod list;
pub mod ports;
pub mod show;
pub mod version;

#[cfg(test)]
mod testing;
