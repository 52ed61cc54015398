// SPDX-License-Identifier: MIT

pub mod cli;
pub mod condition;
pub mod config;
pub mod server;
