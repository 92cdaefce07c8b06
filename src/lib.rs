// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! DisplayPort 1.4 transmitter (DPTX) link and multi-stream transport engine.
//! The introduces of all modules are showed below:
//! * [config]: Link and per-stream video configuration of one DPTX controller.
//! * [driver]: The AUX/DPCD transport seam, the DPCD address map and the local link-controller registers.
//! * [link]: Link state, sink capability read, stream-mode bring-up and clock-recovery/equalization training.
//! * [sideband]: Sideband message codec, request builders, reply parsers and the down-request/down-reply exchange.
//! * [mst]: Virtual channel slot table, payload bandwidth allocation, ACT trigger and topology discovery.
//! * [device]: The `Dptx` instance, platform hooks and the hot-plug/resume/suspend orchestration.
//! * [utils]: Delay abstraction and the console logger.
//! * [error]: Defines the error type for the engine.

#![cfg_attr(not(test), no_std)]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::module_inception)]
#![allow(clippy::needless_range_loop)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod link;
pub mod mst;
pub mod sideband;
pub mod utils;

#[cfg(test)]
mod mock;

/// Build-time information generated by `build.rs`.
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use config::{DptxConfig, PixelEncoding, VideoParams, PHY_INPUT_STREAM_MAX};
pub use device::{Dptx, DptxController, HotplugNotifier, HotplugState, PlatformOps, TopologyNotifier};
pub use driver::{AuxError, DptxTransport};
pub use error::{Error, ErrorKind, Result};
pub use link::{LinkRate, LinkState, TrainingState};
pub use utils::{Delay, SpinDelay};
