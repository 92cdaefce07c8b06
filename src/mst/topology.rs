// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use alloc::vec::Vec;

use crate::config::PHY_INPUT_STREAM_MAX;
use crate::device::Dptx;
use crate::driver::DptxTransport;
use crate::error::{ErrorKind, Result};
use crate::sideband::{
    build_link_address, build_remote_i2c_read, parse_link_address_reply, parse_remote_i2c_read_reply,
    LinkAddressReply, SidebandMsgHdr,
};
use crate::utils::Delay;

/// Branch devices queried below the main branch in one discovery pass.
pub const MAX_NUM_OF_SUB_BRANCH: usize = 2;
/// Port number of an empty stream slot, or RAD of a sink on the main branch.
pub const INVALID_MST_PORT_NUM: u8 = 0xff;

/// A branch device reached through `port_number` of the main branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubBranch {
    pub port_number: u8,
    pub reply: LinkAddressReply,
}

/// Result of the last topology discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub main_branch: Option<LinkAddressReply>,
    pub sub_branches: Vec<SubBranch>,
    /// Sink port number per stream index.
    pub stream_sink_port: [u8; PHY_INPUT_STREAM_MAX],
    /// Main branch port leading to the sink's branch, per stream index.
    pub rad_port: [u8; PHY_INPUT_STREAM_MAX],
    pub num_sinks: u8,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            main_branch: None,
            sub_branches: Vec::new(),
            stream_sink_port: [INVALID_MST_PORT_NUM; PHY_INPUT_STREAM_MAX],
            rad_port: [INVALID_MST_PORT_NUM; PHY_INPUT_STREAM_MAX],
            num_sinks: 0,
        }
    }
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_full(&self) -> bool {
        self.num_sinks as usize >= PHY_INPUT_STREAM_MAX
    }

    /// Give the next stream index to the sink at `port`.
    fn record_sink(&mut self, port: u8, rad_port: u8) {
        let stream = self.num_sinks as usize;
        self.stream_sink_port[stream] = port;
        self.rad_port[stream] = rad_port;
        self.num_sinks += 1;
        debug!("topology: stream {} -> port {} rad {:#x}", stream, port, rad_port);
    }
}

impl<A: DptxTransport, D: Delay> Dptx<A, D> {
    /// LINK_ADDRESS of the main branch, or of the branch behind `via_port`.
    pub fn link_address(&mut self, via_port: Option<u8>) -> Result<LinkAddressReply> {
        let hdr = SidebandMsgHdr::to_branch(via_port, false);
        let raw = self.sideband_request(&hdr, &build_link_address())?;
        Ok(parse_link_address_reply(&raw)?)
    }

    /// Rebuild the topology snapshot and return the number of stream sinks found.
    ///
    /// Main branch ports are scanned in reply order. A branching port is queried
    /// right away and its sinks take the next stream indices. Discovery stops at
    /// `PHY_INPUT_STREAM_MAX` sinks or when a third branch would be queried.
    pub fn get_topology_state(&mut self) -> Result<u8> {
        self.topology.reset();
        let main = self.link_address(None)?;
        let ports = main.ports.clone();
        self.topology.main_branch = Some(main);

        for port in ports.iter() {
            if port.is_stream_sink() {
                self.topology.record_sink(port.port_number, INVALID_MST_PORT_NUM);
            } else if port.is_branch() {
                if self.topology.sub_branches.len() == MAX_NUM_OF_SUB_BRANCH {
                    warn!("topology: more than {} branch devices, ignoring the rest", MAX_NUM_OF_SUB_BRANCH);
                    break;
                }
                let reply = self.link_address(Some(port.port_number))?;
                for sub_port in reply.ports.iter().filter(|p| p.is_stream_sink()) {
                    if self.topology.is_full() {
                        break;
                    }
                    self.topology.record_sink(sub_port.port_number, port.port_number);
                }
                self.topology.sub_branches.push(SubBranch {
                    port_number: port.port_number,
                    reply,
                });
            }
            if self.topology.is_full() {
                break;
            }
        }
        info!(
            "topology: {} sinks, {} sub-branches",
            self.topology.num_sinks,
            self.topology.sub_branches.len()
        );
        Ok(self.topology.num_sinks)
    }

    /// Read `len` bytes at `offset` from I2C device `i2c_addr` behind the sink of `stream`.
    pub fn remote_i2c_read(&mut self, stream: usize, i2c_addr: u8, offset: u8, len: u8) -> Result<Vec<u8>> {
        if stream >= PHY_INPUT_STREAM_MAX {
            return ErrorKind::InvalidParam.into();
        }
        let port = self.topology.stream_sink_port[stream];
        if port == INVALID_MST_PORT_NUM {
            warn!("topology: no sink on stream {}", stream);
            return ErrorKind::NotConnected.into();
        }
        let rad_port = self.topology.rad_port[stream];
        let hdr = SidebandMsgHdr::to_branch((rad_port != INVALID_MST_PORT_NUM).then_some(rad_port), false);
        let raw = self.sideband_request(&hdr, &build_remote_i2c_read(port, i2c_addr, offset, len))?;
        let reply = parse_remote_i2c_read_reply(&raw)?;
        Ok(reply.bytes)
    }
}
