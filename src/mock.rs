// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Simulated DPTX controller and MST sink shared by the unit tests.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::{DptxConfig, PixelEncoding, VideoParams};
use crate::device::{Dptx, PlatformOps};
use crate::driver::dpcd::*;
use crate::driver::regs::{DPTX_CCTL, DPTX_HPDSTS};
use crate::driver::{AuxError, DptxTransport};
use crate::error::Result;
use crate::link::LinkRate;
use crate::sideband::*;
use crate::utils::Delay;

const DPCD_SIZE: usize = 0x3000;
const ACT_BIT: u32 = 1 << 28;

pub type TestDptx = Dptx<MockSink, NoDelay>;

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// Counts requested delay instead of waiting.
#[derive(Debug, Default)]
pub struct NoDelay {
    total_us: Cell<u64>,
}

impl NoDelay {
    pub fn total_us(&self) -> u64 {
        self.total_us.get()
    }
}

impl Delay for NoDelay {
    fn delay_us(&self, us: u32) {
        self.total_us.set(self.total_us.get() + us as u64);
    }
}

#[derive(Clone, Default)]
pub struct CountingPlatform {
    resets: Arc<AtomicU32>,
}

impl CountingPlatform {
    pub fn resets(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }
}

impl PlatformOps for CountingPlatform {
    fn reset(&mut self) -> Result<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn sink_port(port_number: u8) -> LinkAddressPort {
    LinkAddressPort {
        peer_device_type: PeerDeviceType::SstSink,
        port_number,
        ddps: true,
        dpcd_revision: 0x12,
        ..Default::default()
    }
}

pub fn branch_port(port_number: u8) -> LinkAddressPort {
    LinkAddressPort {
        peer_device_type: PeerDeviceType::MstBranching,
        port_number,
        mcs: true,
        ddps: true,
        dpcd_revision: 0x14,
        ..Default::default()
    }
}

pub fn input_port(port_number: u8) -> LinkAddressPort {
    LinkAddressPort {
        input_port: true,
        peer_device_type: PeerDeviceType::SourceOrSst,
        port_number,
        ddps: true,
        ..Default::default()
    }
}

/// DPCD space, local registers, training behaviour, the sideband mailbox and a
/// scripted MST topology of one sink.
pub struct MockSink {
    pub dpcd: Vec<u8>,
    pub regs: BTreeMap<u32, u32>,
    pub hpd: bool,
    /// Every DPCD access to this address fails.
    pub fail_dpcd: Option<u32>,

    /// Highest rate that trains, `None` if nothing does.
    pub train_max_rate: Option<LinkRate>,
    pub train_max_lanes: u8,
    /// Voltage swing clock recovery needs; requested through ADJUST_REQUEST.
    pub cr_min_vswing: u8,
    /// Lanes 1.. ask for one more swing level each poll, one lane at a time,
    /// and clock recovery locks once they all reach level 3. Lane 0 is left alone.
    pub cr_staggered: bool,
    pub pattern_writes: Vec<u8>,

    pub vcp_ack: bool,
    pub act_stuck: bool,
    pub act_handled_ack: bool,
    /// Values written to PAYLOAD_TABLE_UPDATE_STATUS.
    pub status_writes: Vec<u8>,
    /// Rising edges of the ACT trigger.
    pub act_triggers: u32,

    pub main_ports: Vec<LinkAddressPort>,
    /// Ports of the branch behind each main branch port.
    pub sub_ports: BTreeMap<u8, Vec<LinkAddressPort>>,
    pub i2c: Vec<u8>,
    pub down_requests: Vec<(SidebandMsgHdr, Vec<u8>)>,
    pub fragment_len: usize,
    pub mismatch_reply: bool,
    pub silent: bool,
    pub silent_sub_branches: bool,
    pub corrupt_reply: bool,
    pub nak_requests: Vec<u8>,
    /// Signal replies on the ESI0 vector instead of the legacy one.
    pub esi_ready: bool,
    /// Reply ready stays raised once the last fragment is acked.
    pub stuck_reply_ready: bool,
    pub reply_acks: u32,
    fragments: VecDeque<Vec<u8>>,
}

impl MockSink {
    /// HBR3 x4 sink with enhanced framing, TPS3/TPS4, down-spread and MST.
    pub fn new() -> Self {
        let mut dpcd = alloc::vec![0; DPCD_SIZE];
        dpcd[DP_DPCD_REV as usize] = 0x14;
        dpcd[DP_MAX_LINK_RATE as usize] = 0x1e;
        dpcd[DP_MAX_LANE_COUNT as usize] = 4 | DP_TPS3_SUPPORTED | DP_ENHANCED_FRAME_CAP;
        dpcd[DP_MAX_DOWNSPREAD as usize] = DP_MAX_DOWNSPREAD_0_5 | DP_TPS4_SUPPORTED;
        dpcd[DP_MSTM_CAP as usize] = DP_MST_CAP;
        Self {
            dpcd,
            regs: BTreeMap::new(),
            hpd: true,
            fail_dpcd: None,
            train_max_rate: Some(LinkRate::Hbr3),
            train_max_lanes: 4,
            cr_min_vswing: 0,
            cr_staggered: false,
            pattern_writes: Vec::new(),
            vcp_ack: true,
            act_stuck: false,
            act_handled_ack: true,
            status_writes: Vec::new(),
            act_triggers: 0,
            main_ports: Vec::new(),
            sub_ports: BTreeMap::new(),
            i2c: Vec::new(),
            down_requests: Vec::new(),
            fragment_len: 40,
            mismatch_reply: false,
            silent: false,
            silent_sub_branches: false,
            corrupt_reply: false,
            nak_requests: Vec::new(),
            esi_ready: false,
            stuck_reply_ready: false,
            reply_acks: 0,
            fragments: VecDeque::new(),
        }
    }

    pub fn with_mst_cap(mut self, mst: bool) -> Self {
        self.dpcd[DP_MSTM_CAP as usize] = if mst { DP_MST_CAP } else { 0 };
        self
    }

    pub fn reg(&self, offset: u32) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> (Vec<u8>, BTreeMap<u32, u32>) {
        (self.dpcd.clone(), self.regs.clone())
    }

    pub fn requests_of(&self, req_type: u8) -> Vec<(SidebandMsgHdr, Vec<u8>)> {
        self.down_requests
            .iter()
            .filter(|(_, body)| body.first() == Some(&req_type))
            .cloned()
            .collect()
    }

    fn lane_status(&self, address: u32) -> u8 {
        let rate = LinkRate::from_dpcd(self.dpcd[DP_LINK_BW_SET as usize]);
        let lanes = self.dpcd[DP_LANE_COUNT_SET as usize] & DP_MAX_LANE_COUNT_MASK;
        let pattern = self.dpcd[DP_TRAINING_PATTERN_SET as usize] & 0x0f;
        let link_ok = match (rate, self.train_max_rate) {
            (Some(rate), Some(max)) => rate <= max && lanes <= self.train_max_lanes,
            _ => false,
        };
        let lane_vswing = |lane: u8| self.dpcd[(DP_TRAINING_LANE0_SET + lane as u32) as usize] & DP_TRAIN_VOLTAGE_SWING_MASK;
        let vswing_ok = if self.cr_staggered {
            (1..lanes).all(|lane| lane_vswing(lane) == 3)
        } else {
            lane_vswing(0) >= self.cr_min_vswing
        };
        let nibble = match pattern {
            _ if !link_ok || !vswing_ok => 0,
            0 => 0,
            1 => DP_LANE_CR_DONE,
            _ => DP_CHANNEL_EQ_BITS,
        };
        match address {
            0x202 | 0x203 => {
                let first = (address - DP_LANE0_1_STATUS) as u8 * 2;
                let lo = if first < lanes { nibble } else { 0 };
                let hi = if first + 1 < lanes { nibble } else { 0 };
                lo | (hi << 4)
            }
            DP_LANE_ALIGN_STATUS_UPDATED => (nibble == DP_CHANNEL_EQ_BITS) as u8,
            0x206 | 0x207 if self.cr_staggered => {
                let raising = (1..lanes).find(|&lane| lane_vswing(lane) < 3);
                let request = |lane: u8| {
                    let level = lane_vswing(lane);
                    if Some(lane) == raising { level + 1 } else { level }
                };
                let first = (address - DP_ADJUST_REQUEST_LANE0_1) as u8 * 2;
                request(first) | (request(first + 1) << 4)
            }
            0x206 | 0x207 => self.cr_min_vswing | (self.cr_min_vswing << 4),
            _ => 0,
        }
    }

    fn on_down_request(&mut self, frame: &[u8]) {
        let Ok((hdr, hdr_len)) = decode_sideband_header(frame) else {
            return;
        };
        let end = (hdr_len + hdr.msg_len as usize).min(frame.len());
        let body = frame[hdr_len..end.saturating_sub(1).max(hdr_len)].to_vec();
        self.down_requests.push((hdr, body.clone()));

        let req_type = body.first().copied().unwrap_or(0);
        if self.silent || (self.silent_sub_branches && hdr.lct > 1 && req_type == DP_LINK_ADDRESS) {
            return;
        }
        let mut reply = self.reply_for(&hdr, &body);
        if self.mismatch_reply {
            reply[0] = (reply[0] & DP_SIDEBAND_REPLY_NAK) | ((reply[0] + 1) & DP_SIDEBAND_REQ_TYPE_MASK);
        }

        let chunks: Vec<&[u8]> = reply.chunks(self.fragment_len).collect();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let rep_hdr = SidebandMsgHdr {
                lct: 1,
                msg_len: chunk.len() as u8 + 1,
                somt: i == 0,
                eomt: i == last,
                ..Default::default()
            };
            let mut fragment = encode_sideband_header(&rep_hdr);
            fragment.extend_from_slice(chunk);
            let crc = encode_sideband_crc(chunk);
            fragment.push(if self.corrupt_reply { !crc } else { crc });
            self.fragments.push_back(fragment);
        }
        self.load_next_fragment();
    }

    fn load_next_fragment(&mut self) {
        if let Some(fragment) = self.fragments.pop_front() {
            let base = DP_SIDEBAND_MSG_DOWN_REP_BASE as usize;
            self.dpcd[base..base + fragment.len()].copy_from_slice(&fragment);
            let vector = if self.esi_ready {
                DP_DEVICE_SERVICE_IRQ_VECTOR_ESI0
            } else {
                DP_DEVICE_SERVICE_IRQ_VECTOR
            };
            self.dpcd[vector as usize] |= DP_DOWN_REP_MSG_RDY;
        }
    }

    fn reply_for(&self, hdr: &SidebandMsgHdr, body: &[u8]) -> Vec<u8> {
        let req_type = body.first().copied().unwrap_or(0);
        let arg = |i: usize| body.get(i).copied().unwrap_or(0);
        if self.nak_requests.contains(&req_type) {
            return nak(req_type);
        }
        match req_type {
            DP_LINK_ADDRESS => {
                let empty = Vec::new();
                let ports = if hdr.lct == 1 {
                    &self.main_ports
                } else {
                    self.sub_ports.get(&(hdr.rad[0] >> 4)).unwrap_or(&empty)
                };
                let mut reply = alloc::vec![DP_LINK_ADDRESS];
                reply.extend_from_slice(&[0xa0 + hdr.lct; DP_GUID_LEN]);
                reply.push(ports.len() as u8);
                for port in ports {
                    encode_port(port, &mut reply);
                }
                reply
            }
            DP_ENUM_PATH_RESOURCES => alloc::vec![req_type, arg(1) & 0xf0, 0x0a, 0x00, 0x0a, 0x00],
            DP_ALLOCATE_PAYLOAD => alloc::vec![req_type, arg(1) & 0xf0, arg(2), arg(3), arg(4)],
            DP_CLEAR_PAYLOAD_ID_TABLE => alloc::vec![req_type],
            DP_REMOTE_I2C_READ => {
                let offset = (arg(4) as usize).min(self.i2c.len());
                let end = (offset + arg(7) as usize).min(self.i2c.len());
                let mut reply = alloc::vec![req_type, arg(1) >> 4, (end - offset) as u8];
                reply.extend_from_slice(&self.i2c[offset..end]);
                reply
            }
            _ => nak(req_type),
        }
    }
}

fn nak(req_type: u8) -> Vec<u8> {
    let mut reply = alloc::vec![DP_SIDEBAND_REPLY_NAK | req_type];
    reply.extend_from_slice(&[0x11; DP_GUID_LEN]);
    reply.extend_from_slice(&[0x03, 0x00]);
    reply
}

fn encode_port(port: &LinkAddressPort, out: &mut Vec<u8>) {
    let peer: u8 = port.peer_device_type.into();
    out.push(((port.input_port as u8) << 7) | ((peer & 0x7) << 4) | (port.port_number & 0xf));
    out.push(((port.mcs as u8) << 7) | ((port.ddps as u8) << 6) | ((port.legacy_device_plug_status as u8) << 5));
    if !port.input_port {
        out.push(port.dpcd_revision);
        out.extend_from_slice(&port.peer_guid);
        out.push((port.num_sdp_streams << 4) | (port.num_sdp_stream_sinks & 0xf));
    }
}

impl DptxTransport for MockSink {
    fn read_dpcd(&mut self, address: u32) -> core::result::Result<u8, AuxError> {
        if self.fail_dpcd == Some(address) {
            return Err(AuxError::Timeout);
        }
        match address {
            0x202..=0x207 => Ok(self.lane_status(address)),
            _ => self.dpcd.get(address as usize).copied().ok_or(AuxError::Nack),
        }
    }

    fn write_dpcd(&mut self, address: u32, value: u8) -> core::result::Result<(), AuxError> {
        if self.fail_dpcd == Some(address) {
            return Err(AuxError::Timeout);
        }
        if address as usize >= DPCD_SIZE {
            return Err(AuxError::Nack);
        }
        match address {
            DP_TRAINING_PATTERN_SET => {
                self.pattern_writes.push(value);
                self.dpcd[address as usize] = value;
            }
            DP_PAYLOAD_ALLOCATE_TIME_SLOT_COUNT => {
                self.dpcd[address as usize] = value;
                if self.vcp_ack {
                    self.dpcd[DP_PAYLOAD_TABLE_UPDATE_STATUS as usize] |= DP_PAYLOAD_TABLE_UPDATED;
                }
            }
            DP_PAYLOAD_TABLE_UPDATE_STATUS => {
                self.status_writes.push(value);
                self.dpcd[address as usize] &= !value;
            }
            DP_DEVICE_SERVICE_IRQ_VECTOR | DP_DEVICE_SERVICE_IRQ_VECTOR_ESI0 => {
                let was_ready = self.dpcd[address as usize] & DP_DOWN_REP_MSG_RDY != 0;
                self.dpcd[address as usize] &= !value;
                if was_ready && value & DP_DOWN_REP_MSG_RDY != 0 {
                    self.reply_acks += 1;
                    if self.fragments.is_empty() && self.stuck_reply_ready {
                        self.dpcd[address as usize] |= DP_DOWN_REP_MSG_RDY;
                    }
                    self.load_next_fragment();
                }
            }
            _ => self.dpcd[address as usize] = value,
        }
        Ok(())
    }

    fn write_dpcd_bytes(&mut self, address: u32, bytes: &[u8]) -> core::result::Result<(), AuxError> {
        for (i, byte) in bytes.iter().enumerate() {
            self.write_dpcd(address + i as u32, *byte)?;
        }
        if address == DP_SIDEBAND_MSG_DOWN_REQ_BASE {
            self.on_down_request(bytes);
        }
        Ok(())
    }

    fn read_reg(&mut self, offset: u32) -> u32 {
        match offset {
            DPTX_HPDSTS => (self.hpd as u32) << 1,
            _ => self.reg(offset),
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        let mut value = value;
        if offset == DPTX_CCTL && value & ACT_BIT != 0 {
            if self.reg(DPTX_CCTL) & ACT_BIT == 0 {
                self.act_triggers += 1;
            }
            if !self.act_stuck {
                value &= !ACT_BIT;
                if self.act_handled_ack {
                    self.dpcd[DP_PAYLOAD_TABLE_UPDATE_STATUS as usize] |= DP_PAYLOAD_ACT_HANDLED;
                }
            }
        }
        self.regs.insert(offset, value);
    }
}

/// Controller over `sink` with the link preset to a trained HBR2 x4.
pub fn dptx_with_config(config: DptxConfig, sink: MockSink) -> TestDptx {
    let mut dptx = Dptx::new(sink, NoDelay::default(), config).unwrap();
    dptx.link.link_rate = LinkRate::Hbr2;
    dptx.link.lane_count = 4;
    dptx
}

pub fn sst_dptx(sink: MockSink) -> TestDptx {
    dptx_with_config(DptxConfig::default(), sink)
}

/// MST controller driving `streams` 1080p RGB streams.
pub fn mst_dptx(sink: MockSink, streams: usize) -> TestDptx {
    let videos = [VideoParams::new(148500, PixelEncoding::Rgb); 4];
    dptx_with_config(DptxConfig::mst(&videos[..streams]), sink)
}
