// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Link state and the link bring-up / training sequence.

mod bringup;
mod training;

pub use self::training::TrainingPattern;

use crate::driver::dpcd::{
    DP_ADJUST_REQUEST_LANE0_1, DP_CHANNEL_EQ_BITS, DP_INTERLANE_ALIGN_DONE, DP_LANE0_1_STATUS,
    DP_LANE_ALIGN_STATUS_UPDATED, DP_LANE_CR_DONE,
};

pub const DPTX_MAX_LANES: usize = 4;
/// Bytes mirrored from `LANE0_1_STATUS` up to `ADJUST_REQUEST_LANE2_3`.
pub const LANE_STATUS_LEN: usize = 6;
const ALIGN_STATUS_IDX: usize = (DP_LANE_ALIGN_STATUS_UPDATED - DP_LANE0_1_STATUS) as usize;
const ADJUST_REQUEST_IDX: usize = (DP_ADJUST_REQUEST_LANE0_1 - DP_LANE0_1_STATUS) as usize;
pub const MAX_VSWING_LEVEL: u8 = 3;
pub const MAX_PREEMPH_LEVEL: u8 = 3;

/// Main link rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LinkRate {
    /// 1.62 Gbps per lane.
    #[default]
    Rbr,
    /// 2.7 Gbps per lane.
    Hbr,
    /// 5.4 Gbps per lane.
    Hbr2,
    /// 8.1 Gbps per lane.
    Hbr3,
}

impl LinkRate {
    pub fn from_dpcd(code: u8) -> Option<Self> {
        match code {
            0x06 => Some(LinkRate::Rbr),
            0x0a => Some(LinkRate::Hbr),
            0x14 => Some(LinkRate::Hbr2),
            0x1e => Some(LinkRate::Hbr3),
            _ => None,
        }
    }

    /// `LINK_BW_SET` value.
    pub fn dpcd_code(self) -> u8 {
        match self {
            LinkRate::Rbr => 0x06,
            LinkRate::Hbr => 0x0a,
            LinkRate::Hbr2 => 0x14,
            LinkRate::Hbr3 => 0x1e,
        }
    }

    /// `PHYIF_CTRL.PHYRATE` value.
    pub fn phy_rate(self) -> u32 {
        match self {
            LinkRate::Rbr => 0,
            LinkRate::Hbr => 1,
            LinkRate::Hbr2 => 2,
            LinkRate::Hbr3 => 3,
        }
    }

    /// Next rate down, `None` at RBR.
    pub fn lower(self) -> Option<Self> {
        match self {
            LinkRate::Rbr => None,
            LinkRate::Hbr => Some(LinkRate::Rbr),
            LinkRate::Hbr2 => Some(LinkRate::Hbr),
            LinkRate::Hbr3 => Some(LinkRate::Hbr2),
        }
    }

    /// PBN one MTP time slot carries on a single lane.
    pub fn pbn_per_slot_per_lane(self) -> u32 {
        match self {
            LinkRate::Rbr => 3,
            LinkRate::Hbr => 5,
            LinkRate::Hbr2 => 10,
            LinkRate::Hbr3 => 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainingState {
    #[default]
    Untrained,
    ClockRecovery,
    ChannelEqualization,
    Trained,
    Failed,
}

/// Receiver capabilities read at bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkCaps {
    pub dpcd_rev: u8,
    pub max_link_rate: LinkRate,
    pub max_lane_count: u8,
    pub enhanced_frame: bool,
    pub tps3: bool,
    pub tps4: bool,
    pub downspread: bool,
    pub mst: bool,
    /// Raw `TRAINING_AUX_RD_INTERVAL` value.
    pub aux_rd_interval: u8,
}

/// Per-controller link state.
#[derive(Debug, Clone, Default)]
pub struct LinkState {
    pub plugged: bool,
    pub lane_count: u8,
    pub link_rate: LinkRate,
    pub status: [u8; LANE_STATUS_LEN],
    pub vswing: [u8; DPTX_MAX_LANES],
    pub preemph: [u8; DPTX_MAX_LANES],
    pub state: TrainingState,
    pub caps: SinkCaps,
    pub ssc: bool,
}

impl LinkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to unknown/untrained, as after hot-unplug or suspend.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_trained(&self) -> bool {
        self.state == TrainingState::Trained
    }

    /// Set drive levels of `lane`, clamped to level 3 and to
    /// `vswing + preemph <= 3`.
    pub fn set_lane_drive(&mut self, lane: usize, vswing: u8, preemph: u8) {
        let vswing = vswing.min(MAX_VSWING_LEVEL);
        let preemph = preemph.min(MAX_PREEMPH_LEVEL).min(MAX_VSWING_LEVEL - vswing);
        self.vswing[lane] = vswing;
        self.preemph[lane] = preemph;
    }

    pub fn reset_lane_drive(&mut self) {
        self.vswing = [0; DPTX_MAX_LANES];
        self.preemph = [0; DPTX_MAX_LANES];
    }

    /// Status nibble of `lane` out of `LANE0_1_STATUS` / `LANE2_3_STATUS`.
    pub fn lane_status(&self, lane: usize) -> u8 {
        (self.status[lane / 2] >> ((lane & 1) * 4)) & 0xf
    }

    /// `(vswing, preemph)` the sink asks `lane` to use next.
    pub fn adjust_request(&self, lane: usize) -> (u8, u8) {
        let nibble = (self.status[ADJUST_REQUEST_IDX + lane / 2] >> ((lane & 1) * 4)) & 0xf;
        (nibble & 0x3, (nibble >> 2) & 0x3)
    }

    pub fn cr_done(&self) -> bool {
        (0..self.lane_count as usize).all(|lane| self.lane_status(lane) & DP_LANE_CR_DONE != 0)
    }

    pub fn eq_done(&self) -> bool {
        (0..self.lane_count as usize).all(|lane| self.lane_status(lane) & DP_CHANNEL_EQ_BITS == DP_CHANNEL_EQ_BITS)
            && self.status[ALIGN_STATUS_IDX] & DP_INTERLANE_ALIGN_DONE != 0
    }
}
