// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use tock_registers::LocalRegisterCopy;

use crate::device::Dptx;
use crate::driver::dpcd::*;
use crate::driver::regs::*;
use crate::driver::DptxTransport;
use crate::error::{ErrorKind, Result};
use crate::link::{LinkRate, TrainingState, DPTX_MAX_LANES, LANE_STATUS_LEN, MAX_PREEMPH_LEVEL, MAX_VSWING_LEVEL};
use crate::utils::Delay;

/// Clock recovery gives up after this many status polls.
const MAX_CR_LOOP: u32 = 10;
/// ...or once the sink asked for the same voltage swing this many times in a row.
const MAX_SAME_VSWING: u32 = 5;
const MAX_EQ_LOOP: u32 = 6;
const CR_AUX_RD_INTERVAL_US: u32 = 100;
const EQ_AUX_RD_INTERVAL_DEFAULT_US: u32 = 400;

/// Link training pattern driven by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPattern {
    Disabled,
    Tps1,
    Tps2,
    Tps3,
    Tps4,
}

impl TrainingPattern {
    /// `TRAINING_PATTERN_SET` value, without the scrambling bit.
    fn dpcd_code(self) -> u8 {
        match self {
            TrainingPattern::Disabled => 0,
            TrainingPattern::Tps1 => 1,
            TrainingPattern::Tps2 => 2,
            TrainingPattern::Tps3 => 3,
            TrainingPattern::Tps4 => 7,
        }
    }

    /// `PHYIF_CTRL.TPS_SEL` value.
    fn phy_sel(self) -> u32 {
        match self {
            TrainingPattern::Disabled => 0,
            TrainingPattern::Tps1 => 1,
            TrainingPattern::Tps2 => 2,
            TrainingPattern::Tps3 => 3,
            TrainingPattern::Tps4 => 4,
        }
    }
}

impl<A: DptxTransport, D: Delay> Dptx<A, D> {
    /// Train the main link starting at `requested_rate` x `requested_lanes`,
    /// both capped by the sink. A failed attempt drops the rate one step; once
    /// RBR fails the lane count is halved and the rate restarts at the top.
    ///
    /// The negotiated rate and lane count end up in the link state.
    pub fn perform_training(&mut self, requested_rate: LinkRate, requested_lanes: u8) -> Result<()> {
        if !matches!(requested_lanes, 1 | 2 | 4) {
            error!("training: invalid lane count {}", requested_lanes);
            return ErrorKind::InvalidParam.into();
        }
        if self.link.caps.max_lane_count == 0 {
            self.read_sink_caps()?;
        }
        let caps = self.link.caps;
        let top_rate = requested_rate.min(caps.max_link_rate);
        let mut rate = top_rate;
        let mut lanes = requested_lanes.min(caps.max_lane_count);

        loop {
            match self.train_at(rate, lanes) {
                Ok(()) => {
                    self.link.state = TrainingState::Trained;
                    info!("training: link up at {:?} x{}", rate, lanes);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::TrainingFailed => {
                    self.set_training_pattern(TrainingPattern::Disabled)?;
                    if let Some(lower) = rate.lower() {
                        rate = lower;
                    } else if lanes > 1 {
                        lanes /= 2;
                        rate = top_rate;
                    } else {
                        self.link.state = TrainingState::Failed;
                        error!("training: no working rate/lane combination");
                        return Err(err);
                    }
                    warn!("training: retrying at {:?} x{}", rate, lanes);
                }
                Err(err) => {
                    self.link.state = TrainingState::Failed;
                    return Err(err);
                }
            }
        }
    }

    fn train_at(&mut self, rate: LinkRate, lanes: u8) -> Result<()> {
        let enhanced_frame = self.link.caps.enhanced_frame;
        self.link.link_rate = rate;
        self.link.lane_count = lanes;
        self.link.status = [0; LANE_STATUS_LEN];
        self.link.reset_lane_drive();
        self.link.state = TrainingState::ClockRecovery;

        let mut phyif = self.read_phyif();
        phyif.modify(
            PHYIF_CTRL::PHYRATE.val(rate.phy_rate())
                + PHYIF_CTRL::PHY_LANES.val(phy_lanes_code(lanes))
                + PHYIF_CTRL::PHY_POWERDOWN.val(0)
                + PHYIF_CTRL::XMIT_EN.val((1u32 << lanes) - 1),
        );
        self.aux.write_reg(DPTX_PHYIF_CTRL, phyif.get());

        let mut cctl = self.read_cctl();
        cctl.modify(if enhanced_frame {
            CCTL::ENH_FRAME_EN::SET
        } else {
            CCTL::ENH_FRAME_EN::CLEAR
        });
        self.write_cctl(cctl);

        self.aux.write_dpcd(DP_LINK_BW_SET, rate.dpcd_code())?;
        let mut lane_count_set = lanes;
        if enhanced_frame {
            lane_count_set |= DP_LANE_COUNT_ENHANCED_FRAME_EN;
        }
        self.aux.write_dpcd(DP_LANE_COUNT_SET, lane_count_set)?;

        self.clock_recovery()?;
        self.link.state = TrainingState::ChannelEqualization;
        self.channel_equalization()?;
        self.set_training_pattern(TrainingPattern::Disabled)
    }

    fn clock_recovery(&mut self) -> Result<()> {
        let lanes = self.link.lane_count as usize;
        self.set_training_pattern(TrainingPattern::Tps1)?;
        self.write_lane_drive()?;

        let mut same_vswing = 0;
        for _ in 0..MAX_CR_LOOP {
            self.delay.delay_us(CR_AUX_RD_INTERVAL_US);
            self.read_lane_status()?;
            if self.link.cr_done() {
                debug!("training: clock recovery done, vswing {:?}", &self.link.vswing[..lanes]);
                return Ok(());
            }
            if (0..lanes).all(|lane| self.link.vswing[lane] == MAX_VSWING_LEVEL) {
                break;
            }
            let prev = self.link.vswing;
            self.adopt_adjust_request();
            if self.link.vswing[..lanes] == prev[..lanes] {
                same_vswing += 1;
                if same_vswing == MAX_SAME_VSWING {
                    break;
                }
            } else {
                same_vswing = 0;
            }
            self.write_lane_drive()?;
        }
        warn!(
            "training: clock recovery failed at {:?} x{}",
            self.link.link_rate, self.link.lane_count
        );
        ErrorKind::TrainingFailed.into()
    }

    fn channel_equalization(&mut self) -> Result<()> {
        let pattern = self.eq_pattern();
        self.set_training_pattern(pattern)?;
        self.write_lane_drive()?;

        let interval = self.eq_interval_us();
        for _ in 0..MAX_EQ_LOOP {
            self.delay.delay_us(interval);
            self.read_lane_status()?;
            if !self.link.cr_done() {
                warn!("training: clock recovery lost during equalization");
                break;
            }
            if self.link.eq_done() {
                debug!("training: channel equalization done with {:?}", pattern);
                return Ok(());
            }
            self.adopt_adjust_request();
            self.write_lane_drive()?;
        }
        warn!(
            "training: channel equalization failed at {:?} x{}",
            self.link.link_rate, self.link.lane_count
        );
        ErrorKind::TrainingFailed.into()
    }

    fn eq_pattern(&self) -> TrainingPattern {
        let caps = &self.link.caps;
        if self.link.link_rate == LinkRate::Hbr3 && caps.tps4 {
            TrainingPattern::Tps4
        } else if caps.tps3 {
            TrainingPattern::Tps3
        } else {
            TrainingPattern::Tps2
        }
    }

    fn eq_interval_us(&self) -> u32 {
        match self.link.caps.aux_rd_interval {
            0 => EQ_AUX_RD_INTERVAL_DEFAULT_US,
            n => n as u32 * 4000,
        }
    }

    /// Drive `pattern` on the source PHY and announce it to the sink.
    pub fn set_training_pattern(&mut self, pattern: TrainingPattern) -> Result<()> {
        let mut phyif = self.read_phyif();
        phyif.modify(PHYIF_CTRL::TPS_SEL.val(pattern.phy_sel()));
        self.aux.write_reg(DPTX_PHYIF_CTRL, phyif.get());

        let mut value = pattern.dpcd_code();
        // TPS4 is sent scrambled
        if matches!(pattern, TrainingPattern::Tps1 | TrainingPattern::Tps2 | TrainingPattern::Tps3) {
            value |= DP_LINK_SCRAMBLING_DISABLE;
        }
        self.aux.write_dpcd(DP_TRAINING_PATTERN_SET, value)?;
        Ok(())
    }

    fn write_lane_drive(&mut self) -> Result<()> {
        let lanes = self.link.lane_count as usize;
        let mut eq: LocalRegisterCopy<u32, PHY_TX_EQ::Register> = LocalRegisterCopy::new(0);
        let mut lane_set = [0u8; DPTX_MAX_LANES];
        for lane in 0..lanes {
            let (vswing, preemph) = (self.link.vswing[lane], self.link.preemph[lane]);
            eq.modify(PHY_TX_EQ_VSWING[lane].val(vswing as u32) + PHY_TX_EQ_PREEMP[lane].val(preemph as u32));
            let mut set = vswing | (preemph << DP_TRAIN_PRE_EMPHASIS_SHIFT);
            if vswing == MAX_VSWING_LEVEL {
                set |= DP_TRAIN_MAX_SWING_REACHED;
            }
            if preemph == MAX_PREEMPH_LEVEL {
                set |= DP_TRAIN_MAX_PRE_EMPHASIS_REACHED;
            }
            lane_set[lane] = set;
        }
        self.aux.write_reg(DPTX_PHY_TX_EQ, eq.get());
        self.aux.write_dpcd_bytes(DP_TRAINING_LANE0_SET, &lane_set[..lanes])?;
        Ok(())
    }

    fn read_lane_status(&mut self) -> Result<()> {
        let status = self.aux.read_dpcd_bytes(DP_LANE0_1_STATUS, LANE_STATUS_LEN as u32)?;
        let n = status.len().min(LANE_STATUS_LEN);
        self.link.status[..n].copy_from_slice(&status[..n]);
        trace!("training: lane status {:02x?}", self.link.status);
        Ok(())
    }

    fn adopt_adjust_request(&mut self) {
        for lane in 0..self.link.lane_count as usize {
            let (vswing, preemph) = self.link.adjust_request(lane);
            self.link.set_lane_drive(lane, vswing, preemph);
        }
    }

    pub(crate) fn read_phyif(&mut self) -> LocalRegisterCopy<u32, PHYIF_CTRL::Register> {
        LocalRegisterCopy::new(self.aux.read_reg(DPTX_PHYIF_CTRL))
    }
}
