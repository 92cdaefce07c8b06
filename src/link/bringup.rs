// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use crate::device::Dptx;
use crate::driver::dpcd::*;
use crate::driver::regs::{CCTL, DPTX_PHYIF_CTRL, PHYIF_CTRL};
use crate::driver::DptxTransport;
use crate::error::Result;
use crate::link::{LinkRate, SinkCaps};
use crate::utils::Delay;

impl<A: DptxTransport, D: Delay> Dptx<A, D> {
    /// Read the receiver capability block and the MST capability of the sink.
    pub fn read_sink_caps(&mut self) -> Result<SinkCaps> {
        let rev = self.aux.read_dpcd(DP_DPCD_REV)?;
        let rate_code = self.aux.read_dpcd(DP_MAX_LINK_RATE)?;
        let lanes = self.aux.read_dpcd(DP_MAX_LANE_COUNT)?;
        let downspread = self.aux.read_dpcd(DP_MAX_DOWNSPREAD)?;
        let interval = self.aux.read_dpcd(DP_TRAINING_AUX_RD_INTERVAL)?;
        let mstm = self.aux.read_dpcd(DP_MSTM_CAP)?;

        let max_link_rate = LinkRate::from_dpcd(rate_code).unwrap_or_else(|| {
            warn!("bringup: unknown max link rate {:#x}, assuming RBR", rate_code);
            LinkRate::Rbr
        });
        let max_lane_count = match lanes & DP_MAX_LANE_COUNT_MASK {
            n if n >= 4 => 4,
            2 | 3 => 2,
            _ => 1,
        };
        let caps = SinkCaps {
            dpcd_rev: rev,
            max_link_rate,
            max_lane_count,
            enhanced_frame: lanes & DP_ENHANCED_FRAME_CAP != 0,
            tps3: lanes & DP_TPS3_SUPPORTED != 0,
            tps4: downspread & DP_TPS4_SUPPORTED != 0,
            downspread: downspread & DP_MAX_DOWNSPREAD_0_5 != 0,
            mst: mstm & DP_MST_CAP != 0,
            aux_rd_interval: interval & DP_TRAINING_AUX_RD_MASK,
        };
        debug!(
            "bringup: sink dpcd rev {:#x}, max {:?} x{}, mst {}",
            caps.dpcd_rev, caps.max_link_rate, caps.max_lane_count, caps.mst
        );
        self.link.caps = caps;
        Ok(caps)
    }

    /// Establish the preconditions of link training: read the sink, power it up,
    /// settle spread spectrum and match the stream mode of source and sink.
    ///
    /// A sink without MST capability downgrades the controller to SST with one
    /// stream, whatever the configuration asked for.
    pub fn perform_bringup(&mut self, mst_requested: bool) -> Result<()> {
        let caps = self.read_sink_caps()?;
        self.bring_up_with_caps(caps, mst_requested)
    }

    /// Bring-up once `caps` has been read from the sink.
    pub(crate) fn bring_up_with_caps(&mut self, caps: SinkCaps, mst_requested: bool) -> Result<()> {
        self.aux.write_dpcd(DP_SET_POWER, DP_SET_POWER_D0)?;
        self.configure_ssc(caps.downspread)?;

        let mut cctl = self.read_cctl();
        if mst_requested && caps.mst {
            cctl.modify(CCTL::ENABLE_MST_MODE::SET);
            self.write_cctl(cctl);
            self.aux
                .write_dpcd(DP_MSTM_CTRL, DP_MST_EN | DP_UP_REQ_EN | DP_UPSTREAM_IS_SRC)?;
            self.multi_stream = true;
            self.num_streams = self.config.num_streams;
            info!("bringup: MST enabled, {} streams", self.num_streams);
            return Ok(());
        }

        if mst_requested {
            warn!("bringup: sink is not MST capable, falling back to SST");
        }
        cctl.modify(CCTL::ENABLE_MST_MODE::CLEAR);
        self.write_cctl(cctl);
        if !mst_requested && caps.mst {
            let ctrl = self.aux.read_dpcd(DP_MSTM_CTRL)?;
            self.aux
                .write_dpcd(DP_MSTM_CTRL, ctrl & !(DP_MST_EN | DP_UP_REQ_EN | DP_UPSTREAM_IS_SRC))?;
        }
        self.multi_stream = false;
        self.num_streams = 1;
        info!("bringup: SST mode");
        Ok(())
    }

    fn configure_ssc(&mut self, sink_downspread: bool) -> Result<()> {
        let ssc = self.config.ssc_enable && sink_downspread;
        let mut phyif = self.read_phyif();
        phyif.modify(if ssc {
            PHYIF_CTRL::SSC_DIS::CLEAR
        } else {
            PHYIF_CTRL::SSC_DIS::SET
        });
        self.aux.write_reg(DPTX_PHYIF_CTRL, phyif.get());
        self.aux
            .write_dpcd(DP_DOWNSPREAD_CTRL, if ssc { DP_SPREAD_AMP_0_5 } else { 0 })?;
        self.link.ssc = ssc;
        debug!("bringup: ssc {}", if ssc { "on" } else { "off" });
        Ok(())
    }
}
