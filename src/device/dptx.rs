// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use alloc::boxed::Box;

use tock_registers::LocalRegisterCopy;

use super::{HotplugNotifier, HotplugState, PlatformOps, TopologyNotifier};
use crate::config::DptxConfig;
use crate::driver::dpcd::{DP_SET_POWER, DP_SET_POWER_D3};
use crate::driver::regs::*;
use crate::driver::DptxTransport;
use crate::error::{ErrorKind, Result};
use crate::link::LinkState;
use crate::mst::{PayloadState, Topology};
use crate::utils::Delay;

/// One DisplayPort transmitter: its transport, configuration and every piece
/// of link, topology and payload state the sequences operate on.
pub struct Dptx<A: DptxTransport, D: Delay> {
    pub(crate) aux: A,
    pub(crate) delay: D,
    pub(crate) config: DptxConfig,
    /// Stream mode decided at bring-up, may be a downgrade of `config`.
    pub(crate) multi_stream: bool,
    pub(crate) num_streams: u8,
    pub(crate) link: LinkState,
    pub(crate) topology: Topology,
    pub(crate) payload: PayloadState,
    pub(crate) hpd_state: HotplugState,
    pub(crate) platform: Option<Box<dyn PlatformOps + Send>>,
    pub(crate) hotplug_notifier: Option<Box<dyn HotplugNotifier + Send>>,
    pub(crate) topology_notifier: Option<Box<dyn TopologyNotifier + Send>>,
}

impl<A: DptxTransport, D: Delay> Dptx<A, D> {
    pub fn new(aux: A, delay: D, config: DptxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            aux,
            delay,
            multi_stream: config.multi_stream,
            num_streams: config.num_streams,
            config,
            link: LinkState::new(),
            topology: Topology::new(),
            payload: PayloadState::new(),
            hpd_state: HotplugState::Unplugged,
            platform: None,
            hotplug_notifier: None,
            topology_notifier: None,
        })
    }

    pub fn transport(&self) -> &A {
        &self.aux
    }

    pub fn transport_mut(&mut self) -> &mut A {
        &mut self.aux
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn config(&self) -> &DptxConfig {
        &self.config
    }

    pub fn link_state(&self) -> &LinkState {
        &self.link
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn payload(&self) -> &PayloadState {
        &self.payload
    }

    pub fn is_multi_stream(&self) -> bool {
        self.multi_stream
    }

    pub fn num_streams(&self) -> u8 {
        self.num_streams
    }

    pub fn hpd_state(&self) -> HotplugState {
        self.hpd_state
    }

    pub fn set_platform(&mut self, platform: Box<dyn PlatformOps + Send>) {
        self.platform = Some(platform);
    }

    pub fn register_hotplug_notifier(&mut self, notifier: Box<dyn HotplugNotifier + Send>) -> Result<()> {
        if self.hotplug_notifier.is_some() {
            warn!("dptx: hotplug notifier already registered");
            return ErrorKind::AlreadyExists.into();
        }
        self.hotplug_notifier = Some(notifier);
        Ok(())
    }

    pub fn unregister_hotplug_notifier(&mut self) -> Option<Box<dyn HotplugNotifier + Send>> {
        self.hotplug_notifier.take()
    }

    pub fn register_topology_notifier(&mut self, notifier: Box<dyn TopologyNotifier + Send>) -> Result<()> {
        if self.topology_notifier.is_some() {
            warn!("dptx: topology notifier already registered");
            return ErrorKind::AlreadyExists.into();
        }
        self.topology_notifier = Some(notifier);
        Ok(())
    }

    pub fn unregister_topology_notifier(&mut self) -> Option<Box<dyn TopologyNotifier + Send>> {
        self.topology_notifier.take()
    }

    pub(crate) fn read_cctl(&mut self) -> LocalRegisterCopy<u32, CCTL::Register> {
        LocalRegisterCopy::new(self.aux.read_reg(DPTX_CCTL))
    }

    pub(crate) fn write_cctl(&mut self, cctl: LocalRegisterCopy<u32, CCTL::Register>) {
        self.aux.write_reg(DPTX_CCTL, cctl.get());
    }

    /// Hot-plug detect level as seen by the controller.
    pub fn hpd_plugged(&mut self) -> bool {
        let hpd: LocalRegisterCopy<u32, HPDSTS::Register> = LocalRegisterCopy::new(self.aux.read_reg(DPTX_HPDSTS));
        hpd.is_set(HPDSTS::HPD_STATUS)
    }

    /// Controller core to its post-reset state: SST, empty payload table, PHY powered, lanes idle.
    pub fn core_init(&mut self) {
        self.aux.write_reg(DPTX_CCTL, 0);
        for n in 0..DPTX_MST_VCP_TABLE_REG_COUNT {
            self.aux.write_reg(vcp_table_reg(n), 0);
        }
        let mut phyif = self.read_phyif();
        phyif.modify(PHYIF_CTRL::PHY_POWERDOWN.val(0) + PHYIF_CTRL::XMIT_EN.val(0) + PHYIF_CTRL::TPS_SEL.val(0));
        self.aux.write_reg(DPTX_PHYIF_CTRL, phyif.get());
        debug!("dptx: core initialized");
    }

    /// Stop the link and power the PHY down. A sink still marked plugged is put to D3.
    pub fn core_deinit(&mut self) -> Result<()> {
        let mut phyif = self.read_phyif();
        phyif.modify(PHYIF_CTRL::XMIT_EN.val(0) + PHYIF_CTRL::PHY_POWERDOWN.val(0xf));
        self.aux.write_reg(DPTX_PHYIF_CTRL, phyif.get());
        self.aux.write_reg(DPTX_CCTL, 0);
        if self.link.plugged {
            self.aux.write_dpcd(DP_SET_POWER, DP_SET_POWER_D3)?;
        }
        debug!("dptx: core deinitialized");
        Ok(())
    }

    /// Forget everything learned about the sink and report it gone.
    pub fn hot_unplug_handle(&mut self) {
        let was_plugged = self.hpd_state != HotplugState::Unplugged;
        self.link.reset();
        self.topology.reset();
        self.payload.reset();
        self.multi_stream = self.config.multi_stream;
        self.num_streams = self.config.num_streams;
        self.hpd_state = HotplugState::Unplugged;
        if was_plugged {
            info!("dptx: sink unplugged");
            if let Some(notifier) = self.hotplug_notifier.as_mut() {
                notifier.notify(false);
            }
        }
    }
}
