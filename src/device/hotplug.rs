// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use spin::{Mutex, MutexGuard};

use super::Dptx;
use crate::driver::DptxTransport;
use crate::error::{ErrorKind, Result};
use crate::utils::Delay;

/// Where the plug sequence of a sink currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HotplugState {
    #[default]
    Unplugged,
    CapabilitiesRead,
    BringUp,
    Training,
    TopologyConfig,
    Active,
}

impl<A: DptxTransport, D: Delay> Dptx<A, D> {
    /// Capabilities, bring-up, training and, in MST mode, topology configuration.
    fn plug_sequence(&mut self) -> Result<()> {
        self.link.plugged = true;
        self.hpd_state = HotplugState::CapabilitiesRead;
        let caps = self.read_sink_caps()?;

        self.hpd_state = HotplugState::BringUp;
        self.bring_up_with_caps(caps, self.config.multi_stream)?;

        self.hpd_state = HotplugState::Training;
        self.perform_training(self.config.max_link_rate, self.config.max_lane_count)?;

        if self.multi_stream {
            self.hpd_state = HotplugState::TopologyConfig;
            self.configure_topology()?;
        }
        self.set_active();
        Ok(())
    }

    fn configure_topology(&mut self) -> Result<()> {
        let sideband = self.config.sideband_msg_supported;
        if sideband {
            self.clear_payload_id_table()?;
            let found = self.get_topology_state()?;
            if let Some(notifier) = self.topology_notifier.as_mut() {
                notifier.notify(found);
            }
            if found < self.num_streams {
                warn!("hotplug: {} streams configured, {} sinks found", self.num_streams, found);
            }
        }
        self.set_topology_configuration(self.num_streams, sideband)
    }

    fn set_active(&mut self) {
        self.hpd_state = HotplugState::Active;
        info!(
            "hotplug: link active at {:?} x{}, {}",
            self.link.link_rate,
            self.link.lane_count,
            if self.multi_stream { "MST" } else { "SST" }
        );
        if let Some(notifier) = self.hotplug_notifier.as_mut() {
            notifier.notify(true);
        }
    }

    fn platform_bring_up(&mut self) -> Result<()> {
        if let Some(platform) = self.platform.as_mut() {
            platform.reset()?;
            platform.set_clock_path()?;
            platform.config_phy_pins()?;
        }
        Ok(())
    }

    /// HPD interrupt entry. An asserted HPD runs the plug sequence, a deasserted
    /// one tears a previously plugged link down. A failed plug sequence leaves
    /// the link unplugged until the next HPD event.
    pub fn handle_hotplug(&mut self) -> Result<()> {
        if !self.hpd_plugged() {
            if self.hpd_state != HotplugState::Unplugged {
                if let Err(e) = self.core_deinit() {
                    warn!("hotplug: deinit after unplug: {}", e);
                }
                self.hot_unplug_handle();
            }
            return Ok(());
        }

        info!("hotplug: sink detected");
        self.plug_sequence().map_err(|e| {
            error!("hotplug: plug sequence failed: {}", e);
            self.hot_unplug_handle();
            e
        })
    }

    /// Bring the controller and a present sink back after system resume.
    ///
    /// An ACT timeout restarts everything from the platform reset once. A second
    /// ACT timeout is logged and the link is kept active as configured.
    pub fn resume_sequence(&mut self) -> Result<()> {
        let mut retried = false;
        loop {
            self.platform_bring_up()?;
            self.core_init();
            if !self.hpd_plugged() {
                self.link.plugged = false;
                info!("resume: no sink present");
                return Ok(());
            }

            match self.plug_sequence() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::MstActTimeout && !retried => {
                    warn!("resume: ACT timeout, restarting the link");
                    if let Err(e) = self.core_deinit() {
                        warn!("resume: deinit before retry: {}", e);
                    }
                    self.hot_unplug_handle();
                    retried = true;
                }
                Err(e) if e.kind() == ErrorKind::MstActTimeout => {
                    warn!("resume: ACT timeout after restart, keeping current configuration");
                    self.set_active();
                    return Ok(());
                }
                Err(e) => {
                    error!("resume: {}", e);
                    self.hot_unplug_handle();
                    return Err(e);
                }
            }
        }
    }

    /// Always completes; teardown errors are only logged.
    pub fn suspend_sequence(&mut self) -> Result<()> {
        if let Err(e) = self.core_deinit() {
            warn!("suspend: deinit: {}", e);
        }
        self.hot_unplug_handle();
        Ok(())
    }
}

/// A [`Dptx`] behind the lock held across every whole sequence.
pub struct DptxController<A: DptxTransport, D: Delay> {
    inner: Mutex<Dptx<A, D>>,
}

impl<A: DptxTransport, D: Delay> DptxController<A, D> {
    pub fn new(dptx: Dptx<A, D>) -> Self {
        info!(
            "dptx-mst {} (rustc {})",
            crate::built_info::PKG_VERSION,
            crate::built_info::RUSTC_VERSION
        );
        Self {
            inner: Mutex::new(dptx),
        }
    }

    pub fn resume(&self) -> Result<()> {
        self.inner.lock().resume_sequence()
    }

    pub fn suspend(&self) -> Result<()> {
        self.inner.lock().suspend_sequence()
    }

    pub fn handle_hotplug(&self) -> Result<()> {
        self.inner.lock().handle_hotplug()
    }

    pub fn lock(&self) -> MutexGuard<'_, Dptx<A, D>> {
        self.inner.lock()
    }

    pub fn into_inner(self) -> Dptx<A, D> {
        self.inner.into_inner()
    }
}
