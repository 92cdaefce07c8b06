// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use crate::error::Result;

/// Board hooks run before the controller core is initialized on resume.
pub trait PlatformOps {
    /// Pulse the controller reset.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Route the pixel and link clocks to the controller.
    fn set_clock_path(&mut self) -> Result<()> {
        Ok(())
    }

    /// Mux the AUX/HPD/PHY pins.
    fn config_phy_pins(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives the plug state after every hot-plug handling.
pub trait HotplugNotifier {
    fn notify(&mut self, plugged: bool);
}

/// Receives the number of stream sinks after every topology discovery.
pub trait TopologyNotifier {
    fn notify(&mut self, num_sinks: u8);
}
