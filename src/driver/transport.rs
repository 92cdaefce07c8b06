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
use core::fmt;

/// Failure reported by the AUX channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxError {
    /// Sink answered AUX_NACK / I2C_NACK.
    Nack,
    /// Sink kept answering AUX_DEFER past the retry budget of the AUX layer.
    Defer,
    /// No reply within the AUX reply timeout.
    Timeout,
    /// Controller-side failure.
    Io,
}

impl fmt::Display for AuxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            AuxError::Nack => "aux nack",
            AuxError::Defer => "aux defer",
            AuxError::Timeout => "aux reply timeout",
            AuxError::Io => "aux controller error",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for AuxError {}

/// Operations the engine needs from the DPTX controller: DPCD access over the
/// AUX channel and local link-controller register access.
///
/// DPCD access is a synchronous request/response that can fail. Local register
/// access cannot fail.
pub trait DptxTransport {
    fn read_dpcd(&mut self, address: u32) -> Result<u8, AuxError>;

    fn write_dpcd(&mut self, address: u32, value: u8) -> Result<(), AuxError>;

    fn read_dpcd_bytes(&mut self, address: u32, len: u32) -> Result<Vec<u8>, AuxError> {
        (0..len).map(|i| self.read_dpcd(address + i)).collect()
    }

    fn write_dpcd_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<(), AuxError> {
        for (i, byte) in bytes.iter().enumerate() {
            self.write_dpcd(address + i as u32, *byte)?;
        }
        Ok(())
    }

    fn read_reg(&mut self, offset: u32) -> u32;

    fn write_reg(&mut self, offset: u32, value: u32);
}
