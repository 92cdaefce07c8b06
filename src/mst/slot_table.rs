// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use core::ops::Range;

use crate::driver::regs::DPTX_MST_VCP_TABLE_REG_COUNT;
use crate::error::{ErrorKind, Result};

/// MTP time slots per link frame. Slot 0 carries the MTP header.
pub const DPTX_MAX_LINK_SLOTS: usize = 64;
const SLOTS_PER_REG: usize = 8;
const SLOT_BITS: usize = 4;

/// Local copy of the 64-slot VC payload table, one nibble per slot holding the
/// 1-based stream id (0 = free), packed eight slots to a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotTable {
    regs: [u32; DPTX_MST_VCP_TABLE_REG_COUNT],
}

impl SlotTable {
    pub const fn new() -> Self {
        Self {
            regs: [0; DPTX_MST_VCP_TABLE_REG_COUNT],
        }
    }

    /// `slot` must be below `DPTX_MAX_LINK_SLOTS`.
    pub fn set_slot(&mut self, slot: usize, value: u8) {
        let shift = (slot % SLOTS_PER_REG) * SLOT_BITS;
        let reg = &mut self.regs[slot / SLOTS_PER_REG];
        *reg = (*reg & !(0xf << shift)) | (((value & 0xf) as u32) << shift);
    }

    pub fn get_slot(&self, slot: usize) -> u8 {
        let shift = (slot % SLOTS_PER_REG) * SLOT_BITS;
        ((self.regs[slot / SLOTS_PER_REG] >> shift) & 0xf) as u8
    }

    /// Assign `count` slots starting at `start` to `value`.
    pub fn fill(&mut self, start: usize, count: usize, value: u8) -> Result<()> {
        if start + count > DPTX_MAX_LINK_SLOTS {
            error!(
                "slot table: slots {}..{} exceed {} link slots",
                start,
                start + count,
                DPTX_MAX_LINK_SLOTS
            );
            return ErrorKind::InvalidParam.into();
        }
        for slot in start..start + count {
            self.set_slot(slot, value);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.regs = [0; DPTX_MST_VCP_TABLE_REG_COUNT];
    }

    /// Packed value of table register `n`.
    pub fn reg(&self, n: usize) -> u32 {
        self.regs[n]
    }

    /// Table registers touched by `count` slots starting at `start`.
    pub fn regs_spanning(start: usize, count: usize) -> Range<usize> {
        if count == 0 {
            return 0..0;
        }
        start / SLOTS_PER_REG..(start + count - 1) / SLOTS_PER_REG + 1
    }
}
