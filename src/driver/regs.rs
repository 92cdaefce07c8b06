// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Local link-controller registers touched by the engine.

use tock_registers::fields::Field;
use tock_registers::register_bitfields;

/// Core control.
pub const DPTX_CCTL: u32 = 0x200;
/// First of the eight MST virtual channel payload table registers.
pub const DPTX_MST_VCP_TABLE_REG_BASE: u32 = 0x210;
pub const DPTX_MST_VCP_TABLE_REG_COUNT: usize = 8;
pub const DPTX_PHYIF_CTRL: u32 = 0xa00;
pub const DPTX_PHY_TX_EQ: u32 = 0xa04;
/// Hot-plug status.
pub const DPTX_HPDSTS: u32 = 0xd08;

/// Offset of VCP table register `n` (8 slots of 4 bits each).
pub const fn vcp_table_reg(n: usize) -> u32 {
    DPTX_MST_VCP_TABLE_REG_BASE + (n as u32) * 4
}

register_bitfields! {u32,
    pub CCTL [
        SCRAMBLE_DIS OFFSET(0) NUMBITS(1) [],
        ENH_FRAME_EN OFFSET(1) NUMBITS(1) [],
        ENABLE_MST_MODE OFFSET(25) NUMBITS(1) [],
        INITIATE_MST_ACT OFFSET(28) NUMBITS(1) []
    ]
}

register_bitfields! {u32,
    pub PHYIF_CTRL [
        TPS_SEL OFFSET(0) NUMBITS(4) [],
        PHYRATE OFFSET(4) NUMBITS(2) [],
        PHY_LANES OFFSET(6) NUMBITS(2) [],
        XMIT_EN OFFSET(8) NUMBITS(4) [],
        SSC_DIS OFFSET(16) NUMBITS(1) [],
        PHY_POWERDOWN OFFSET(17) NUMBITS(4) []
    ]
}

register_bitfields! {u32,
    pub PHY_TX_EQ [
        LANE0_VSWING OFFSET(0) NUMBITS(2) [],
        LANE0_PREEMP OFFSET(2) NUMBITS(2) [],
        LANE1_VSWING OFFSET(6) NUMBITS(2) [],
        LANE1_PREEMP OFFSET(8) NUMBITS(2) [],
        LANE2_VSWING OFFSET(12) NUMBITS(2) [],
        LANE2_PREEMP OFFSET(14) NUMBITS(2) [],
        LANE3_VSWING OFFSET(18) NUMBITS(2) [],
        LANE3_PREEMP OFFSET(20) NUMBITS(2) []
    ]
}

register_bitfields! {u32,
    pub HPDSTS [
        HPD_STATUS OFFSET(1) NUMBITS(1) []
    ]
}

pub const PHY_TX_EQ_VSWING: [Field<u32, PHY_TX_EQ::Register>; 4] = [
    PHY_TX_EQ::LANE0_VSWING,
    PHY_TX_EQ::LANE1_VSWING,
    PHY_TX_EQ::LANE2_VSWING,
    PHY_TX_EQ::LANE3_VSWING,
];

pub const PHY_TX_EQ_PREEMP: [Field<u32, PHY_TX_EQ::Register>; 4] = [
    PHY_TX_EQ::LANE0_PREEMP,
    PHY_TX_EQ::LANE1_PREEMP,
    PHY_TX_EQ::LANE2_PREEMP,
    PHY_TX_EQ::LANE3_PREEMP,
];

/// PHYIF_CTRL.PHY_LANES encoding of a lane count.
pub fn phy_lanes_code(lanes: u8) -> u32 {
    match lanes {
        1 => 0,
        2 => 1,
        _ => 2,
    }
}
