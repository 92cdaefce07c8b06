// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! DPCD addresses and bit definitions used by the engine (VESA DisplayPort 1.4).

/* RECEIVER CAPABILITY */
pub const DP_DPCD_REV: u32 = 0x000;
pub const DP_MAX_LINK_RATE: u32 = 0x001;
pub const DP_MAX_LANE_COUNT: u32 = 0x002;
pub const DP_MAX_LANE_COUNT_MASK: u8 = 0x1f;
pub const DP_TPS3_SUPPORTED: u8 = 1 << 6;
pub const DP_ENHANCED_FRAME_CAP: u8 = 1 << 7;
pub const DP_MAX_DOWNSPREAD: u32 = 0x003;
pub const DP_MAX_DOWNSPREAD_0_5: u8 = 1 << 0;
pub const DP_TPS4_SUPPORTED: u8 = 1 << 7;
pub const DP_TRAINING_AUX_RD_INTERVAL: u32 = 0x00e;
pub const DP_TRAINING_AUX_RD_MASK: u8 = 0x7f;
pub const DP_MSTM_CAP: u32 = 0x021;
pub const DP_MST_CAP: u8 = 1 << 0;

/* LINK CONFIGURATION */
pub const DP_LINK_BW_SET: u32 = 0x100;
pub const DP_LANE_COUNT_SET: u32 = 0x101;
pub const DP_LANE_COUNT_ENHANCED_FRAME_EN: u8 = 1 << 7;
pub const DP_TRAINING_PATTERN_SET: u32 = 0x102;
pub const DP_LINK_SCRAMBLING_DISABLE: u8 = 1 << 5;
pub const DP_TRAINING_LANE0_SET: u32 = 0x103;
pub const DP_TRAIN_VOLTAGE_SWING_MASK: u8 = 0x3;
pub const DP_TRAIN_MAX_SWING_REACHED: u8 = 1 << 2;
pub const DP_TRAIN_PRE_EMPHASIS_SHIFT: u8 = 3;
pub const DP_TRAIN_MAX_PRE_EMPHASIS_REACHED: u8 = 1 << 5;
pub const DP_DOWNSPREAD_CTRL: u32 = 0x107;
pub const DP_SPREAD_AMP_0_5: u8 = 1 << 4;
pub const DP_MSTM_CTRL: u32 = 0x111;
pub const DP_MST_EN: u8 = 1 << 0;
pub const DP_UP_REQ_EN: u8 = 1 << 1;
pub const DP_UPSTREAM_IS_SRC: u8 = 1 << 2;

/* PAYLOAD TABLE */
pub const DP_PAYLOAD_ALLOCATE_SET: u32 = 0x1c0;
pub const DP_PAYLOAD_ALLOCATE_TIME_SLOT_COUNT: u32 = 0x1c2;
/// Time slot count written with VC payload id 0 to wipe the whole table.
pub const DP_PAYLOAD_CLEAR_ALL_SLOTS: u8 = 0x3f;

/* LINK/SINK DEVICE STATUS */
pub const DP_DEVICE_SERVICE_IRQ_VECTOR: u32 = 0x201;
pub const DP_DOWN_REP_MSG_RDY: u8 = 1 << 4;
pub const DP_LANE0_1_STATUS: u32 = 0x202;
pub const DP_LANE_ALIGN_STATUS_UPDATED: u32 = 0x204;
pub const DP_ADJUST_REQUEST_LANE0_1: u32 = 0x206;
pub const DP_LANE_CR_DONE: u8 = 1 << 0;
pub const DP_LANE_CHANNEL_EQ_DONE: u8 = 1 << 1;
pub const DP_LANE_SYMBOL_LOCKED: u8 = 1 << 2;
pub const DP_CHANNEL_EQ_BITS: u8 = DP_LANE_CR_DONE | DP_LANE_CHANNEL_EQ_DONE | DP_LANE_SYMBOL_LOCKED;
pub const DP_INTERLANE_ALIGN_DONE: u8 = 1 << 0;
pub const DP_PAYLOAD_TABLE_UPDATE_STATUS: u32 = 0x2c0;
pub const DP_PAYLOAD_TABLE_UPDATED: u8 = 1 << 0;
pub const DP_PAYLOAD_ACT_HANDLED: u8 = 1 << 1;

/* SINK CONTROL */
pub const DP_SET_POWER: u32 = 0x600;
pub const DP_SET_POWER_D0: u8 = 0x1;
pub const DP_SET_POWER_D3: u8 = 0x2;

/* SIDEBAND MSG BUFFERS */
pub const DP_SIDEBAND_MSG_DOWN_REQ_BASE: u32 = 0x1000;
pub const DP_SIDEBAND_MSG_DOWN_REP_BASE: u32 = 0x1400;

/* EVENT STATUS INDICATOR */
pub const DP_DEVICE_SERVICE_IRQ_VECTOR_ESI0: u32 = 0x2003;
