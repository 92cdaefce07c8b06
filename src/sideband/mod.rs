// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! DisplayPort MST sideband messages.
//! * codec: header/body framing and the header/body CRCs.
//! * msg: request builders and reply parsers for the message types the engine uses.
//! * exchange: one request, one (possibly fragmented) reply over the DPCD mailbox.

pub use self::codec::*;
pub use self::exchange::*;
pub use self::msg::*;

mod codec;
mod exchange;
mod msg;

use core::fmt;

/// Why received sideband bytes were rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer bytes than the header or body length announces.
    Truncated,
    HeaderCrc,
    BodyCrc,
    /// A fragment announced an empty body (not even the CRC byte).
    ZeroLength,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ParseError::Truncated => "sideband message truncated",
            ParseError::HeaderCrc => "sideband header crc mismatch",
            ParseError::BodyCrc => "sideband body crc mismatch",
            ParseError::ZeroLength => "sideband message without body",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for ParseError {}
