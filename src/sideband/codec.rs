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

use super::ParseError;
use crate::error::{ErrorKind, Result};

/// A sideband fragment (header, body and body CRC) never exceeds the 48 byte
/// DPCD mailbox.
pub const SIDEBAND_MSG_MAX_LEN: usize = 48;
/// Link count remaining used by broadcast messages.
const BROADCAST_LCR: u8 = 6;

/// Sideband message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SidebandMsgHdr {
    /// Link count total.
    pub lct: u8,
    /// Link count remaining.
    pub lcr: u8,
    /// Relative address, two port nibbles per byte, `lct / 2` bytes used.
    pub rad: [u8; 8],
    pub broadcast: bool,
    pub path_msg: bool,
    /// Body length including the trailing body CRC.
    pub msg_len: u8,
    /// Start of message transaction.
    pub somt: bool,
    /// End of message transaction.
    pub eomt: bool,
    pub seqno: bool,
}

impl SidebandMsgHdr {
    /// Header addressed to the branch device behind `rad_port` of the main
    /// branch, or to the main branch itself when `rad_port` is `None`.
    pub fn to_branch(rad_port: Option<u8>, path_msg: bool) -> Self {
        let mut hdr = Self {
            lct: 1,
            path_msg,
            somt: true,
            eomt: true,
            ..Default::default()
        };
        if let Some(port) = rad_port {
            hdr.lct = 2;
            hdr.lcr = 1;
            hdr.rad[0] = (port & 0xf) << 4;
        }
        hdr
    }

    /// Header of a broadcast path message reaching every branch device.
    pub fn broadcast() -> Self {
        Self {
            lct: 1,
            lcr: BROADCAST_LCR,
            broadcast: true,
            path_msg: true,
            somt: true,
            eomt: true,
            ..Default::default()
        }
    }

    /// Encoded header size.
    pub fn encoded_len(&self) -> usize {
        3 + self.lct as usize / 2
    }
}

/// 4-bit header CRC (polynomial x^4 + x + 1) over the first `num_nibbles`
/// nibbles of `data`.
pub fn header_crc4(data: &[u8], num_nibbles: usize) -> u8 {
    let mut remainder: u8 = 0;
    for bit in 0..num_nibbles * 4 {
        remainder <<= 1;
        remainder |= (data[bit / 8] >> (7 - bit % 8)) & 1;
        if remainder & 0x10 != 0 {
            remainder ^= 0x13;
        }
    }
    for _ in 0..4 {
        remainder <<= 1;
        if remainder & 0x10 != 0 {
            remainder ^= 0x13;
        }
    }
    remainder & 0xf
}

/// 8-bit body CRC (polynomial x^8 + x^7 + x^6 + x^4 + x^2 + 1).
pub fn data_crc8(data: &[u8]) -> u8 {
    let mut remainder: u16 = 0;
    for bit in 0..data.len() * 8 {
        remainder <<= 1;
        remainder |= ((data[bit / 8] >> (7 - bit % 8)) & 1) as u16;
        if remainder & 0x100 != 0 {
            remainder ^= 0xd5;
        }
    }
    for _ in 0..8 {
        remainder <<= 1;
        if remainder & 0x100 != 0 {
            remainder ^= 0xd5;
        }
    }
    (remainder & 0xff) as u8
}

pub fn encode_sideband_crc(payload: &[u8]) -> u8 {
    data_crc8(payload)
}

pub fn encode_sideband_header(hdr: &SidebandMsgHdr) -> Vec<u8> {
    let mut buf = Vec::with_capacity(hdr.encoded_len());
    buf.push(((hdr.lct & 0xf) << 4) | (hdr.lcr & 0xf));
    buf.extend_from_slice(&hdr.rad[..hdr.lct as usize / 2]);
    buf.push(((hdr.broadcast as u8) << 7) | ((hdr.path_msg as u8) << 6) | (hdr.msg_len & 0x3f));
    buf.push(((hdr.somt as u8) << 7) | ((hdr.eomt as u8) << 6) | ((hdr.seqno as u8) << 4));
    let crc = header_crc4(&buf, buf.len() * 2 - 1);
    if let Some(last) = buf.last_mut() {
        *last |= crc;
    }
    buf
}

/// Decode the header at the start of `buf`, returning it with its encoded length.
pub fn decode_sideband_header(buf: &[u8]) -> core::result::Result<(SidebandMsgHdr, usize), ParseError> {
    let first = *buf.first().ok_or(ParseError::Truncated)?;
    let mut hdr = SidebandMsgHdr {
        lct: first >> 4,
        lcr: first & 0xf,
        ..Default::default()
    };
    let len = hdr.encoded_len();
    if buf.len() < len {
        return Err(ParseError::Truncated);
    }
    if header_crc4(buf, len * 2 - 1) != buf[len - 1] & 0xf {
        return Err(ParseError::HeaderCrc);
    }
    let rad_len = hdr.lct as usize / 2;
    hdr.rad[..rad_len].copy_from_slice(&buf[1..1 + rad_len]);
    let flags = buf[1 + rad_len];
    hdr.broadcast = flags & 0x80 != 0;
    hdr.path_msg = flags & 0x40 != 0;
    hdr.msg_len = flags & 0x3f;
    let tail = buf[2 + rad_len];
    hdr.somt = tail & 0x80 != 0;
    hdr.eomt = tail & 0x40 != 0;
    hdr.seqno = tail & 0x10 != 0;
    Ok((hdr, len))
}

/// Frame `body` as a single-fragment message: header, body, body CRC.
pub fn encode_sideband_msg(hdr: &SidebandMsgHdr, body: &[u8]) -> Result<Vec<u8>> {
    let mut hdr = *hdr;
    if body.is_empty() || hdr.encoded_len() + body.len() + 1 > SIDEBAND_MSG_MAX_LEN {
        error!("sideband: request body of {} bytes does not fit one fragment", body.len());
        return ErrorKind::InvalidParam.into();
    }
    hdr.msg_len = body.len() as u8 + 1;
    let mut frame = encode_sideband_header(&hdr);
    frame.extend_from_slice(body);
    frame.push(encode_sideband_crc(body));
    Ok(frame)
}
