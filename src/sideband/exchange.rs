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

use super::{data_crc8, decode_sideband_header, encode_sideband_msg, is_nak_reply, parse_nak_reply, reply_request_type};
use super::{ParseError, SidebandMsgHdr, DP_SIDEBAND_REQ_TYPE_MASK};
use crate::device::Dptx;
use crate::driver::dpcd::*;
use crate::driver::DptxTransport;
use crate::error::{ErrorKind, Result};
use crate::utils::Delay;

/// Reply-ready polls per fragment, 1ms apart.
pub const MAX_NUMBER_TO_WAIT_MSG_REPLY: u32 = 500;
/// Re-sends after a reply echoing another request id.
pub const MAX_REQUEST_ID_RETRY: u32 = 3;
/// Polls of the final clear pass, 1ms apart.
pub const MAX_CHECK_CLEAR_REPLY: u32 = 10;
const SIDEBAND_REPLY_READ_LEN: u32 = 256;
const MAX_REPLY_FRAGMENTS: usize = 32;

impl<A: DptxTransport, D: Delay> Dptx<A, D> {
    /// Write one down request and collect its down reply.
    ///
    /// The returned body starts with the reply type / request id byte and has
    /// the fragment CRCs stripped. A reply for another request id makes the whole
    /// exchange start over, at most `MAX_REQUEST_ID_RETRY` times.
    pub fn send_and_await_reply(&mut self, hdr: &SidebandMsgHdr, body: &[u8]) -> Result<Vec<u8>> {
        let request_id = match body.first() {
            Some(id) => id & DP_SIDEBAND_REQ_TYPE_MASK,
            None => return ErrorKind::InvalidParam.into(),
        };
        let frame = encode_sideband_msg(hdr, body)?;

        for attempt in 0..=MAX_REQUEST_ID_RETRY {
            trace!("sideband: down request {:02x?}", frame);
            self.aux.write_dpcd_bytes(DP_SIDEBAND_MSG_DOWN_REQ_BASE, &frame)?;
            let reply = self.receive_down_reply()?;
            match reply_request_type(&reply) {
                Some(id) if id == request_id => {
                    self.clear_down_reply()?;
                    return Ok(reply);
                }
                id => warn!(
                    "sideband: reply {:x?} while waiting for {:#x}, attempt {}",
                    id,
                    request_id,
                    attempt + 1
                ),
            }
        }
        error!("sideband: request {:#x} never got a matching reply", request_id);
        ErrorKind::SidebandRequestMismatch.into()
    }

    /// [`Self::send_and_await_reply`] with NAK replies turned into `SidebandNak`.
    pub fn sideband_request(&mut self, hdr: &SidebandMsgHdr, body: &[u8]) -> Result<Vec<u8>> {
        let reply = self.send_and_await_reply(hdr, body)?;
        if is_nak_reply(&reply) {
            match parse_nak_reply(&reply) {
                Ok(nak) => warn!(
                    "sideband: request {:#x} nak, reason {:#x} data {:#x}",
                    reply[0] & DP_SIDEBAND_REQ_TYPE_MASK,
                    nak.reason,
                    nak.nak_data
                ),
                Err(e) => warn!("sideband: unreadable nak: {}", e),
            }
            return ErrorKind::SidebandNak.into();
        }
        Ok(reply)
    }

    fn receive_down_reply(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        for _ in 0..MAX_REPLY_FRAGMENTS {
            let irq_vector = self.wait_down_reply_ready()?;
            let raw = self
                .aux
                .read_dpcd_bytes(DP_SIDEBAND_MSG_DOWN_REP_BASE, SIDEBAND_REPLY_READ_LEN)?;
            // ack right away, the sink holds the next fragment until then
            self.aux.write_dpcd(irq_vector, DP_DOWN_REP_MSG_RDY)?;

            let (hdr, hdr_len) = decode_sideband_header(&raw)?;
            if hdr.msg_len == 0 {
                return Err(ParseError::ZeroLength.into());
            }
            let end = hdr_len + hdr.msg_len as usize;
            if raw.len() < end {
                return Err(ParseError::Truncated.into());
            }
            let chunk = &raw[hdr_len..end - 1];
            if data_crc8(chunk) != raw[end - 1] {
                return Err(ParseError::BodyCrc.into());
            }
            if hdr.somt {
                body.clear();
            }
            body.extend_from_slice(chunk);
            if hdr.eomt {
                return Ok(body);
            }
        }
        error!("sideband: reply spans more than {} fragments", MAX_REPLY_FRAGMENTS);
        ErrorKind::Malformed.into()
    }

    /// Poll the legacy and the ESI0 service IRQ vector for a down reply and
    /// return the address that reported it.
    fn wait_down_reply_ready(&mut self) -> Result<u32> {
        for _ in 0..MAX_NUMBER_TO_WAIT_MSG_REPLY {
            for vector in [DP_DEVICE_SERVICE_IRQ_VECTOR, DP_DEVICE_SERVICE_IRQ_VECTOR_ESI0] {
                if self.aux.read_dpcd(vector)? & DP_DOWN_REP_MSG_RDY != 0 {
                    return Ok(vector);
                }
            }
            self.delay.delay_ms(1);
        }
        error!("sideband: no down reply within {}ms", MAX_NUMBER_TO_WAIT_MSG_REPLY);
        ErrorKind::SidebandTimeout.into()
    }

    /// Leave the mailbox without a pending reply-ready bit.
    fn clear_down_reply(&mut self) -> Result<()> {
        for _ in 0..MAX_CHECK_CLEAR_REPLY {
            let mut pending = false;
            for vector in [DP_DEVICE_SERVICE_IRQ_VECTOR, DP_DEVICE_SERVICE_IRQ_VECTOR_ESI0] {
                if self.aux.read_dpcd(vector)? & DP_DOWN_REP_MSG_RDY != 0 {
                    self.aux.write_dpcd(vector, DP_DOWN_REP_MSG_RDY)?;
                    pending = true;
                }
            }
            if !pending {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        error!("sideband: down reply ready bit stuck");
        ErrorKind::SidebandBusy.into()
    }
}
