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

pub const DP_LINK_ADDRESS: u8 = 0x01;
pub const DP_ENUM_PATH_RESOURCES: u8 = 0x10;
pub const DP_ALLOCATE_PAYLOAD: u8 = 0x11;
pub const DP_CLEAR_PAYLOAD_ID_TABLE: u8 = 0x14;
pub const DP_REMOTE_I2C_READ: u8 = 0x22;

/// Reply type bit of the first reply byte.
pub const DP_SIDEBAND_REPLY_NAK: u8 = 0x80;
pub const DP_SIDEBAND_REQ_TYPE_MASK: u8 = 0x7f;

pub const DP_GUID_LEN: usize = 16;
pub const DP_MAX_LINK_ADDRESS_PORTS: usize = 16;

type ParseResult<T> = core::result::Result<T, ParseError>;

/// Peer device type of a LINK_ADDRESS port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerDeviceType {
    #[default]
    None,
    SourceOrSst,
    MstBranching,
    SstSink,
    DpLegacyConv,
    DpWireless,
    Reserved(u8),
}

impl From<u8> for PeerDeviceType {
    fn from(value: u8) -> Self {
        match value {
            0 => PeerDeviceType::None,
            1 => PeerDeviceType::SourceOrSst,
            2 => PeerDeviceType::MstBranching,
            3 => PeerDeviceType::SstSink,
            4 => PeerDeviceType::DpLegacyConv,
            5 => PeerDeviceType::DpWireless,
            n => PeerDeviceType::Reserved(n),
        }
    }
}

impl From<PeerDeviceType> for u8 {
    fn from(value: PeerDeviceType) -> Self {
        match value {
            PeerDeviceType::None => 0,
            PeerDeviceType::SourceOrSst => 1,
            PeerDeviceType::MstBranching => 2,
            PeerDeviceType::SstSink => 3,
            PeerDeviceType::DpLegacyConv => 4,
            PeerDeviceType::DpWireless => 5,
            PeerDeviceType::Reserved(n) => n,
        }
    }
}

/// One port of a LINK_ADDRESS reply. Output-only fields stay zero on input ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkAddressPort {
    pub input_port: bool,
    pub peer_device_type: PeerDeviceType,
    pub port_number: u8,
    /// Multi-channel sink / messaging capability of the peer.
    pub mcs: bool,
    /// A DP device is plugged.
    pub ddps: bool,
    pub legacy_device_plug_status: bool,
    pub dpcd_revision: u8,
    pub peer_guid: [u8; DP_GUID_LEN],
    pub num_sdp_streams: u8,
    pub num_sdp_stream_sinks: u8,
}

impl LinkAddressPort {
    /// Plugged output port with a single-stream sink behind it.
    pub fn is_stream_sink(&self) -> bool {
        !self.input_port && self.peer_device_type == PeerDeviceType::SstSink && !self.mcs && self.ddps
    }

    /// Plugged output port leading to another branching unit.
    pub fn is_branch(&self) -> bool {
        !self.input_port && self.peer_device_type == PeerDeviceType::MstBranching && self.mcs && self.ddps
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkAddressReply {
    pub guid: [u8; DP_GUID_LEN],
    pub ports: Vec<LinkAddressPort>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumPathResourcesReply {
    pub port_number: u8,
    pub fec_capable: bool,
    pub full_payload_bw_number: u16,
    pub avail_payload_bw_number: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatePayloadReply {
    pub port_number: u8,
    pub vcpi: u8,
    pub allocated_pbn: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteI2cReadReply {
    pub port_number: u8,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NakReply {
    pub guid: [u8; DP_GUID_LEN],
    pub reason: u8,
    pub nak_data: u8,
}

/// Bounds-checked cursor over a reply body.
struct Reader<'a> {
    buf: &'a [u8],
    idx: usize,
}

impl<'a> Reader<'a> {
    /// Skip the reply type / request id byte.
    fn new(raw: &'a [u8]) -> ParseResult<Self> {
        if raw.is_empty() {
            return Err(ParseError::ZeroLength);
        }
        Ok(Self { buf: raw, idx: 1 })
    }

    fn u8(&mut self) -> ParseResult<u8> {
        let byte = *self.buf.get(self.idx).ok_or(ParseError::Truncated)?;
        self.idx += 1;
        Ok(byte)
    }

    fn be16(&mut self) -> ParseResult<u16> {
        Ok(((self.u8()? as u16) << 8) | self.u8()? as u16)
    }

    fn bytes(&mut self, len: usize) -> ParseResult<&'a [u8]> {
        let end = self.idx + len;
        let bytes = self.buf.get(self.idx..end).ok_or(ParseError::Truncated)?;
        self.idx = end;
        Ok(bytes)
    }

    fn guid(&mut self) -> ParseResult<[u8; DP_GUID_LEN]> {
        let mut guid = [0; DP_GUID_LEN];
        guid.copy_from_slice(self.bytes(DP_GUID_LEN)?);
        Ok(guid)
    }
}

pub fn is_nak_reply(raw: &[u8]) -> bool {
    raw.first().is_some_and(|b| b & DP_SIDEBAND_REPLY_NAK != 0)
}

pub fn reply_request_type(raw: &[u8]) -> Option<u8> {
    raw.first().map(|b| b & DP_SIDEBAND_REQ_TYPE_MASK)
}

pub fn build_link_address() -> Vec<u8> {
    alloc::vec![DP_LINK_ADDRESS]
}

pub fn build_enum_path_resources(port_number: u8) -> Vec<u8> {
    alloc::vec![DP_ENUM_PATH_RESOURCES, (port_number & 0xf) << 4]
}

/// ALLOCATE_PAYLOAD without SDP streams.
pub fn build_allocate_payload(port_number: u8, vcpi: u8, pbn: u16) -> Vec<u8> {
    alloc::vec![
        DP_ALLOCATE_PAYLOAD,
        (port_number & 0xf) << 4,
        vcpi & 0x7f,
        (pbn >> 8) as u8,
        (pbn & 0xff) as u8,
    ]
}

pub fn build_clear_payload_id_table() -> Vec<u8> {
    alloc::vec![DP_CLEAR_PAYLOAD_ID_TABLE]
}

/// REMOTE_I2C_READ: one write transaction setting `offset`, then a read of
/// `len` bytes from the same device.
pub fn build_remote_i2c_read(port_number: u8, i2c_addr: u8, offset: u8, len: u8) -> Vec<u8> {
    alloc::vec![
        DP_REMOTE_I2C_READ,
        ((port_number & 0xf) << 4) | 1,
        i2c_addr & 0x7f,
        1,
        offset,
        0,
        i2c_addr & 0x7f,
        len,
    ]
}

pub fn parse_link_address_reply(raw: &[u8]) -> ParseResult<LinkAddressReply> {
    let mut r = Reader::new(raw)?;
    let guid = r.guid()?;
    let nports = (r.u8()? & 0xf) as usize;
    let mut ports = Vec::with_capacity(nports);
    for _ in 0..nports {
        let b = r.u8()?;
        let mut port = LinkAddressPort {
            input_port: b & 0x80 != 0,
            peer_device_type: PeerDeviceType::from((b >> 4) & 0x7),
            port_number: b & 0xf,
            ..Default::default()
        };
        let b = r.u8()?;
        port.mcs = b & 0x80 != 0;
        port.ddps = b & 0x40 != 0;
        if !port.input_port {
            port.legacy_device_plug_status = b & 0x20 != 0;
            port.dpcd_revision = r.u8()?;
            port.peer_guid = r.guid()?;
            let b = r.u8()?;
            port.num_sdp_streams = b >> 4;
            port.num_sdp_stream_sinks = b & 0xf;
        }
        ports.push(port);
    }
    Ok(LinkAddressReply { guid, ports })
}

pub fn parse_enum_path_resources_reply(raw: &[u8]) -> ParseResult<EnumPathResourcesReply> {
    let mut r = Reader::new(raw)?;
    let b = r.u8()?;
    Ok(EnumPathResourcesReply {
        port_number: b >> 4,
        fec_capable: b & 1 != 0,
        full_payload_bw_number: r.be16()?,
        avail_payload_bw_number: r.be16()?,
    })
}

pub fn parse_allocate_payload_reply(raw: &[u8]) -> ParseResult<AllocatePayloadReply> {
    let mut r = Reader::new(raw)?;
    Ok(AllocatePayloadReply {
        port_number: r.u8()? >> 4,
        vcpi: r.u8()?,
        allocated_pbn: r.be16()?,
    })
}

pub fn parse_remote_i2c_read_reply(raw: &[u8]) -> ParseResult<RemoteI2cReadReply> {
    let mut r = Reader::new(raw)?;
    let port_number = r.u8()? & 0xf;
    let len = r.u8()? as usize;
    Ok(RemoteI2cReadReply {
        port_number,
        bytes: r.bytes(len)?.to_vec(),
    })
}

pub fn parse_nak_reply(raw: &[u8]) -> ParseResult<NakReply> {
    let mut r = Reader::new(raw)?;
    Ok(NakReply {
        guid: r.guid()?,
        reason: r.u8()?,
        nak_data: r.u8()?,
    })
}
