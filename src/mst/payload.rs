// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use crate::config::{VideoParams, PHY_INPUT_STREAM_MAX};
use crate::device::Dptx;
use crate::driver::dpcd::*;
use crate::driver::regs::{vcp_table_reg, CCTL, DPTX_MST_VCP_TABLE_REG_COUNT};
use crate::driver::DptxTransport;
use crate::error::{Error, ErrorKind, Result};
use crate::link::LinkRate;
use crate::mst::{SlotTable, DPTX_MAX_LINK_SLOTS, INVALID_MST_PORT_NUM};
use crate::sideband::{
    build_allocate_payload, build_clear_payload_id_table, build_enum_path_resources, parse_allocate_payload_reply,
    parse_enum_path_resources_reply, SidebandMsgHdr,
};
use crate::utils::Delay;

/// Polls for the sink's VC payload table update, 1ms apart.
pub const MAX_CHECK_DPCD_VCP_UPDATED: u32 = 500;
/// Polls for the ACT trigger to self-clear, 1ms apart.
pub const MAX_CHECK_MST_ACT: u32 = 10;
/// Polls for the sink's ACT handled bit, 2ms apart.
pub const MAX_CHECK_ACT_HANDLED: u32 = 500;

/// Payload bandwidth number of one stream: pixel clock times bytes per pixel,
/// scaled by 64/54 and the 0.6% margin.
///
/// The result is the exact integer ceiling of that product, with no
/// intermediate rounding step.
pub fn calc_pbn(video: &VideoParams) -> Result<u32> {
    let bytes = match video.encoding.pbn_bytes_per_pixel() {
        Some(bytes) => bytes,
        None => {
            error!("payload: no bandwidth formula for {:?}", video.encoding);
            return ErrorKind::InvalidParam.into();
        }
    };
    let pbn = (video.pixel_clock_khz as u64 * bytes * 64 * 1006).div_ceil(54 * 1000 * 1000);
    u32::try_from(pbn).or_else(|_| ErrorKind::InvalidParam.into())
}

/// MTP time slots needed for `pbn` on a `rate` x `lanes` link.
pub fn calc_num_slots(pbn: u32, rate: LinkRate, lanes: u8) -> Result<u32> {
    if !matches!(lanes, 1 | 2 | 4) {
        error!("payload: link has {} lanes", lanes);
        return ErrorKind::InvalidParam.into();
    }
    Ok(pbn.div_ceil(rate.pbn_per_slot_per_lane() * lanes as u32))
}

/// Per-stream bandwidth and the local slot table mirror.
#[derive(Debug, Clone, Default)]
pub struct PayloadState {
    pub pbn: [u32; PHY_INPUT_STREAM_MAX],
    pub num_slots: [u32; PHY_INPUT_STREAM_MAX],
    pub table: SlotTable,
}

impl PayloadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// First slot of `stream`, right after every lower stream.
    pub fn start_slot(&self, stream: usize) -> u32 {
        1 + self.num_slots[..stream].iter().sum::<u32>()
    }
}

fn check_stream(stream: usize) -> Result<()> {
    if stream >= PHY_INPUT_STREAM_MAX {
        error!("payload: stream index {} out of range", stream);
        return ErrorKind::InvalidParam.into();
    }
    Ok(())
}

impl<A: DptxTransport, D: Delay> Dptx<A, D> {
    /// Compute PBN and slot count of `stream` for the current link.
    pub fn get_link_pbn(&mut self, stream: usize) -> Result<()> {
        check_stream(stream)?;
        let pbn = calc_pbn(&self.config.streams[stream])?;
        let slots = calc_num_slots(pbn, self.link.link_rate, self.link.lane_count)?;
        self.payload.pbn[stream] = pbn;
        self.payload.num_slots[stream] = slots;
        debug!("payload: stream {} pbn {} slots {}", stream, pbn, slots);
        Ok(())
    }

    /// Write the slots of `stream` into the local VC payload table.
    pub fn set_link_vcp_tables(&mut self, stream: usize) -> Result<()> {
        check_stream(stream)?;
        let start = self.payload.start_slot(stream) as usize;
        let count = self.payload.num_slots[stream] as usize;
        self.payload.table.fill(start, count, stream as u8 + 1)?;
        for n in SlotTable::regs_spanning(start, count) {
            self.aux.write_reg(vcp_table_reg(n), self.payload.table.reg(n));
        }
        Ok(())
    }

    /// Mirror the slots of `stream` into the sink's payload table.
    pub fn set_sink_vcp_table_slots(&mut self, stream: usize) -> Result<()> {
        check_stream(stream)?;
        let start = self.payload.start_slot(stream);
        let count = self.payload.num_slots[stream];
        if (start + count) as usize > DPTX_MAX_LINK_SLOTS {
            error!("payload: sink slots {}+{} out of range", start, count);
            return ErrorKind::InvalidParam.into();
        }
        self.aux
            .write_dpcd_bytes(DP_PAYLOAD_ALLOCATE_SET, &[stream as u8 + 1, start as u8, count as u8])?;
        self.wait_vcp_table_updated()
    }

    /// Free every slot on both ends of the link.
    pub fn clear_vcp_tables(&mut self) -> Result<()> {
        self.payload.reset();
        for n in 0..DPTX_MST_VCP_TABLE_REG_COUNT {
            self.aux.write_reg(vcp_table_reg(n), 0);
        }
        self.aux
            .write_dpcd_bytes(DP_PAYLOAD_ALLOCATE_SET, &[0, 0, DP_PAYLOAD_CLEAR_ALL_SLOTS])?;
        self.wait_vcp_table_updated()
    }

    fn wait_vcp_table_updated(&mut self) -> Result<()> {
        let mut updated = false;
        for _ in 0..MAX_CHECK_DPCD_VCP_UPDATED {
            if self.aux.read_dpcd(DP_PAYLOAD_TABLE_UPDATE_STATUS)? & DP_PAYLOAD_TABLE_UPDATED != 0 {
                updated = true;
                break;
            }
            self.delay.delay_ms(1);
        }
        if !updated {
            warn!("payload: sink did not report the payload table update");
        }
        self.aux
            .write_dpcd(DP_PAYLOAD_TABLE_UPDATE_STATUS, DP_PAYLOAD_TABLE_UPDATED)?;
        Ok(())
    }

    /// Send the allocation change trigger. A trigger that does not self-clear
    /// is toggled once more before giving up with `MstActTimeout`.
    pub fn initiate_mst_act(&mut self) -> Result<()> {
        let mut cctl = self.read_cctl();
        cctl.modify(CCTL::INITIATE_MST_ACT::SET);
        self.write_cctl(cctl);
        if self.wait_act_cleared() {
            return Ok(());
        }

        warn!("payload: ACT still pending, triggering again");
        let mut cctl = self.read_cctl();
        cctl.modify(CCTL::INITIATE_MST_ACT::CLEAR);
        self.write_cctl(cctl);
        cctl.modify(CCTL::INITIATE_MST_ACT::SET);
        self.write_cctl(cctl);
        if self.wait_act_cleared() {
            return Ok(());
        }
        error!("payload: ACT timeout");
        ErrorKind::MstActTimeout.into()
    }

    fn wait_act_cleared(&mut self) -> bool {
        for _ in 0..MAX_CHECK_MST_ACT {
            self.delay.delay_ms(1);
            if !self.read_cctl().is_set(CCTL::INITIATE_MST_ACT) {
                return true;
            }
        }
        false
    }

    fn wait_act_handled(&mut self) -> Result<()> {
        let mut handled = false;
        for _ in 0..MAX_CHECK_ACT_HANDLED {
            if self.aux.read_dpcd(DP_PAYLOAD_TABLE_UPDATE_STATUS)? & DP_PAYLOAD_ACT_HANDLED != 0 {
                handled = true;
                break;
            }
            self.delay.delay_ms(2);
        }
        if !handled {
            warn!("payload: sink did not report ACT handled");
        }
        self.aux.write_dpcd(
            DP_PAYLOAD_TABLE_UPDATE_STATUS,
            DP_PAYLOAD_TABLE_UPDATED | DP_PAYLOAD_ACT_HANDLED,
        )?;
        Ok(())
    }

    /// Allocate `num_ports` streams on the link: clear both payload tables,
    /// size every stream, fill the local and the sink table, commit with ACT,
    /// then reserve bandwidth along each sink's path when the topology speaks
    /// sideband messages.
    pub fn set_topology_configuration(&mut self, num_ports: u8, sideband_supported: bool) -> Result<()> {
        let streams = num_ports as usize;
        if streams == 0 || streams > PHY_INPUT_STREAM_MAX {
            error!("payload: cannot configure {} streams", num_ports);
            return ErrorKind::InvalidParam.into();
        }
        self.clear_vcp_tables()?;
        for stream in 0..streams {
            self.get_link_pbn(stream)?;
        }
        for stream in 0..streams {
            self.set_link_vcp_tables(stream)?;
        }
        for stream in 0..streams {
            self.set_sink_vcp_table_slots(stream)?;
        }
        self.initiate_mst_act()?;
        self.wait_act_handled()?;

        if sideband_supported {
            for stream in 0..streams {
                self.allocate_stream_path(stream)?;
            }
        }
        info!(
            "payload: {} streams on {:?} x{}, slots {:?}",
            streams,
            self.link.link_rate,
            self.link.lane_count,
            &self.payload.num_slots[..streams]
        );
        Ok(())
    }

    fn allocate_stream_path(&mut self, stream: usize) -> Result<()> {
        let port = self.topology.stream_sink_port[stream];
        if port == INVALID_MST_PORT_NUM {
            debug!("payload: stream {} has no sink port", stream);
            return Ok(());
        }
        let rad_port = self.topology.rad_port[stream];
        let hdr = SidebandMsgHdr::to_branch((rad_port != INVALID_MST_PORT_NUM).then_some(rad_port), true);
        let pbn = self.payload.pbn[stream];

        let reply = self.sideband_request(&hdr, &build_enum_path_resources(port))?;
        let resources = parse_enum_path_resources_reply(&reply)?;
        if (resources.avail_payload_bw_number as u32) < pbn {
            warn!(
                "payload: port {} has pbn {} available, stream {} needs {}",
                port, resources.avail_payload_bw_number, stream, pbn
            );
        }

        let pbn = u16::try_from(pbn).map_err(|_| Error::from(ErrorKind::InvalidParam))?;
        let reply = self.sideband_request(&hdr, &build_allocate_payload(port, stream as u8 + 1, pbn))?;
        let allocated = parse_allocate_payload_reply(&reply)?;
        debug!(
            "payload: port {} vcpi {} allocated pbn {}",
            allocated.port_number, allocated.vcpi, allocated.allocated_pbn
        );
        Ok(())
    }

    /// Broadcast CLEAR_PAYLOAD_ID_TABLE so every branch forgets earlier allocations.
    pub fn clear_payload_id_table(&mut self) -> Result<()> {
        self.sideband_request(&SidebandMsgHdr::broadcast(), &build_clear_payload_id_table())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DptxConfig, PixelEncoding, VideoParams};
    use crate::driver::regs::{vcp_table_reg, DPTX_CCTL};
    use crate::mock::*;
    use crate::sideband::{DP_ALLOCATE_PAYLOAD, DP_CLEAR_PAYLOAD_ID_TABLE, DP_ENUM_PATH_RESOURCES};

    const RGB_1080P: VideoParams = VideoParams::new(148500, PixelEncoding::Rgb);
    const YUV422_1080P: VideoParams = VideoParams::new(148500, PixelEncoding::YCbCr422);
    const RGB_4K: VideoParams = VideoParams::new(594000, PixelEncoding::Rgb);

    fn dptx_with(videos: &[VideoParams], sink: MockSink) -> TestDptx {
        dptx_with_config(DptxConfig::mst(videos), sink)
    }

    #[test]
    fn single_rgb_stream_at_hbr2() {
        init_logger();
        let mut dptx = dptx_with(&[RGB_1080P], MockSink::new());
        dptx.get_link_pbn(0).unwrap();
        assert_eq!(dptx.payload().pbn[0], 532);
        assert_eq!(dptx.payload().num_slots[0], 14);

        dptx.set_link_vcp_tables(0).unwrap();
        let table = &dptx.payload().table;
        assert_eq!(table.get_slot(0), 0);
        assert!((1..=14).all(|slot| table.get_slot(slot) == 1));
        assert_eq!(table.get_slot(15), 0);
        let sink = dptx.transport();
        assert_eq!(sink.reg(vcp_table_reg(0)), 0x1111_1110);
        assert_eq!(sink.reg(vcp_table_reg(1)), 0x0111_1111);
    }

    #[test]
    fn second_422_stream_follows_first() {
        init_logger();
        let mut dptx = dptx_with(&[YUV422_1080P, YUV422_1080P], MockSink::new());
        dptx.get_link_pbn(0).unwrap();
        dptx.get_link_pbn(1).unwrap();
        assert_eq!(dptx.payload().pbn[0], 355);
        assert_eq!(dptx.payload().num_slots[0], 9);
        assert_eq!(dptx.payload().start_slot(1), 1 + dptx.payload().num_slots[0]);

        dptx.set_sink_vcp_table_slots(1).unwrap();
        let sink = dptx.transport();
        assert_eq!(&sink.dpcd[0x1c0..0x1c3], &[2, 10, 9]);
        assert_eq!(sink.dpcd[DP_PAYLOAD_TABLE_UPDATE_STATUS as usize] & DP_PAYLOAD_TABLE_UPDATED, 0);
    }

    #[test]
    fn slot_ranges_are_contiguous_for_every_stream_count() {
        init_logger();
        for n in 1..=4usize {
            let videos = [RGB_1080P, YUV422_1080P, RGB_1080P, YUV422_1080P];
            let mut sink = MockSink::new();
            sink.main_ports = (1..=n as u8).map(sink_port).collect();
            let mut dptx = dptx_with(&videos[..n], sink);
            dptx.get_topology_state().unwrap();
            dptx.set_topology_configuration(n as u8, true).unwrap();

            let payload = dptx.payload();
            let mut next = 1;
            for stream in 0..n {
                assert_eq!(payload.start_slot(stream), next);
                let end = next + payload.num_slots[stream];
                for slot in next..end {
                    assert_eq!(payload.table.get_slot(slot as usize), stream as u8 + 1);
                }
                next = end;
            }
            assert!((next as usize..DPTX_MAX_LINK_SLOTS).all(|slot| payload.table.get_slot(slot) == 0));
        }
    }

    #[test]
    fn pbn_grows_with_clock_and_422_is_cheaper() {
        let mut last = 0;
        for clock in (25_000..=600_000).step_by(12_345) {
            let rgb = calc_pbn(&VideoParams::new(clock, PixelEncoding::Rgb)).unwrap();
            let yuv444 = calc_pbn(&VideoParams::new(clock, PixelEncoding::YCbCr444)).unwrap();
            let yuv422 = calc_pbn(&VideoParams::new(clock, PixelEncoding::YCbCr422)).unwrap();
            assert!(rgb >= last);
            assert_eq!(rgb, yuv444);
            assert!(yuv422 <= rgb);
            last = rgb;
        }
    }

    #[test]
    fn encodings_without_formula_are_rejected() {
        let video = VideoParams::new(148500, PixelEncoding::YCbCr420);
        assert_eq!(calc_pbn(&video).unwrap_err().kind(), ErrorKind::InvalidParam);
        assert_eq!(calc_num_slots(532, LinkRate::Hbr2, 0).unwrap_err().kind(), ErrorKind::InvalidParam);
    }

    #[test]
    fn slots_per_rate() {
        assert_eq!(calc_num_slots(532, LinkRate::Hbr2, 4).unwrap(), 14);
        assert_eq!(calc_num_slots(532, LinkRate::Rbr, 1).unwrap(), 178);
        assert_eq!(calc_num_slots(532, LinkRate::Hbr3, 4).unwrap(), 9);
        assert_eq!(calc_num_slots(2125, LinkRate::Hbr2, 4).unwrap(), 54);
    }

    #[test]
    fn overflowing_slot_range_is_rejected() {
        init_logger();
        let mut dptx = dptx_with(&[RGB_4K, RGB_4K], MockSink::new());
        for stream in 0..2 {
            dptx.get_link_pbn(stream).unwrap();
        }
        dptx.set_link_vcp_tables(0).unwrap();
        let err = dptx.set_link_vcp_tables(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
        assert_eq!(dptx.set_sink_vcp_table_slots(1).unwrap_err().kind(), ErrorKind::InvalidParam);

        // one stream too wide for a single-lane RBR link
        let mut dptx = dptx_with(&[RGB_1080P], MockSink::new());
        dptx.link.link_rate = LinkRate::Rbr;
        dptx.link.lane_count = 1;
        dptx.get_link_pbn(0).unwrap();
        assert_eq!(dptx.set_link_vcp_tables(0).unwrap_err().kind(), ErrorKind::InvalidParam);
        assert_eq!(dptx.set_link_vcp_tables(4).unwrap_err().kind(), ErrorKind::InvalidParam);
    }

    #[test]
    fn clear_twice_equals_clear_once() {
        init_logger();
        let mut dptx = dptx_with(&[RGB_1080P, RGB_1080P], MockSink::new());
        for stream in 0..2 {
            dptx.get_link_pbn(stream).unwrap();
            dptx.set_link_vcp_tables(stream).unwrap();
            dptx.set_sink_vcp_table_slots(stream).unwrap();
        }
        dptx.clear_vcp_tables().unwrap();
        let once = (dptx.transport().snapshot(), dptx.payload().table);
        dptx.clear_vcp_tables().unwrap();
        let twice = (dptx.transport().snapshot(), dptx.payload().table);
        assert_eq!(once, twice);
        assert_eq!(&dptx.transport().dpcd[0x1c0..0x1c3], &[0, 0, 0x3f]);
        assert!((0..8).all(|n| dptx.transport().reg(vcp_table_reg(n)) == 0));
    }

    #[test]
    fn unacknowledged_table_update_is_not_fatal() {
        init_logger();
        let mut sink = MockSink::new();
        sink.vcp_ack = false;
        let mut dptx = dptx_with(&[RGB_1080P], sink);
        dptx.clear_vcp_tables().unwrap();
        assert_eq!(dptx.delay().total_us(), MAX_CHECK_DPCD_VCP_UPDATED as u64 * 1000);
    }

    #[test]
    fn stuck_act_is_retriggered_once() {
        init_logger();
        let mut sink = MockSink::new();
        sink.act_stuck = true;
        let mut dptx = dptx_with(&[RGB_1080P], sink);
        let err = dptx.initiate_mst_act().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MstActTimeout);
        assert_eq!(err.kind().errno(), 1001);
        assert_eq!(dptx.transport().act_triggers, 2);
        assert_eq!(dptx.delay().total_us(), 2 * MAX_CHECK_MST_ACT as u64 * 1000);
    }

    #[test]
    fn act_self_clears() {
        init_logger();
        let mut dptx = dptx_with(&[RGB_1080P], MockSink::new());
        dptx.initiate_mst_act().unwrap();
        assert_eq!(dptx.transport().act_triggers, 1);
        assert_eq!(dptx.transport().reg(DPTX_CCTL) & (1 << 28), 0);
    }

    #[test]
    fn topology_configuration_fails_on_act_timeout() {
        init_logger();
        let mut sink = MockSink::new();
        sink.act_stuck = true;
        sink.main_ports = alloc::vec![sink_port(1)];
        let mut dptx = dptx_with(&[RGB_1080P], sink);
        dptx.get_topology_state().unwrap();
        let err = dptx.set_topology_configuration(1, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MstActTimeout);
        assert!(dptx.transport().requests_of(DP_ALLOCATE_PAYLOAD).is_empty());
    }

    #[test]
    fn act_handled_is_acknowledged() {
        init_logger();
        let mut sink = MockSink::new();
        sink.main_ports = alloc::vec![sink_port(1)];
        let mut dptx = dptx_with(&[RGB_1080P], sink);
        dptx.get_topology_state().unwrap();
        dptx.set_topology_configuration(1, true).unwrap();
        assert_eq!(dptx.transport().dpcd[DP_PAYLOAD_TABLE_UPDATE_STATUS as usize], 0);
    }

    #[test]
    fn unhandled_act_is_not_fatal() {
        init_logger();
        let mut sink = MockSink::new();
        sink.act_handled_ack = false;
        let mut dptx = dptx_with(&[RGB_1080P], sink);
        dptx.set_topology_configuration(1, false).unwrap();
        assert!(dptx.delay().total_us() >= MAX_CHECK_ACT_HANDLED as u64 * 2000);
        assert_eq!(
            dptx.transport().status_writes.last(),
            Some(&(DP_PAYLOAD_TABLE_UPDATED | DP_PAYLOAD_ACT_HANDLED))
        );
    }

    #[test]
    fn paths_are_allocated_through_rad() {
        init_logger();
        let mut sink = MockSink::new();
        sink.main_ports = alloc::vec![sink_port(1), branch_port(8)];
        sink.sub_ports.insert(8, alloc::vec![sink_port(2)]);
        let mut dptx = dptx_with(&[RGB_1080P, YUV422_1080P], sink);
        assert_eq!(dptx.get_topology_state().unwrap(), 2);
        dptx.set_topology_configuration(2, true).unwrap();

        let sink = dptx.transport();
        let enums = sink.requests_of(DP_ENUM_PATH_RESOURCES);
        assert_eq!(enums.len(), 2);
        assert_eq!(enums[0].0.lct, 1);
        assert_eq!((enums[1].0.lct, enums[1].0.rad[0]), (2, 0x80));
        let allocs = sink.requests_of(DP_ALLOCATE_PAYLOAD);
        assert_eq!(allocs[0].1, [0x11, 0x10, 1, 0x02, 0x14]);
        assert_eq!(allocs[1].1, [0x11, 0x20, 2, 0x01, 0x63]);
        assert!(allocs.iter().all(|(hdr, _)| hdr.path_msg));
    }

    #[test]
    fn fixed_fanout_skips_sideband() {
        init_logger();
        let mut dptx = dptx_with(&[RGB_1080P, RGB_1080P], MockSink::new());
        dptx.set_topology_configuration(2, false).unwrap();
        assert!(dptx.transport().down_requests.is_empty());
        assert_eq!(dptx.payload().start_slot(1), 15);
    }

    #[test]
    fn clear_payload_id_table_is_broadcast() {
        init_logger();
        let mut dptx = dptx_with(&[RGB_1080P], MockSink::new());
        dptx.clear_payload_id_table().unwrap();
        let sink = dptx.transport();
        let reqs = sink.requests_of(DP_CLEAR_PAYLOAD_ID_TABLE);
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].0.broadcast && reqs[0].0.path_msg);
        assert_eq!(reqs[0].0.lcr, 6);
    }
}
