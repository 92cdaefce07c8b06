// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use crate::error::{ErrorKind, Result};
use crate::link::LinkRate;

/// Number of video input streams one controller can drive.
pub const PHY_INPUT_STREAM_MAX: usize = 4;

/// Pixel encoding of one input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelEncoding {
    #[default]
    Rgb,
    YCbCr444,
    YCbCr422,
    YCbCr420,
    YOnly,
}

impl PixelEncoding {
    /// Bytes per pixel used by the payload bandwidth formula, `None` if the
    /// encoding has no formula.
    pub fn pbn_bytes_per_pixel(self) -> Option<u64> {
        match self {
            PixelEncoding::Rgb | PixelEncoding::YCbCr444 => Some(3),
            PixelEncoding::YCbCr422 => Some(2),
            PixelEncoding::YCbCr420 | PixelEncoding::YOnly => None,
        }
    }
}

/// Video parameters of one input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoParams {
    /// Pixel clock in kHz.
    pub pixel_clock_khz: u32,
    pub encoding: PixelEncoding,
}

impl VideoParams {
    pub const fn new(pixel_clock_khz: u32, encoding: PixelEncoding) -> Self {
        Self {
            pixel_clock_khz,
            encoding,
        }
    }
}

/// Represents the configuration of one DPTX controller.
#[derive(Debug, Clone)]
pub struct DptxConfig {
    /// Highest link rate the source is allowed to train at.
    pub max_link_rate: LinkRate,
    /// Highest lane count the source is wired for (1, 2 or 4).
    pub max_lane_count: u8,
    /// Multi-stream transport requested by the platform.
    pub multi_stream: bool,
    /// Number of active input streams.
    pub num_streams: u8,
    /// The attached topology speaks sideband messages, as opposed to a
    /// fixed fan-out hub that only understands the VC payload table.
    pub sideband_msg_supported: bool,
    /// Enable spread spectrum clocking when the sink supports down-spread.
    pub ssc_enable: bool,
    pub streams: [VideoParams; PHY_INPUT_STREAM_MAX],
}

impl Default for DptxConfig {
    fn default() -> Self {
        Self {
            max_link_rate: LinkRate::Hbr2,
            max_lane_count: 4,
            multi_stream: false,
            num_streams: 1,
            sideband_msg_supported: true,
            ssc_enable: true,
            streams: [VideoParams::new(148500, PixelEncoding::Rgb); PHY_INPUT_STREAM_MAX],
        }
    }
}

impl DptxConfig {
    /// Single-stream configuration driving `video` on stream 0.
    pub fn sst(video: VideoParams) -> Self {
        let mut config = Self::default();
        config.streams[0] = video;
        config
    }

    /// Multi-stream configuration driving `videos` on streams 0.. in order.
    pub fn mst(videos: &[VideoParams]) -> Self {
        let mut config = Self {
            multi_stream: true,
            num_streams: videos.len().min(PHY_INPUT_STREAM_MAX) as u8,
            ..Default::default()
        };
        for (slot, video) in config.streams.iter_mut().zip(videos.iter()) {
            *slot = *video;
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.max_lane_count, 1 | 2 | 4) {
            error!("config: unsupported lane count {}", self.max_lane_count);
            return ErrorKind::InvalidParam.into();
        }
        if self.num_streams == 0 || self.num_streams as usize > PHY_INPUT_STREAM_MAX {
            error!("config: unsupported stream count {}", self.num_streams);
            return ErrorKind::InvalidParam.into();
        }
        if !self.multi_stream && self.num_streams != 1 {
            error!("config: {} streams requested without MST", self.num_streams);
            return ErrorKind::InvalidParam.into();
        }
        if let Some(idx) = self.streams[..self.num_streams as usize]
            .iter()
            .position(|v| v.pixel_clock_khz == 0)
        {
            error!("config: stream {} has no pixel clock", idx);
            return ErrorKind::InvalidParam.into();
        }
        Ok(())
    }
}
