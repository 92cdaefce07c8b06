// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

/// Busy-wait provider used by every bounded poll loop.
pub trait Delay {
    /// Sleep for `us` microseconds.
    fn delay_us(&self, us: u32);

    /// Sleep for `ms` milliseconds.
    fn delay_ms(&self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }
}

/// Spins on a free-running microsecond counter supplied by the platform.
pub struct SpinDelay<F: Fn() -> u64> {
    now_us: F,
}

impl<F: Fn() -> u64> SpinDelay<F> {
    pub const fn new(now_us: F) -> Self {
        Self { now_us }
    }

    /// Get current time in microseconds.
    pub fn time_current_us(&self) -> u64 {
        (self.now_us)()
    }
}

impl<F: Fn() -> u64> Delay for SpinDelay<F> {
    fn delay_us(&self, us: u32) {
        let end = self.time_current_us() + us as u64;
        while self.time_current_us() < end {
            core::hint::spin_loop();
        }
    }
}
