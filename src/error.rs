// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Defines the error type for the DPTX engine.

use alloc::boxed::Box;
use core::error::Error as CoreError;
use core::fmt;
use core::result::Result as CoreResult;

use crate::driver::AuxError;
use crate::sideband::ParseError;

/// Driver-private code reported to the kernel glue when the allocation change trigger stalls.
pub const DPTX_RETURN_MST_ACT_TIMEOUT: i32 = 1001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorKind {
    /// AUX/DPCD read or write failed.
    AuxTransport,
    /// No down-reply became ready within the poll budget.
    SidebandTimeout,
    /// Down-reply kept echoing another request id after every retry.
    SidebandRequestMismatch,
    /// Reply-ready bit could not be cleared after a completed exchange.
    SidebandBusy,
    /// Branch device answered with a NAK.
    SidebandNak,
    /// Sideband bytes failed header/body CRC or were truncated.
    Malformed,
    InvalidParam,
    /// Allocation change trigger did not self-clear, even after one re-toggle.
    MstActTimeout,
    TrainingFailed,
    NotConnected,
    AlreadyExists,
}

impl ErrorKind {
    /// Integer code handed back to the kernel side (`errno` or driver-private).
    pub fn errno(self) -> i32 {
        match self {
            ErrorKind::AuxTransport | ErrorKind::SidebandNak | ErrorKind::TrainingFailed => 5, // EIO
            ErrorKind::SidebandTimeout => 19,                                                  // ENODEV
            ErrorKind::SidebandRequestMismatch | ErrorKind::SidebandBusy => 16,                // EBUSY
            ErrorKind::AlreadyExists => 17,                                                    // EEXIST
            ErrorKind::InvalidParam => 22,                                                     // EINVAL
            ErrorKind::Malformed => 71,                                                        // EPROTO
            ErrorKind::NotConnected => 107,                                                    // ENOTCONN
            ErrorKind::MstActTimeout => DPTX_RETURN_MST_ACT_TIMEOUT,
        }
    }
}

type DynError = dyn CoreError + Send + Sync;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    inner: Option<Box<DynError>>,
}

pub type Result<T> = CoreResult<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> CoreResult<(), fmt::Error> {
        match &self.inner {
            Some(inner) => write!(f, "{:?}: {}", self.kind, inner),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl Error {
    pub fn new(kind: ErrorKind, inner: Box<DynError>) -> Self {
        Self {
            kind,
            inner: Some(inner),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn into_inner(self) -> Option<Box<DynError>> {
        self.inner
    }
}

impl ErrorKind {
    pub fn wrap(self, inner: Box<DynError>) -> Error {
        Error::new(self, inner)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, inner: None }
    }
}

impl<T> From<ErrorKind> for Result<T> {
    fn from(val: ErrorKind) -> Self {
        Err(val.into())
    }
}

impl From<AuxError> for Error {
    fn from(e: AuxError) -> Self {
        ErrorKind::AuxTransport.wrap(Box::new(e))
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        ErrorKind::Malformed.wrap(Box::new(e))
    }
}
