// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Transport-side holding register storage
//!
//! This is the register copy the Modbus server answers from. The application
//! never writes it directly: values arrive through the
//! [`RegisterSyncBridge`](crate::registers::RegisterSyncBridge), and writes made
//! by the controller are remembered until the service loop collects them.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error};
use tokio_modbus::prelude::ExceptionCode;

use crate::registers::{SyncError, Transport};

#[derive(Debug)]
struct StoreInner {
    registers: Vec<u16>,
    written: BTreeSet<u16>,
}

/// Holding registers as seen by the Modbus controller
#[derive(Debug)]
pub struct HoldingRegisterStore {
    inner: Mutex<StoreInner>,
}

impl HoldingRegisterStore {
    /// Create a store of `count` registers, all zero
    pub fn new(count: u16) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                registers: vec![0; usize::from(count)],
                written: BTreeSet::new(),
            }),
        }
    }

    pub fn shared(count: u16) -> Arc<Self> {
        Arc::new(Self::new(count))
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, SyncError> {
        self.inner.lock().map_err(|_| SyncError::Poisoned)
    }

    /// Serve a controller read of `cnt` registers starting at `addr`
    ///
    /// The whole request must fit, Modbus has no notion of a partial read.
    pub fn read_holding(&self, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        let inner = self.lock().map_err(|_| ExceptionCode::ServerDeviceFailure)?;
        let range = checked_range(inner.registers.len(), addr, usize::from(cnt))?;
        debug!("Successfully read {} registers from address {}", cnt, addr);
        Ok(inner.registers[range].to_vec())
    }

    /// Serve a controller write of consecutive registers starting at `addr`
    ///
    /// The written addresses are recorded for the next [`Transport::service`].
    pub fn write_holding(&self, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        let mut inner = self.lock().map_err(|_| ExceptionCode::ServerDeviceFailure)?;
        let range = checked_range(inner.registers.len(), addr, values.len())?;
        inner.registers[range.clone()].copy_from_slice(values);
        inner.written.extend(range.map(|index| index as u16));
        debug!(
            "Controller wrote {} registers starting at address {}",
            values.len(),
            addr
        );
        Ok(())
    }
}

/// Translate a Modbus request into a slice range, or the matching exception
fn checked_range(
    len: usize,
    addr: u16,
    cnt: usize,
) -> Result<std::ops::Range<usize>, ExceptionCode> {
    if cnt == 0 {
        error!("Exception::IllegalDataValue - Empty register request at {}", addr);
        return Err(ExceptionCode::IllegalDataValue);
    }
    let start = usize::from(addr);
    let end = start + cnt;
    if end > len {
        error!(
            "Exception::IllegalDataAddress - Registers {}..{} outside of {} holding registers",
            start, end, len
        );
        return Err(ExceptionCode::IllegalDataAddress);
    }
    Ok(start..end)
}

impl Transport for HoldingRegisterStore {
    fn register_count(&self) -> u16 {
        self.lock()
            .map(|inner| inner.registers.len() as u16)
            .unwrap_or(0)
    }

    fn get_register(&self, index: u16) -> Result<u16, SyncError> {
        let inner = self.lock()?;
        inner
            .registers
            .get(usize::from(index))
            .copied()
            .ok_or(SyncError::OutOfRange {
                index,
                count: inner.registers.len() as u16,
            })
    }

    fn set_register(&self, index: u16, value: u16) -> Result<(), SyncError> {
        let mut inner = self.lock()?;
        let count = inner.registers.len() as u16;
        match inner.registers.get_mut(usize::from(index)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(SyncError::OutOfRange { index, count }),
        }
    }

    fn take_register(&self, index: u16) -> Result<u16, SyncError> {
        let mut inner = self.lock()?;
        let count = inner.registers.len() as u16;
        inner
            .registers
            .get_mut(usize::from(index))
            .map(std::mem::take)
            .ok_or(SyncError::OutOfRange { index, count })
    }

    fn service(&self) -> Result<Vec<u16>, SyncError> {
        let mut inner = self.lock()?;
        Ok(std::mem::take(&mut inner.written).into_iter().collect())
    }
}
