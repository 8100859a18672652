// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Controller writes and application writes meeting in the service loop
//!
//! The transport below forwards to a real holding register store but lets a
//! test act at the exact moment the service loop reads a register back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rust_register_bridge::diagnostics::Diagnostics;
use rust_register_bridge::modbus::HoldingRegisterStore;
use rust_register_bridge::registers::{
    BoundsPolicy, RegisterSyncBridge, RegisterTable, SyncError, Transport,
};
use rust_register_bridge::service::{ControllerCommand, ServiceLoop};

type Hook = Box<dyn FnOnce(&HoldingRegisterStore) + Send>;

/// Holding register store that runs a hook once, right after a `get_register`
struct HookedStore {
    store: Arc<HoldingRegisterStore>,
    on_get: Mutex<Option<Hook>>,
}

impl HookedStore {
    fn arm(&self, hook: Hook) {
        *self.on_get.lock().unwrap() = Some(hook);
    }
}

impl Transport for HookedStore {
    fn register_count(&self) -> u16 {
        self.store.register_count()
    }

    fn get_register(&self, index: u16) -> Result<u16, SyncError> {
        let value = self.store.get_register(index)?;
        let hook = self.on_get.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.store);
        }
        Ok(value)
    }

    fn set_register(&self, index: u16, value: u16) -> Result<(), SyncError> {
        self.store.set_register(index, value)
    }

    fn take_register(&self, index: u16) -> Result<u16, SyncError> {
        self.store.take_register(index)
    }

    fn service(&self) -> Result<Vec<u16>, SyncError> {
        self.store.service()
    }
}

fn hooked_table(len: u16) -> (Arc<RegisterTable>, Arc<HookedStore>) {
    let diagnostics = Diagnostics::shared();
    let hooked = Arc::new(HookedStore {
        store: HoldingRegisterStore::shared(len),
        on_get: Mutex::new(None),
    });
    let transport: Arc<dyn Transport> = hooked.clone();
    let table = RegisterTable::new(usize::from(len), BoundsPolicy::Ignore, Arc::clone(&diagnostics))
        .with_bridge(RegisterSyncBridge::new(transport, diagnostics));
    (Arc::new(table), hooked)
}

#[test]
fn test_application_write_during_pull_keeps_both_copies_equal() {
    let (table, hooked) = hooked_table(8);
    hooked.store.write_holding(0, &[0x1111]).unwrap();

    // the application writes the same register while the service loop is
    // between reading the transport and updating the table
    let weak = Arc::downgrade(&table);
    let writer: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::new(Mutex::new(None));
    let started = Arc::new(AtomicBool::new(false));
    {
        let writer = Arc::clone(&writer);
        let started = Arc::clone(&started);
        hooked.arm(Box::new(move |_store| {
            let table = weak.upgrade().unwrap();
            let started_in_thread = Arc::clone(&started);
            let handle = thread::spawn(move || {
                started_in_thread.store(true, Ordering::SeqCst);
                table.write(0, 0xAAAA).unwrap();
            });
            while !started.load(Ordering::SeqCst) {
                thread::yield_now();
            }
            // leave the writer time to reach the table
            thread::sleep(Duration::from_millis(50));
            *writer.lock().unwrap() = Some(handle);
        }));
    }

    let service = ServiceLoop::new(Arc::clone(&table), None);
    let report = service.tick();
    assert_eq!(report.pulled, 1);
    writer.lock().unwrap().take().unwrap().join().unwrap();

    let bridge = table.bridge().unwrap();
    assert_eq!(table.read(0), 0xAAAA);
    assert_eq!(hooked.store.get_register(0).unwrap(), table.read(0));
    assert!(!bridge.needs_resync());

    // nothing left for the next tick to repair
    let report = service.tick();
    assert_eq!(report.pulled, 0);
    assert_eq!(hooked.store.read_holding(0, 8).unwrap(), table.snapshot());
}

#[test]
fn test_controller_command_after_pull_is_not_lost() {
    let (table, hooked) = hooked_table(8);
    let (sink, mut commands) = tokio::sync::mpsc::channel(4);
    let service = ServiceLoop::new(Arc::clone(&table), Some(3)).with_command_sink(sink);

    hooked.store.write_holding(3, &[0b001]).unwrap();
    // the controller posts new bits once the service loop has read the register
    hooked.arm(Box::new(|store| {
        store.write_holding(3, &[0b100]).unwrap();
    }));

    let report = service.tick();
    assert_eq!(
        report.command,
        Some(ControllerCommand {
            register: 3,
            bits: 0b100
        })
    );
    assert_eq!(commands.try_recv().unwrap().bits, 0b100);
    assert_eq!(table.read(3), 0);
    assert_eq!(hooked.store.get_register(3).unwrap(), 0);

    // the late write is still journaled and pulls back the cleared value
    let report = service.tick();
    assert_eq!(report.command, None);
    assert_eq!(hooked.store.read_holding(0, 8).unwrap(), table.snapshot());
}
