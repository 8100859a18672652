// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register table behaviour seen from the outside: bounds handling, text
//! blocks, transport mirroring and recovery from failed pushes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mockall::mock;
use rust_register_bridge::diagnostics::Diagnostics;
use rust_register_bridge::modbus::HoldingRegisterStore;
use rust_register_bridge::registers::{
    registers_to_string, BoundsPolicy, RegisterError, RegisterSyncBridge, RegisterTable,
    SyncError, Transport,
};
use rust_register_bridge::service::ServiceLoop;

mock! {
    pub Transport {}

    impl Transport for Transport {
        fn register_count(&self) -> u16;
        fn get_register(&self, index: u16) -> Result<u16, SyncError>;
        fn set_register(&self, index: u16, value: u16) -> Result<(), SyncError>;
        fn service(&self) -> Result<Vec<u16>, SyncError>;
    }
}

fn mirrored_table(len: u16) -> (Arc<RegisterTable>, Arc<HoldingRegisterStore>) {
    let diagnostics = Diagnostics::shared();
    let store = HoldingRegisterStore::shared(len);
    let transport: Arc<dyn Transport> = store.clone();
    let table = RegisterTable::new(usize::from(len), BoundsPolicy::Ignore, Arc::clone(&diagnostics))
        .with_bridge(RegisterSyncBridge::new(transport, diagnostics));
    (Arc::new(table), store)
}

#[test]
fn test_write_then_read() {
    let (table, store) = mirrored_table(170);
    assert_eq!(table.write(60, 12).unwrap(), 1);
    assert_eq!(table.read(60), 12);
    assert_eq!(store.get_register(60).unwrap(), 12);
}

#[test]
fn test_every_value_reads_back() {
    let table = RegisterTable::new(170, BoundsPolicy::Ignore, Diagnostics::shared());
    for value in 0..=u16::MAX {
        table.write(169, value).unwrap();
        assert_eq!(table.read(169), value);
    }
}

#[test]
fn test_range_inside_the_table_reads_back() {
    let (table, store) = mirrored_table(170);
    let values: Vec<u16> = (0..40).map(|i| 0x1000 + i).collect();
    assert_eq!(table.write_range(100, &values).unwrap(), 40);
    assert_eq!(table.read_range(100, 40), values);
    assert_eq!(store.read_holding(100, 40).unwrap(), values);
}

#[test]
fn test_out_of_range_access_is_a_no_op() {
    let (table, _store) = mirrored_table(170);
    let before = table.snapshot();

    assert_eq!(table.read(170), 0);
    assert_eq!(table.write(170, 5).unwrap(), 0);
    assert_eq!(table.snapshot(), before);
    assert!(table.try_read(170).is_err());
    assert!(table.try_write(170, 5).is_err());
    assert_eq!(table.diagnostics().snapshot().out_of_range, 4);
}

#[test]
fn test_range_is_clipped_under_ignore_policy() {
    let (table, store) = mirrored_table(170);
    assert_eq!(table.write_range(168, &[1, 2, 3, 4]).unwrap(), 2);
    assert_eq!(table.read_range(168, 4), vec![1, 2]);
    assert_eq!(store.read_holding(168, 2).unwrap(), vec![1, 2]);
}

#[test]
fn test_range_is_refused_under_report_policy() {
    let table = RegisterTable::new(170, BoundsPolicy::Report, Diagnostics::shared());
    assert_eq!(
        table.write_range(168, &[1, 2, 3, 4]),
        Err(RegisterError::OutOfRange {
            start: 168,
            end: 172,
            len: 170
        })
    );
    assert_eq!(table.read_range(168, 2), vec![0, 0]);
}

#[test]
fn test_centered_text_block() {
    let (table, store) = mirrored_table(170);
    table.write_text(0, "AB", 5, true).unwrap();

    let expected = vec![0x20, 0x41, 0x42, 0x20, 0x20];
    assert_eq!(table.read_range(0, 5), expected);
    assert_eq!(store.read_holding(0, 5).unwrap(), expected);
    assert_eq!(registers_to_string(&table.read_range(0, 5)), "AB");
}

#[test]
fn test_text_block_with_accents_and_malformed_bytes() {
    let (table, _store) = mirrored_table(170);
    table
        .write_text(50, b"Caf\xC3\xA9 \xFF\xE2\x82\xAC".as_slice(), 8, false)
        .unwrap();

    assert_eq!(
        table.read_range(50, 8),
        vec![0x43, 0x61, 0x66, 0xE9, 0x20, 0x20AC, 0x20, 0x20]
    );
    assert_eq!(table.diagnostics().snapshot().malformed_bytes, 1);
}

#[test]
fn test_long_text_is_truncated_to_the_field() {
    let (table, _store) = mirrored_table(170);
    table.write_text(0, "ABCDEFGHIJ", 4, true).unwrap();
    assert_eq!(table.read_range(0, 5), vec![0x41, 0x42, 0x43, 0x44, 0]);
}

#[test]
fn test_failed_push_is_repaired_by_the_service_loop() {
    let failing = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&failing);

    let mut transport = MockTransport::new();
    transport.expect_register_count().return_const(4u16);
    transport.expect_set_register().returning(move |index, _| {
        if index == 2 && flag.load(Ordering::SeqCst) {
            Err(SyncError::Unavailable {
                reason: "bus busy".to_string(),
            })
        } else {
            Ok(())
        }
    });
    transport.expect_service().returning(|| Ok(Vec::new()));

    let diagnostics = Diagnostics::shared();
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let table = Arc::new(
        RegisterTable::new(4, BoundsPolicy::Ignore, Arc::clone(&diagnostics))
            .with_bridge(RegisterSyncBridge::new(transport, Arc::clone(&diagnostics))),
    );
    let bridge = table.bridge().unwrap();
    assert!(!bridge.needs_resync());

    // the table keeps the value even though the transport refused it
    failing.store(true, Ordering::SeqCst);
    assert_eq!(table.write(2, 99).unwrap(), 1);
    assert_eq!(table.read(2), 99);
    assert!(bridge.needs_resync());
    assert_eq!(diagnostics.snapshot().sync_failures, 1);

    // a tick while the transport still fails keeps the flag set
    let service = ServiceLoop::new(Arc::clone(&table), None);
    assert!(!service.tick().resynced);
    assert!(bridge.needs_resync());

    failing.store(false, Ordering::SeqCst);
    assert!(service.tick().resynced);
    assert!(!bridge.needs_resync());
}

#[test]
fn test_transport_errors_during_service_are_counted() {
    let mut transport = MockTransport::new();
    transport.expect_register_count().return_const(2u16);
    transport.expect_set_register().returning(|_, _| Ok(()));
    transport
        .expect_service()
        .times(1)
        .returning(|| Ok(vec![0, 1]));
    transport
        .expect_get_register()
        .returning(|index| match index {
            0 => Ok(0x55),
            _ => Err(SyncError::Poisoned),
        });

    let diagnostics = Diagnostics::shared();
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let table = Arc::new(
        RegisterTable::new(2, BoundsPolicy::Ignore, Arc::clone(&diagnostics))
            .with_bridge(RegisterSyncBridge::new(transport, Arc::clone(&diagnostics))),
    );

    let report = ServiceLoop::new(Arc::clone(&table), None).tick();
    assert_eq!(report.pulled, 1);
    assert_eq!(table.snapshot(), vec![0x55, 0]);
    let snapshot = diagnostics.snapshot();
    assert_eq!(snapshot.sync_failures, 1);
    assert_eq!(snapshot.external_writes, 1);
}

#[test]
fn test_smaller_transport_mirrors_the_low_registers() {
    let diagnostics = Diagnostics::shared();
    let store = HoldingRegisterStore::shared(4);
    let transport: Arc<dyn Transport> = store.clone();
    let table = RegisterTable::new(6, BoundsPolicy::Ignore, Arc::clone(&diagnostics))
        .with_bridge(RegisterSyncBridge::new(transport, Arc::clone(&diagnostics)));

    table.write(1, 11).unwrap();
    assert_eq!(store.get_register(1).unwrap(), 11);

    // registers the transport cannot hold stay in the table only
    table.write(5, 55).unwrap();
    assert_eq!(table.read(5), 55);
    table.write_range(2, &[7, 8, 9, 10]).unwrap();
    assert_eq!(store.read_holding(0, 4).unwrap(), vec![0, 11, 7, 8]);
    assert_eq!(table.read_range(2, 4), vec![7, 8, 9, 10]);
    assert!(!table.bridge().unwrap().needs_resync());
    assert_eq!(diagnostics.snapshot().sync_failures, 0);
    assert!(!diagnostics.snapshot().has_faults());

    // the command register above the transport is taken from the table
    assert_eq!(table.take(5), 55);
    assert_eq!(table.read(5), 0);

    assert!(table.resync_all().is_ok());
    assert!(!table.bridge().unwrap().needs_resync());
}
