// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the RegisterModbusService implementation
//!
//! These tests start a server on an ephemeral port and talk to it with a
//! tokio-modbus client: reading and writing holding registers, exception
//! responses, several clients and the hand-over of controller writes to the
//! register sync bridge.

use std::str::FromStr;
use std::time::Duration;
use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::prelude::*;

use rust_register_bridge::diagnostics::Diagnostics;
use rust_register_bridge::modbus::{serve_tcp, HoldingRegisterStore};
use rust_register_bridge::registers::{
    BoundsPolicy, RegisterSyncBridge, RegisterTable, Transport,
};
use rust_register_bridge::service::ServiceLoop;

/// Test utility function to start a Modbus server in the background
async fn start_test_server(
    store: Arc<HoldingRegisterStore>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>> {
    // Use port 0 to let the OS assign an available port
    let socket_addr = SocketAddr::from_str("127.0.0.1:0")?;
    let listener = TcpListener::bind(socket_addr).await?;
    let socket_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve_tcp(listener, store).await {
            eprintln!("Server error: {}", e);
        }
    });

    // Give the server a moment to start
    time::sleep(Duration::from_millis(50)).await;

    Ok((socket_addr, handle))
}

#[tokio::test]
async fn test_read_holding_registers() -> Result<(), Box<dyn std::error::Error>> {
    let store = HoldingRegisterStore::shared(10);
    store.set_register(0, 10)?;
    store.set_register(3, 40)?;
    let (socket_addr, _server_handle) = start_test_server(store).await?;

    let mut ctx = tcp::connect(socket_addr).await?;
    let data = ctx.read_holding_registers(0, 4).await??;
    assert_eq!(data, vec![10, 0, 0, 40]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_write_single_register() -> Result<(), Box<dyn std::error::Error>> {
    let store = HoldingRegisterStore::shared(10);
    let (socket_addr, _server_handle) = start_test_server(Arc::clone(&store)).await?;

    let mut ctx = tcp::connect(socket_addr).await?;
    ctx.write_single_register(2, 999).await??;

    let data = ctx.read_holding_registers(2, 1).await??;
    assert_eq!(data, vec![999]);
    assert_eq!(store.service()?, vec![2]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_write_multiple_registers() -> Result<(), Box<dyn std::error::Error>> {
    let store = HoldingRegisterStore::shared(10);
    let (socket_addr, _server_handle) = start_test_server(Arc::clone(&store)).await?;

    let mut ctx = tcp::connect(socket_addr).await?;
    ctx.write_multiple_registers(1, &[101, 202, 303]).await??;

    let data = ctx.read_holding_registers(1, 3).await??;
    assert_eq!(data, vec![101, 202, 303]);
    assert_eq!(store.service()?, vec![1, 2, 3]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_register_address() -> Result<(), Box<dyn std::error::Error>> {
    let store = HoldingRegisterStore::shared(10);
    let (socket_addr, _server_handle) = start_test_server(store).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    let result = ctx.read_holding_registers(8, 3).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));

    let result = ctx.write_single_register(10, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_unsupported_function() -> Result<(), Box<dyn std::error::Error>> {
    let store = HoldingRegisterStore::shared(10);
    let (socket_addr, _server_handle) = start_test_server(store).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    let result = ctx.read_coils(0, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalFunction));

    let result = ctx.read_input_registers(0, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalFunction));

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_multiple_clients() -> Result<(), Box<dyn std::error::Error>> {
    let store = HoldingRegisterStore::shared(10);
    let (socket_addr, _server_handle) = start_test_server(store).await?;

    let mut client1 = tcp::connect(socket_addr).await?;
    let mut client2 = tcp::connect(socket_addr).await?;

    client1.write_single_register(5, 888).await??;
    let data = client2.read_holding_registers(5, 1).await??;
    assert_eq!(data, vec![888]);

    client1.disconnect().await?;
    client2.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_controller_write_reaches_the_register_table() -> Result<(), Box<dyn std::error::Error>>
{
    let diagnostics = Diagnostics::shared();
    let store = HoldingRegisterStore::shared(16);
    let transport: Arc<dyn Transport> = store.clone();
    let table = Arc::new(
        RegisterTable::new(16, BoundsPolicy::Ignore, Arc::clone(&diagnostics))
            .with_bridge(RegisterSyncBridge::new(transport, Arc::clone(&diagnostics))),
    );
    let service = ServiceLoop::new(Arc::clone(&table), None);
    let (socket_addr, _server_handle) = start_test_server(store).await?;

    // application writes are visible to the controller
    table.write_text(0, "Hi", 4, false)?;
    let mut ctx = tcp::connect(socket_addr).await?;
    assert_eq!(
        ctx.read_holding_registers(0, 4).await??,
        vec![0x48, 0x69, 0x20, 0x20]
    );

    // controller writes reach the table after a service tick
    ctx.write_multiple_registers(10, &[7, 8]).await??;
    assert_eq!(table.read(10), 0);
    let report = service.tick();
    assert_eq!(report.pulled, 2);
    assert_eq!(table.read_range(10, 2), vec![7, 8]);
    assert_eq!(diagnostics.snapshot().external_writes, 2);

    ctx.disconnect().await?;
    Ok(())
}
