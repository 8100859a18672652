// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server implementation for the register bridge
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! The Modbus master is the device that requests data, while the Modbus slave is the device
//! that provides data. In other words, the Modbus master is here the client and the
//! Modbus slave is here the server.
//!
//! ## Supported function codes
//!
//! | Code | Function | Notes |
//! |------|----------|-------|
//! | 0x03 | Read Holding Registers | whole range must exist |
//! | 0x06 | Write Single Register | recorded for the service loop |
//! | 0x10 | Write Multiple Registers | recorded for the service loop |
//!
//! Any other function code is answered with `IllegalFunction`.

use std::{future, io, net::SocketAddr, sync::Arc};

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use super::store::HoldingRegisterStore;

/// Modbus request handler answering from a [`HoldingRegisterStore`]
///
/// One instance is created per client connection; all of them share the same
/// store, so a value written by one client is immediately visible to others.
pub struct RegisterModbusService {
    store: Arc<HoldingRegisterStore>,
}

impl RegisterModbusService {
    pub fn new(store: Arc<HoldingRegisterStore>) -> Self {
        Self { store }
    }
}

impl tokio_modbus::server::Service for RegisterModbusService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => self
                .store
                .read_holding(addr, cnt)
                .map(Response::ReadHoldingRegisters),
            Request::WriteMultipleRegisters(addr, values) => self
                .store
                .write_holding(addr, &values)
                .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16)),
            Request::WriteSingleRegister(addr, value) => self
                .store
                .write_holding(addr, std::slice::from_ref(&value))
                .map(|_| Response::WriteSingleRegister(addr, value)),
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            error!("Modbus request error: {:?}", e);
        }

        future::ready(res)
    }
}

/// Serve Modbus TCP requests on `listener` until the task is aborted
///
/// Every accepted connection gets its own [`RegisterModbusService`] sharing
/// `store`.
pub async fn serve_tcp(listener: TcpListener, store: Arc<HoldingRegisterStore>) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Modbus server listening on {}", addr);
    }
    let server = Server::new(listener);

    let on_connected = move |stream, socket_addr: SocketAddr| {
        let store = Arc::clone(&store);
        debug!("Modbus client connected from {}", socket_addr);
        async move {
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(RegisterModbusService::new(Arc::clone(&store))))
            })
        }
    };

    let on_process_error = |err| {
        error!("Modbus server error: {err}");
    };

    server.serve(&on_connected, on_process_error).await
}
