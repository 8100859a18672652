// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Command line Modbus client for the register bridge
//!
//! Reads holding registers, renders them as text when asked to, and can post
//! command bits the way a controller would.

use std::error::Error;
use std::net::SocketAddr;

use clap::Parser;
use tokio::time::{timeout, Duration};
use tokio_modbus::prelude::*;

use rust_register_bridge::registers::registers_to_string;

/// Modbus client for reading the holding registers of a register bridge
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "502")]
    port: u16,

    /// Starting holding register address
    #[clap(long, default_value = "0")]
    register: u16,

    /// Number of registers to read
    #[clap(long, default_value = "50")]
    quantity: u16,

    /// Render the registers as a text field
    #[clap(long)]
    text: bool,

    /// Write this value to `register` before reading (e.g. command bits)
    #[clap(long)]
    write: Option<u16>,

    /// Request timeout in milliseconds
    #[clap(long, default_value = "1000")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let request_timeout = Duration::from_millis(args.timeout_ms);

    let socket_addr: SocketAddr = tokio::net::lookup_host((args.address.as_str(), args.port))
        .await?
        .next()
        .ok_or_else(|| format!("Cannot resolve {}:{}", args.address, args.port))?;
    println!("Connecting to Modbus server at {}", socket_addr);

    let mut ctx = tcp::connect_slave(socket_addr, Slave(1)).await?;

    if let Some(value) = args.write {
        println!("Writing {:#06x} to holding register {}", value, args.register);
        timeout(
            request_timeout,
            ctx.write_single_register(args.register, value),
        )
        .await???;
    }

    println!(
        "Reading {} holding registers starting at address {}",
        args.quantity, args.register
    );
    let response = timeout(
        request_timeout,
        ctx.read_holding_registers(args.register, args.quantity),
    )
    .await???;

    if args.text {
        println!("Text: {:?}", registers_to_string(&response));
    } else {
        for (i, value) in response.iter().enumerate() {
            println!(
                "Register {}: {:#06x} ({})",
                usize::from(args.register) + i,
                value,
                value
            );
        }
    }

    ctx.disconnect().await?;
    Ok(())
}
