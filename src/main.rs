use std::{
    net::IpAddr,
    sync::Arc,
    time::Duration,
};

use actix::prelude::*;
use bytes::Bytes;
use eyre::Result;
use message::Rop;
use packed_struct::PackedStructSlice;
use runtime::{
    confman::ConfirmationConfig,
    node::{
        AddRegular,
        LoadOccasional,
        ProxyReply,
    },
    nv::NvAccess,
    proxy::ProxyConfig,
    Node,
    NvSet,
    SystemClock,
    Transceiver,
    TransceiverConfig,
    LOCALHOST,
};
use structopt::StructOpt as _;
use tokio::{
    net::UdpSocket,
    sync::mpsc,
};
use util::Timeout;

use crate::{
    endpoints::{
        Config,
        Setpoint,
        CONFIG,
        SETPOINT,
        STATUS,
    },
    options::{
        Options,
        Role,
    },
};

mod endpoints;
mod options;
mod trace;

const BOARD_NUMBER: u8 = 1;

#[actix::main]
async fn main() -> Result<()> {
    util::bootstrap!("starting {} {}", util::PACKAGE, util::VERSION);

    let options = Options::from_args();
    trace::init(options.pretty)?;

    let remote = match options.remote.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(ip) => eyre::bail!("ipv6 peer {ip} is not supported"),
    };

    tracing::info!(role = ?options.role, bind = %options.bind, remote = %options.remote, "tracing subsystem initialized");

    let (asks_tx, asks_rx) = mpsc::unbounded_channel();

    let mut nvset = NvSet::new();
    let mut config = TransceiverConfig {
        confirmation: ConfirmationConfig::enabled()
            .on_requested(|to, rop| tracing::debug!(%to, %rop, "confirmation requested"))
            .on_received(|from, rop| tracing::info!(%from, %rop, "confirmation received")),
        ..TransceiverConfig::new(remote)
    }
    .on_sequence_error(|from, continuity| tracing::debug!(%from, ?continuity, "sequence anomaly"));

    match options.role {
        Role::Board => {
            nvset.load_board(LOCALHOST, &endpoints::board(BOARD_NUMBER, Some(asks_tx)), Timeout::Infinite)?;
            config.proxy = ProxyConfig::enabled();
        },
        Role::Host => {
            nvset.load_board(remote, &endpoints::board(BOARD_NUMBER, None), Timeout::Infinite)?;
            nvset.set_on_say(
                remote,
                SETPOINT,
                Arc::new(|nv: &mut NvAccess<'_>, rop: &Rop| match Setpoint::unpack_from_slice(&nv.ram[..]) {
                    Ok(setpoint) => tracing::info!(?setpoint, time = ?rop.time, "setpoint reported"),
                    Err(e) => tracing::warn!(error = %e, "undecodable setpoint"),
                }),
            )?;
        },
    }

    let transceiver = Transceiver::new(config, nvset, Arc::new(SystemClock::default()))?;
    let socket = <UdpSocket as net::DatagramOps>::connect(&options.bind, &options.remote).await?;

    let node = Node::new(transceiver, Arc::new(socket), Duration::from_millis(options.period_ms)).start();

    match options.role {
        Role::Board => run_board(node.clone(), asks_rx).await?,
        Role::Host => run_host(node.clone()).await?,
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    drop(node);

    System::current().stop();

    Ok(())
}

async fn run_board(node: Addr<Node<UdpSocket>>, mut asks: mpsc::UnboundedReceiver<Option<u32>>) -> Result<()> {
    node.send(AddRegular {
        ip:  LOCALHOST,
        rop: Rop::sig(STATUS, vec![0u8; 4]),
    })
    .await??;

    // Stands in for the joint controller behind the board: every proxied ask is answered with the
    // current setpoint.
    actix::spawn(async move {
        let setpoint = Setpoint {
            position: 1000,
            velocity: 0,
        };

        while let Some(signature) = asks.recv().await {
            let data = match setpoint.pack_to_vec() {
                Ok(data) => Bytes::from(data),
                Err(e) => {
                    tracing::error!(error = %e, "packing setpoint");
                    continue;
                },
            };

            let result = node
                .send(ProxyReply {
                    id32: SETPOINT,
                    signature,
                    data: Some(data),
                })
                .await;

            match result {
                Ok(result) => util::trace_catch!(level: warn, result, "answering proxied ask"),
                Err(e) => {
                    tracing::error!(error = %e, "node mailbox closed");
                    break;
                },
            }
        }
    });

    Ok(())
}

async fn run_host(node: Addr<Node<UdpSocket>>) -> Result<()> {
    let config = Config {
        period_ms: 1,
        verbosity: 2,
        flags:     0,
    }
    .pack_to_vec()?;

    node.send(LoadOccasional(vec![
        Rop::ask(CONFIG),
        Rop::set(CONFIG, config).request_confirmation(),
        Rop::ask(SETPOINT).with_signature(1).request_time(),
    ]))
    .await??;

    tracing::info!("queued initial queries");

    Ok(())
}
