use std::{
    net::Ipv4Addr,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};

use actix::prelude::*;
use message::{
    Id32,
    Rop,
};
use roplink_runtime::{
    node::{
        LoadOccasional,
        ReadNv,
        Stats,
    },
    nv::NvAccess,
    BoardConfig,
    EndpointConfig,
    Node,
    NvDescriptor,
    NvRom,
    NvSet,
    RwMode,
    SystemClock,
    Transceiver,
    TransceiverConfig,
    LOCALHOST,
};
use util::Timeout;

const BOARD: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 1);
const HOST: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 104);

const STATUS: Id32 = Id32::new(1, 0, 0, 0);

const PERIOD: Duration = Duration::from_millis(5);

fn board_config(value: u8) -> BoardConfig {
    BoardConfig {
        board:     1,
        endpoints: vec![EndpointConfig {
            endpoint: STATUS.endpoint(),
            nvs:      vec![NvDescriptor {
                entity:  STATUS.entity(),
                index:   STATUS.index(),
                tag:     STATUS.tag(),
                rom:     Arc::new(NvRom::new(vec![0u8; 4], RwMode::ReadOnly).with_init(move |nv| nv.ram.fill(value))),
                proxied: false,
            }],
        }],
    }
}

fn node(
    remote: Ipv4Addr,
    nvset: NvSet,
    socket: net::Channel,
) -> Addr<Node<net::Channel>> {
    let transceiver = Transceiver::new(TransceiverConfig::new(remote), nvset, Arc::new(SystemClock::default())).unwrap();
    Node::new(transceiver, Arc::new(socket), PERIOD).start()
}

#[actix::test]
async fn ask_is_answered_across_nodes() -> eyre::Result<()> {
    let (board_sock, host_sock) = net::channel(16);

    let mut board_nvs = NvSet::new();
    board_nvs.load_board(LOCALHOST, &board_config(7), Timeout::Infinite)?;

    let says = Arc::new(AtomicUsize::new(0));
    let s = says.clone();

    let mut host_nvs = NvSet::new();
    host_nvs.load_board(BOARD, &board_config(0), Timeout::Infinite)?;
    host_nvs.set_on_say(
        BOARD,
        STATUS,
        Arc::new(move |_: &mut NvAccess<'_>, _: &Rop| {
            s.fetch_add(1, Ordering::SeqCst);
        }),
    )?;

    let board = node(HOST, board_nvs, board_sock);
    let host = node(BOARD, host_nvs, host_sock);

    host.send(LoadOccasional(vec![Rop::ask(STATUS).with_signature(0x42)])).await??;

    tokio::time::sleep(PERIOD * 10).await;

    assert_eq!(says.load(Ordering::SeqCst), 1);

    let mirror = host.send(ReadNv { ip: BOARD, id32: STATUS }).await??;
    assert_eq!(&mirror[..], &[7; 4]);

    let board_stats = board.send(Stats).await?;
    assert_eq!(board_stats.frames, 1);
    assert_eq!(board_stats.sequence_errors, 0);

    let host_stats = host.send(Stats).await?;
    assert_eq!(host_stats.frames, 1);

    Ok(())
}

#[actix::test]
async fn regulars_flow_every_period() -> eyre::Result<()> {
    let (board_sock, host_sock) = net::channel(64);

    let mut board_nvs = NvSet::new();
    board_nvs.load_board(LOCALHOST, &board_config(3), Timeout::Infinite)?;

    let mut host_nvs = NvSet::new();
    host_nvs.load_board(BOARD, &board_config(0), Timeout::Infinite)?;

    let board = node(HOST, board_nvs, board_sock);
    let host = node(BOARD, host_nvs, host_sock);

    board
        .send(roplink_runtime::node::AddRegular {
            ip:  LOCALHOST,
            rop: Rop::sig(STATUS, vec![0u8; 4]),
        })
        .await??;

    tokio::time::sleep(PERIOD * 10).await;

    let mirror = host.send(ReadNv { ip: BOARD, id32: STATUS }).await??;
    assert_eq!(&mirror[..], &[3; 4]);

    let stats = host.send(Stats).await?;
    assert!(stats.frames > 1);
    assert_eq!(stats.sequence_errors, 0);
    assert_eq!(stats.invalid_frames, 0);

    Ok(())
}
