use std::{
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};

use message::{
    ConfInfo,
    Rop,
    RopCode,
};
use runtime::{
    confman::ConfirmationConfig,
    nv::NvAccess,
    proxy::ProxyConfig,
    Storage,
    TransceiverConfig,
    LOCALHOST,
};
use util::Timeout;

mod common;

use common::*;

fn value(t: &runtime::Transceiver, ip: std::net::Ipv4Addr, id32: message::Id32) -> eyre::Result<Vec<u8>> {
    Ok(t.nvset().get(ip, id32).unwrap().get(Storage::Volatile, Timeout::Infinite)?.to_vec())
}

#[test]
fn set_with_confirmation_round_trip() -> eyre::Result<()> {
    let acks = Arc::new(Mutex::new(vec![]));
    let a = acks.clone();

    let host = TransceiverConfig {
        confirmation: ConfirmationConfig::enabled().on_received(move |from, rop| a.lock().unwrap().push((from, rop.clone()))),
        ..TransceiverConfig::new(BOARD)
    };

    let mut pair = Pair::new(TransceiverConfig::new(HOST), host, None)?;

    pair.host.load_occasional(Rop::set(CONFIG, vec![1, 2, 3, 4]).request_confirmation())?;
    pair.host.load_occasional(Rop::set(STATUS, vec![1, 2, 3, 4]).request_confirmation())?;
    pair.host_to_board()?.unwrap();

    assert_eq!(value(&pair.board, LOCALHOST, CONFIG)?, vec![1, 2, 3, 4]);
    assert_eq!(value(&pair.board, LOCALHOST, STATUS)?, vec![0; 4]);

    let reply = pair.board_to_host()?.unwrap();
    assert_eq!(reply.count(), 2);

    let acks = acks.lock().unwrap();
    assert_eq!(acks.len(), 2);
    assert!(acks.iter().all(|(from, _)| *from == BOARD));
    assert_eq!((acks[0].1.id32, acks[0].1.confinfo), (CONFIG, ConfInfo::Ack));
    assert_eq!((acks[1].1.id32, acks[1].1.confinfo), (STATUS, ConfInfo::Nak));

    Ok(())
}

#[test]
fn proxied_ask_is_answered_later() -> eyre::Result<()> {
    let announced = Arc::new(Mutex::new(vec![]));
    let a = announced.clone();

    let board = TransceiverConfig {
        proxy: ProxyConfig::enabled(),
        ..TransceiverConfig::new(HOST)
    };

    let hook: UpdateHook = Arc::new(move |nv: &mut NvAccess<'_>, rop: Option<&Rop>| {
        if let Some(rop) = rop.filter(|r| r.ropc == RopCode::Ask) {
            a.lock().unwrap().push((nv.id32, rop.signature));
        }
    });

    let mut pair = Pair::new(board, TransceiverConfig::new(BOARD), Some(hook))?;

    pair.host.load_occasional(Rop::ask(SETPOINT).with_signature(0x77).request_time())?;
    pair.host_to_board()?;

    assert_eq!(*announced.lock().unwrap(), vec![(SETPOINT, Some(0x77))]);
    assert!(pair.board_to_host()?.is_none());

    pair.clock.advance(Duration::from_millis(3));
    pair.board.proxy_params(SETPOINT).unwrap().received = 1;
    pair.board.proxy_reply_load(SETPOINT, Some(0x77), Some(&[1, 0, 0, 0, 2, 0, 0, 0]))?;

    let frame = pair.board_to_host()?.unwrap();
    let say = frame.rops().next().unwrap()?;
    assert_eq!(say.ropc, RopCode::Say);
    assert_eq!(say.signature, Some(0x77));
    assert_eq!(say.time, Some(3_000));

    assert_eq!(value(&pair.host, BOARD, SETPOINT)?, vec![1, 0, 0, 0, 2, 0, 0, 0]);

    Ok(())
}

#[test]
fn regulars_keep_mirror_current() -> eyre::Result<()> {
    let mut pair = Pair::new(TransceiverConfig::new(HOST), TransceiverConfig::new(BOARD), None)?;

    pair.board.add_regular(LOCALHOST, Rop::sig(CONFIG, vec![0u8; 4]))?;

    for i in 1..=5u8 {
        pair.board
            .nvset()
            .get(LOCALHOST, CONFIG)
            .unwrap()
            .set(&[i; 4], false, runtime::UpdatePolicy::Never, Timeout::Infinite)?;

        let frame = pair.board_to_host()?.unwrap();
        assert_eq!(frame.sequence_number(), i as u64);
        assert_eq!(value(&pair.host, BOARD, CONFIG)?, vec![i; 4]);
    }

    assert_eq!(pair.host.stats().frames, 5);
    assert_eq!(pair.host.stats().sequence_errors, 0);

    Ok(())
}

#[test]
fn lost_frames_are_reported() -> eyre::Result<()> {
    let mut pair = Pair::new(TransceiverConfig::new(HOST), TransceiverConfig::new(BOARD), None)?;
    pair.board.add_regular(LOCALHOST, Rop::sig(STATUS, vec![0u8; 4]))?;

    pair.board_to_host()?;
    pair.board.transmit()?;
    pair.board_to_host()?;

    assert_eq!(pair.host.stats().sequence_errors, 1);

    Ok(())
}
