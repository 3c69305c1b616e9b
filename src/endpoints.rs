//! Demonstration endpoints: a management endpoint (status and configuration) and one proxied
//! motion-control joint setpoint.

use std::sync::Arc;

use message::{
    Id32,
    Rop,
    RopCode,
};
use packed_struct::prelude::*;
use runtime::{
    nv::NvAccess,
    BoardConfig,
    EndpointConfig,
    NvDescriptor,
    NvRom,
    RwMode,
};
use tokio::sync::mpsc;

pub const MANAGEMENT: u8 = 0;
pub const MOTION_CONTROL: u8 = 1;

pub const STATUS: Id32 = Id32::new(MANAGEMENT, 0, 0, 0);
pub const CONFIG: Id32 = Id32::new(MANAGEMENT, 0, 0, 1);
pub const SETPOINT: Id32 = Id32::new(MOTION_CONTROL, 0, 0, 0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PrimitiveEnum_u8)]
pub enum State {
    Idle = 0,
    Running = 1,
    Fault = 2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PackedStruct)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4", endian = "lsb")]
pub struct Status {
    #[packed_field(size_bytes = "1", ty = "enum")]
    pub state: State,
    pub board: u8,
    pub major: u8,
    pub minor: u8,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PackedStruct)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4", endian = "lsb")]
pub struct Config {
    pub period_ms: u16,
    pub verbosity: u8,
    pub flags:     u8,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PackedStruct)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "8", endian = "lsb")]
pub struct Setpoint {
    pub position: i32,
    pub velocity: i32,
}

/// Pending proxied asks, identified by their signature.
pub type AskSender = mpsc::UnboundedSender<Option<u32>>;

fn version() -> (u8, u8) {
    let major = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or_default();
    let minor = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or_default();

    (major, minor)
}

fn log_value<T>(nv: &NvAccess<'_>, rop: Option<&Rop>)
where
    T: PackedStructSlice + std::fmt::Debug,
{
    match T::unpack_from_slice(&nv.ram[..]) {
        Ok(value) => tracing::info!(id32 = %nv.id32, ropc = ?rop.map(|r| r.ropc), ?value, "updated"),
        Err(e) => tracing::warn!(id32 = %nv.id32, error = %e, "undecodable value"),
    }
}

/// Endpoint configuration for `board`.
///
/// With `asks` present the configuration describes the owning side: the setpoint is proxied and
/// every ask for it is announced on `asks`. Without it the configuration describes a mirror.
pub fn board(board: u8, asks: Option<AskSender>) -> BoardConfig {
    let (major, minor) = version();

    let status = Status {
        state: State::Idle,
        board,
        major,
        minor,
    };

    let status_rom = NvRom::new(vec![0u8; 4], RwMode::ReadOnly)
        .with_init(move |nv| {
            let running = Status {
                state: State::Running,
                ..status
            };

            if let Err(e) = running.pack_to_slice(&mut nv.ram[..]) {
                tracing::error!(error = %e, "packing status");
            }
        })
        .with_update(|nv, rop| log_value::<Status>(nv, rop));

    let config_rom = NvRom::new(vec![0u8; 4], RwMode::ReadWrite).with_update(|nv, rop| log_value::<Config>(nv, rop));

    let proxied = asks.is_some();

    let setpoint_rom = NvRom::new(vec![0u8; 8], RwMode::ReadWrite).with_update(move |nv, rop| {
        match (rop, &asks) {
            (Some(rop), Some(asks)) if rop.ropc == RopCode::Ask => {
                util::trace_catch!(asks.send(rop.signature), id32 = %nv.id32, "announcing proxied ask");
            },
            _ => log_value::<Setpoint>(nv, rop),
        }
    });

    let nv = |tag: u8, rom: NvRom, proxied: bool| NvDescriptor {
        entity: 0,
        index: 0,
        tag,
        rom: Arc::new(rom),
        proxied,
    };

    BoardConfig {
        board,
        endpoints: vec![
            EndpointConfig {
                endpoint: MANAGEMENT,
                nvs:      vec![nv(STATUS.tag(), status_rom, false), nv(CONFIG.tag(), config_rom, false)],
            },
            EndpointConfig {
                endpoint: MOTION_CONTROL,
                nvs:      vec![nv(SETPOINT.tag(), setpoint_rom, proxied)],
            },
        ],
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;

    use runtime::{
        NvSet,
        Storage,
        LOCALHOST,
    };
    use util::Timeout;

    use super::*;

    #[test]
    fn status_is_initialized() -> eyre::Result<()> {
        let mut nvset = NvSet::<util::Single>::new();
        assert_eq!(nvset.load_board(LOCALHOST, &board(2, None), Timeout::Infinite)?, 3);

        let raw = nvset.get(LOCALHOST, STATUS).unwrap().get(Storage::Volatile, Timeout::Infinite)?;
        let status = Status::unpack_from_slice(&raw)?;

        assert_eq!(status.state, State::Running);
        assert_eq!(status.board, 2);

        Ok(())
    }

    #[test]
    fn owner_announces_asks() -> eyre::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut nvset = NvSet::<util::Single>::new();
        nvset.load_board(LOCALHOST, &board(2, Some(tx)), Timeout::Infinite)?;

        let nv = nvset.get(LOCALHOST, SETPOINT).unwrap();
        assert!(nv.is_proxied());

        nv.update(runtime::UpdatePolicy::Always, Some(&Rop::ask(SETPOINT).with_signature(5)), Timeout::Infinite)?;
        assert_eq!(rx.try_recv()?, Some(5));

        let mut host = NvSet::<util::Single>::new();
        host.load_board(Ipv4Addr::new(10, 0, 1, 1), &board(2, None), Timeout::Infinite)?;
        assert!(!host.get(Ipv4Addr::new(10, 0, 1, 1), SETPOINT).unwrap().is_proxied());

        Ok(())
    }
}
