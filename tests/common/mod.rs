use std::{
    net::Ipv4Addr,
    sync::Arc,
};

use codec::Frame;
use message::Id32;
use runtime::{
    nv::NvAccess,
    BoardConfig,
    EndpointConfig,
    ManualClock,
    NvDescriptor,
    NvRom,
    NvSet,
    RwMode,
    Transceiver,
    TransceiverConfig,
    LOCALHOST,
};
use util::Timeout;

pub const BOARD: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 1);
pub const HOST: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 104);

pub const STATUS: Id32 = Id32::new(0, 0, 0, 0);
pub const CONFIG: Id32 = Id32::new(0, 0, 0, 1);
pub const SETPOINT: Id32 = Id32::new(1, 0, 0, 0);

pub type UpdateHook = Arc<dyn Fn(&mut NvAccess<'_>, Option<&message::Rop>) + Send + Sync>;

pub fn endpoint(proxied: bool, hook: Option<UpdateHook>) -> BoardConfig {
    let desc = |id32: Id32, len: usize, rwmode: RwMode, proxied: bool| {
        let mut rom = NvRom::new(vec![0u8; len], rwmode);

        if let Some(ref hook) = hook {
            let hook = hook.clone();
            rom = rom.with_update(move |nv, rop| hook(nv, rop));
        }

        NvDescriptor {
            entity: id32.entity(),
            index: id32.index(),
            tag: id32.tag(),
            rom: Arc::new(rom),
            proxied,
        }
    };

    BoardConfig {
        board:     1,
        endpoints: vec![
            EndpointConfig {
                endpoint: 0,
                nvs:      vec![
                    desc(STATUS, 4, RwMode::ReadOnly, false),
                    desc(CONFIG, 4, RwMode::ReadWrite, false),
                ],
            },
            EndpointConfig {
                endpoint: 1,
                nvs:      vec![desc(SETPOINT, 8, RwMode::ReadWrite, proxied)],
            },
        ],
    }
}

pub struct Pair {
    pub board: Transceiver,
    pub host:  Transceiver,
    pub clock: ManualClock,
}

impl Pair {
    pub fn new(board: TransceiverConfig, host: TransceiverConfig, board_hook: Option<UpdateHook>) -> eyre::Result<Self> {
        let clock = ManualClock::default();

        let mut board_nvs = NvSet::new();
        board_nvs.load_board(LOCALHOST, &endpoint(true, board_hook), Timeout::Infinite)?;

        let mut host_nvs = NvSet::new();
        host_nvs.load_board(BOARD, &endpoint(false, None), Timeout::Infinite)?;

        Ok(Self {
            board: Transceiver::new(board, board_nvs, Arc::new(clock.clone()))?,
            host: Transceiver::new(host, host_nvs, Arc::new(clock.clone()))?,
            clock,
        })
    }

    /// Move the host's next frame to the board. Returns the frame, if one was sent.
    pub fn host_to_board(&mut self) -> eyre::Result<Option<Frame>> {
        let frame = match self.host.transmit()? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        self.board.receive(HOST, frame.to_bytes()?)?;
        Ok(Some(frame))
    }

    pub fn board_to_host(&mut self) -> eyre::Result<Option<Frame>> {
        let frame = match self.board.transmit()? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        self.host.receive(BOARD, frame.to_bytes()?)?;
        Ok(Some(frame))
    }
}
