use std::{
    net::Ipv4Addr,
    sync::Arc,
};

use fnv::FnvHashMap;
use message::Id32;
use util::{
    Policy,
    Single,
    Timeout,
};

use crate::{
    nv::{
        Nv,
        NvRom,
        OnSayFn,
        Ownership,
        LOCALHOST,
    },
    Error,
    Result,
};

#[derive(Clone, Debug)]
pub struct NvDescriptor {
    pub entity:  u8,
    pub index:   u8,
    pub tag:     u8,
    pub rom:     Arc<NvRom>,
    pub proxied: bool,
}

#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub endpoint: u8,
    pub nvs:      Vec<NvDescriptor>,
}

#[derive(Clone, Debug)]
pub struct BoardConfig {
    pub board:     u8,
    pub endpoints: Vec<EndpointConfig>,
}

struct BoardNvs<L: Policy> {
    board: u8,
    nvs:   FnvHashMap<Id32, Nv<L>>,
}

/// Registry of the network variables a node knows about, keyed by owner address and id32.
/// Variables bound at `127.0.0.1` are local; every other address holds remote mirrors.
pub struct NvSet<L: Policy = Single> {
    boards: FnvHashMap<Ipv4Addr, BoardNvs<L>>,
}

impl<L> Default for NvSet<L>
where
    L: Policy,
{
    fn default() -> Self {
        Self {
            boards: FnvHashMap::default(),
        }
    }
}

impl<L> NvSet<L>
where
    L: Policy,
{
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(level = "debug", skip(self, id32, rom), fields(id32 = %id32), err)]
    pub fn bind(&mut self, ip: Ipv4Addr, board: u8, id32: Id32, rom: Arc<NvRom>, proxied: bool) -> Result<&Nv<L>> {
        let entry = self.boards.entry(ip).or_insert_with(|| BoardNvs {
            board,
            nvs: FnvHashMap::default(),
        });

        if entry.board != board {
            return Err(Error::Config(format!(
                "{ip} already hosts board {}, cannot bind board {board}",
                entry.board
            )));
        }

        if entry.nvs.contains_key(&id32) {
            return Err(Error::AlreadyBound {
                ip,
                id32,
            });
        }

        Ok(entry.nvs.entry(id32).or_insert_with(|| Nv::load(ip, board, id32, rom, proxied)))
    }

    /// Bind every variable of `config` at `ip`, then run their init functions.
    #[tracing::instrument(skip(self, config), fields(board = config.board), err)]
    pub fn load_board(&mut self, ip: Ipv4Addr, config: &BoardConfig, timeout: Timeout) -> Result<usize> {
        let mut bound = vec![];

        for ep in &config.endpoints {
            for desc in &ep.nvs {
                let id32 = Id32::new(ep.endpoint, desc.entity, desc.index, desc.tag);
                self.bind(ip, config.board, id32, desc.rom.clone(), desc.proxied)?;
                bound.push(id32);
            }
        }

        for id32 in &bound {
            if let Some(nv) = self.get(ip, *id32) {
                nv.init(timeout)?;
            }
        }

        tracing::debug!(%ip, count = bound.len(), "loaded board");

        Ok(bound.len())
    }

    pub fn set_on_say(&mut self, ip: Ipv4Addr, id32: Id32, onsay: OnSayFn) -> Result<()> {
        let nv = self
            .boards
            .get_mut(&ip)
            .and_then(|b| b.nvs.get_mut(&id32))
            .ok_or(Error::UnknownNv {
                ip,
                id32,
            })?;

        nv.set_on_say(Some(onsay));
        Ok(())
    }

    #[inline]
    pub fn get(&self, ip: Ipv4Addr, id32: Id32) -> Option<&Nv<L>> {
        self.boards.get(&ip)?.nvs.get(&id32)
    }

    /// Mirror held for `from` if there is one, else the local variable.
    #[inline]
    pub fn lookup(&self, from: Ipv4Addr, id32: Id32) -> Option<&Nv<L>> {
        self.get(from, id32).or_else(|| self.get(LOCALHOST, id32))
    }

    #[inline]
    pub fn board(&self, ip: Ipv4Addr) -> Option<u8> {
        self.boards.get(&ip).map(|b| b.board)
    }

    #[inline]
    pub fn ownership(&self, ip: Ipv4Addr) -> Option<Ownership> {
        self.boards.contains_key(&ip).then(|| Ownership::of(ip))
    }

    pub fn len(&self) -> usize {
        self.boards.values().map(|b| b.nvs.len()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nv<L>> + '_ {
        self.boards.values().flat_map(|b| b.nvs.values())
    }

    /// Forget every binding. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.boards.clear();
    }
}
