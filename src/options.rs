use std::{
    net::SocketAddr,
    str::FromStr,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Owns the demo endpoint and answers for it.
    Board,
    /// Mirrors a board's endpoint and queries it.
    Host,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "board" => Ok(Role::Board),
            "host" => Ok(Role::Host),
            other => Err(format!("unknown role {other:?}, expected board or host")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, structopt::StructOpt)]
pub struct Options {
    #[structopt(long, default_value = "board")]
    pub role: Role,

    #[structopt(long, default_value = "0.0.0.0:12345")]
    pub bind: SocketAddr,

    #[structopt(long)]
    pub remote: SocketAddr,

    /// Transmission period in milliseconds.
    #[structopt(long = "period-ms", default_value = "1")]
    pub period_ms: u64,

    #[structopt(long)]
    pub pretty: bool,
}
