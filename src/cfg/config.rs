// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    net::{Ipv4Addr, SocketAddrV4},
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::models::common::{DEFAULT_SCP_DATA_LENGTH, SCP_PORT};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Where the machine is reached.
    pub target: TargetConfig,
    /// Transport envelope of a single connection.
    pub link: LinkConfig,
}

/// Address of the remote machine's monitor processor. The library consumes
/// a pre-resolved IPv4 address; name resolution happens outside.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TargetConfig {
    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "Port", default = "default_port")]
    pub port: u16,
}

/// Per-connection transport parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LinkConfig {
    #[serde(rename = "ScpDataLength", default = "default_scp_data_length")]
    /// Largest data segment a single SCP exchange may carry, in bytes.
    /// Bulk transfers are segmented to this size.
    pub scp_data_length: usize,

    #[serde(rename = "TimeoutMs", with = "serde_millis", default = "default_timeout")]
    /// Per-attempt response timeout. Armed only once a transmit has been
    /// handed to the OS.
    pub timeout: Duration,

    #[serde(rename = "NTries", default = "default_n_tries")]
    /// Transmissions attempted per request before giving up.
    pub n_tries: u32,

    #[serde(rename = "NOutstanding", default = "default_n_outstanding")]
    /// Requests allowed in flight at once; further requests queue FIFO.
    pub n_outstanding: usize,
}

fn default_port() -> u16 {
    SCP_PORT
}

fn default_scp_data_length() -> usize {
    DEFAULT_SCP_DATA_LENGTH
}

fn default_timeout() -> Duration {
    Duration::from_millis(500)
}

fn default_n_tries() -> u32 {
    5
}

fn default_n_outstanding() -> usize {
    8
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scp_data_length: default_scp_data_length(),
            timeout: default_timeout(),
            n_tries: default_n_tries(),
            n_outstanding: default_n_outstanding(),
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.target.address.is_empty(), "Address must not be empty");
        ensure!(self.target.port != 0, "Port must not be 0");

        ensure!(self.link.scp_data_length >= 1, "ScpDataLength must be >= 1");
        ensure!(!self.link.timeout.is_zero(), "TimeoutMs must be > 0");
        ensure!(self.link.n_tries >= 1, "NTries must be >= 1");
        ensure!(self.link.n_outstanding >= 1, "NOutstanding must be >= 1");
        // Sequence numbers are 16-bit; a wider window could not keep them
        // unique across outstanding requests.
        ensure!(
            self.link.n_outstanding <= u16::MAX as usize,
            "NOutstanding must fit the 16-bit sequence space"
        );

        Ok(())
    }

    /// The peer's socket address. The protocol peer is IPv4-only.
    pub fn socket_addr(&self) -> Result<SocketAddrV4> {
        let ip: Ipv4Addr = self
            .target
            .address
            .parse()
            .with_context(|| format!("not an IPv4 address: {}", self.target.address))?;
        Ok(SocketAddrV4::new(ip, self.target.port))
    }
}

/// Serde helpers for representing `Duration` as whole milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
