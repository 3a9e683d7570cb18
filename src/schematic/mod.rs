use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareProfile {
    pub cores: u32,
    pub memory_mb: u64,
}

/// Immutable identity of one worker node. The controller loads these from
/// the fleet file and sends them back to workers inside Construct requests.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSchematic {
    pub id: i32,
    pub address: String,
    pub port: u16,
    pub profile: HardwareProfile,
}

impl NodeSchematic {
    pub fn endpoint(&self) -> io::Result<SocketAddr> {
        (self.address.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no socket address resolved for {}", self.display_endpoint()),
                )
            })
    }

    pub fn display_endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[derive(Debug)]
pub enum SchematicError {
    Io {
        path: String,
        source: io::Error,
    },
    Parse {
        path: String,
        source: serde_json::Error,
    },
    DuplicateNodeId {
        id: i32,
    },
}

impl fmt::Display for SchematicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read fleet file '{path}': {source}")
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse fleet file '{path}': {source}")
            }
            Self::DuplicateNodeId { id } => {
                write!(f, "fleet file declares node id {id} more than once")
            }
        }
    }
}

impl std::error::Error for SchematicError {}

pub fn load_fleet(path: impl AsRef<Path>) -> Result<Vec<NodeSchematic>, SchematicError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| SchematicError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;

    let schematics: Vec<NodeSchematic> =
        serde_json::from_str(&content).map_err(|source| SchematicError::Parse {
            path: path.to_string_lossy().to_string(),
            source,
        })?;

    let mut seen = HashSet::new();
    for schematic in &schematics {
        if !seen.insert(schematic.id) {
            return Err(SchematicError::DuplicateNodeId { id: schematic.id });
        }
    }

    Ok(schematics)
}
