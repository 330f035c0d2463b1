//! # Protocol - Master/Worker Wire Schema
//!
//! A request/response exchange over TCP. Each message is one frame:
//! a `u32` little-endian payload length followed by the bincode-encoded
//! tagged enum. Bincode rather than JSON because fitness legitimately
//! travels as NaN ("no data yet") and JSON cannot carry it.
//!
//! The client is synchronous and connection-per-call: connect, send,
//! receive, drop. Worker threads block inside these calls and nowhere
//! else.

use std::io::{Read, Write};
use std::net::TcpStream;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{MagpieError, MagpieResult};

/// Upper bound on a frame payload; a genome is a few KB in practice
pub const MAX_FRAME: usize = 64 * 1024 * 1024;

/// Requests a worker can send to the master
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Current best fitness (cheap; no DNA transfer)
    GetFitness,
    /// Current best fitness and its DNA
    GetGraph,
    /// Offer a locally evolved graph
    SetGraph { fitness: f32, dna: Vec<u8> },
}

/// Master responses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Error { status: i32, message: String },
    Fitness { fitness: f32 },
    Graph { fitness: f32, dna: Vec<u8> },
    Success,
}

/// Write one length-prefixed frame
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> MagpieResult<()> {
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_FRAME {
        return Err(MagpieError::protocol("frame too large"));
    }
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed frame
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> MagpieResult<T> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME {
        return Err(MagpieError::protocol("frame too large"));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(bincode::deserialize(&payload)?)
}

/// Synchronous RPC client; one TCP connection per call.
pub struct Client {
    host: String,
    port: u16,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Send one request and wait for the response
    pub fn call(&self, request: &Request) -> MagpieResult<Response> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))?;
        write_frame(&mut stream, request)?;
        let response = read_frame(&mut stream)?;
        if let Response::Error { status, message } = response {
            return Err(MagpieError::Remote { status, message });
        }
        Ok(response)
    }

    /// Master's current best fitness (NaN when it has none)
    pub fn get_fitness(&self) -> MagpieResult<f32> {
        match self.call(&Request::GetFitness)? {
            Response::Fitness { fitness } => Ok(fitness),
            _ => Err(MagpieError::protocol("unexpected response to GetFitness")),
        }
    }

    /// Master's current best fitness and DNA
    pub fn get_graph(&self) -> MagpieResult<(f32, Vec<u8>)> {
        match self.call(&Request::GetGraph)? {
            Response::Graph { fitness, dna } => Ok((fitness, dna)),
            _ => Err(MagpieError::protocol("unexpected response to GetGraph")),
        }
    }

    /// Offer a graph; the master keeps it only if it is at least as fit
    pub fn set_graph(&self, fitness: f32, dna: &[u8]) -> MagpieResult<()> {
        match self.call(&Request::SetGraph {
            fitness,
            dna: dna.to_vec(),
        })? {
            Response::Success => Ok(()),
            _ => Err(MagpieError::protocol("unexpected response to SetGraph")),
        }
    }
}
