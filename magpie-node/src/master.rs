//! # Master - Keeper of the Globally Best Genome
//!
//! The master holds one `(fitness, dna)` pair behind a single mutex,
//! persists it to disk on every accepted upload, and serves three RPCs.
//! `GetFitness` reads the fitness atomically without the lock; the other
//! two take it. Uploads are accepted when the offered fitness is at
//! least the current one (NaN counts as below everything), so the best
//! fitness is nondecreasing over the master's lifetime.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use magpie_core::protocol::{Request, Response, MAX_FRAME};
use magpie_core::{fitness_cmp, MagpieResult};

use crate::storage;

/// Shared master state: best fitness (atomic f32 bits), best DNA, and
/// the persistence path. One mutex guards DNA and file together.
pub struct MasterState {
    fitness: AtomicU32,
    dna: Mutex<Vec<u8>>,
    path: PathBuf,
}

impl MasterState {
    pub fn new(path: PathBuf) -> Self {
        Self {
            fitness: AtomicU32::new(f32::NAN.to_bits()),
            dna: Mutex::new(Vec::new()),
            path,
        }
    }

    /// Lock-free read of the best fitness
    pub fn fitness(&self) -> f32 {
        f32::from_bits(self.fitness.load(AtomicOrdering::Acquire))
    }

    fn set_fitness(&self, fitness: f32) {
        self.fitness.store(fitness.to_bits(), AtomicOrdering::Release);
    }

    /// Load persisted state if the file is readable; otherwise log and
    /// continue empty.
    pub fn init(&self) {
        match storage::read_state(&self.path) {
            Ok((fitness, dna)) => {
                let mut guard = self.dna.lock();
                self.set_fitness(fitness);
                info!(size = dna.len(), fitness, "state restored");
                *guard = dna;
            }
            Err(e) => {
                warn!("{e}");
                info!(fitness = self.fitness(), "starting with empty state");
            }
        }
    }

    /// Consistent `(fitness, dna)` pair, under the lock
    pub fn snapshot(&self) -> (f32, Vec<u8>) {
        let guard = self.dna.lock();
        (self.fitness(), guard.clone())
    }

    /// Apply the accept rule: keep the offer iff it is at least as fit
    /// as the current state. Persists and logs under the lock.
    pub fn accept(&self, fitness: f32, dna: Vec<u8>) -> MagpieResult<bool> {
        let mut guard = self.dna.lock();
        if fitness_cmp(fitness, self.fitness()) == Ordering::Less {
            return Ok(false);
        }
        self.set_fitness(fitness);
        *guard = dna;
        storage::write_state(&self.path, fitness, &guard)?;
        info!(size = guard.len(), fitness, "state accepted");
        Ok(true)
    }

    /// Shutdown log line
    pub fn terminate(&self) {
        if self.fitness().is_nan() {
            info!("no state saved");
        } else {
            info!("last state saved in {}", self.path.display());
        }
    }
}

/// Run the master role: restore state, bind, serve until SIGINT.
pub async fn run(file: String, port: u16) -> MagpieResult<()> {
    let state = Arc::new(MasterState::new(PathBuf::from(file)));
    state.init();

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "master listening");

    tokio::select! {
        result = serve(listener, state.clone()) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    state.terminate();
    Ok(())
}

/// Accept loop; one task per connection.
pub async fn serve(listener: TcpListener, state: Arc<MasterState>) -> MagpieResult<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                warn!("connection error: {e}");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<MasterState>) -> MagpieResult<()> {
    loop {
        let payload = match read_raw_frame(&mut stream).await? {
            Some(payload) => payload,
            None => return Ok(()), // client disconnected
        };

        // an undecodable request is an unsupported command, not a
        // connection error
        let response = match bincode::deserialize::<Request>(&payload) {
            Ok(request) => dispatch(&state, request).unwrap_or_else(|e| Response::Error {
                status: 400,
                message: e.to_string(),
            }),
            Err(_) => Response::Error {
                status: 400,
                message: "Command Not Supported".into(),
            },
        };

        write_frame(&mut stream, &response).await?;
    }
}

fn dispatch(state: &MasterState, request: Request) -> MagpieResult<Response> {
    match request {
        Request::GetFitness => Ok(Response::Fitness {
            fitness: state.fitness(),
        }),
        Request::GetGraph => {
            let (fitness, dna) = state.snapshot();
            Ok(Response::Graph { fitness, dna })
        }
        Request::SetGraph { fitness, dna } => {
            // ignored offers still succeed; the worker does not care
            state.accept(fitness, dna)?;
            Ok(Response::Success)
        }
    }
}

/// Read one frame; None on clean EOF before the length prefix.
async fn read_raw_frame(stream: &mut TcpStream) -> MagpieResult<Option<Vec<u8>>> {
    let mut prefix = [0u8; 4];
    match stream.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME {
        return Err(magpie_core::MagpieError::protocol("frame too large"));
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

async fn write_frame(stream: &mut TcpStream, response: &Response) -> MagpieResult<()> {
    let payload = bincode::serialize(response)?;
    stream.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    stream.write_all(&payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("magpie-master-{name}-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_accept_rule() {
        let state = MasterState::new(scratch("accept"));
        assert!(state.fitness().is_nan());

        // anything beats NaN
        assert!(state.accept(0.5, vec![1]).unwrap());
        assert_eq!(state.fitness(), 0.5);

        // lower offers are ignored
        assert!(!state.accept(0.3, vec![2]).unwrap());
        assert_eq!(state.fitness(), 0.5);
        assert_eq!(state.snapshot().1, vec![1]);

        // equal offers are accepted
        assert!(state.accept(0.5, vec![3]).unwrap());
        assert_eq!(state.snapshot().1, vec![3]);

        // a NaN offer never displaces a real value
        assert!(!state.accept(f32::NAN, vec![4]).unwrap());
        assert_eq!(state.fitness(), 0.5);

        let _ = std::fs::remove_file(state.path);
    }

    #[test]
    fn test_init_restores_persisted_state() {
        let path = scratch("restore");
        storage::write_state(&path, 0.75, &[9, 9, 9]).unwrap();

        let state = MasterState::new(path.clone());
        state.init();
        assert_eq!(state.fitness(), 0.75);
        assert_eq!(state.snapshot().1, vec![9, 9, 9]);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_init_survives_missing_file() {
        let state = MasterState::new(scratch("missing"));
        state.init();
        assert!(state.fitness().is_nan());
        assert!(state.snapshot().1.is_empty());
    }
}
