// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! TCP snapshot broadcaster
//!
//! The simulation thread publishes snapshots into a `watch` channel. One
//! broadcaster task delta-encodes the newest snapshot every interval and fans
//! the resulting lines out over a `broadcast` channel. Every peer gets its own
//! task that forwards those lines and turns incoming command lines into
//! [`PeerEvent`]s for the simulation thread.

use crate::explorer::ExplorerId;
use crate::protocol::{DeltaEncoder, PeerCommand, WireRecord, WorldSnapshot};
use crate::simulation::{PeerEvent, SnapshotSink};
use crate::Result;
use crossbeam_channel::Sender;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Outbound lines buffered per peer before it starts lagging
const PEER_BUFFER: usize = 256;

impl SnapshotSink for watch::Sender<WorldSnapshot> {
    fn publish(&mut self, snapshot: WorldSnapshot) {
        self.send_replace(snapshot);
    }
}

fn render(records: &[WireRecord]) -> String {
    let mut text = String::new();
    for record in records {
        text.push_str(&record.to_string());
        text.push('\n');
    }
    text
}

/// Listening broadcaster, not yet serving
pub struct BroadcastServer {
    listener: TcpListener,
    snapshots: watch::Receiver<WorldSnapshot>,
    events: Sender<PeerEvent>,
    interval: Duration,
    next_explorer: Arc<AtomicU64>,
}

impl BroadcastServer {
    /// Bind the listener
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        addr: &str,
        interval: Duration,
        snapshots: watch::Receiver<WorldSnapshot>,
        events: Sender<PeerEvent>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(BroadcastServer {
            listener,
            snapshots,
            events,
            interval,
            next_explorer: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Address the listener is bound to
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept peers and broadcast deltas until the runtime shuts down
    ///
    /// # Errors
    ///
    /// Only returns if the local address cannot be queried.
    pub async fn run(self) -> Result<()> {
        let (lines_tx, _) = broadcast::channel::<Arc<str>>(PEER_BUFFER);
        tokio::spawn(broadcast_deltas(self.snapshots.clone(), lines_tx.clone(), self.interval));
        info!(addr = %self.local_addr()?, "broadcaster listening");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let id = ExplorerId::new(self.next_explorer.fetch_add(1, Ordering::Relaxed));
            let snapshots = self.snapshots.clone();
            let lines = lines_tx.subscribe();
            let events = self.events.clone();
            tokio::spawn(async move {
                debug!(%peer, explorer = %id, "peer connected");
                let result = serve_peer(stream, id, snapshots, lines, &events).await;
                let _ = events.send(PeerEvent::Left { id });
                match result {
                    Ok(()) => debug!(%peer, explorer = %id, "peer disconnected"),
                    Err(e) => warn!(%peer, explorer = %id, error = %e, "peer dropped"),
                }
            });
        }
    }
}

async fn broadcast_deltas(
    snapshots: watch::Receiver<WorldSnapshot>,
    lines: broadcast::Sender<Arc<str>>,
    interval: Duration,
) {
    let mut encoder = DeltaEncoder::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let records = encoder.encode(&snapshots.borrow());
        if records.is_empty() {
            continue;
        }
        // no subscribers is not an error; they get a full snapshot on connect
        let _ = lines.send(Arc::from(render(&records)));
    }
}

async fn serve_peer(
    stream: TcpStream,
    id: ExplorerId,
    snapshots: watch::Receiver<WorldSnapshot>,
    mut lines: broadcast::Receiver<Arc<str>>,
    events: &Sender<PeerEvent>,
) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let _ = events.send(PeerEvent::Joined { id });

    let mut greeting = WireRecord::ControlledExplorer { id }.to_string();
    greeting.push('\n');
    let full = render(&snapshots.borrow().full_records());
    greeting.push_str(&full);
    write.write_all(greeting.as_bytes()).await?;

    let mut commands = BufReader::new(read).lines();
    loop {
        tokio::select! {
            line = commands.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<PeerCommand>() {
                    Ok(command) => {
                        let _ = events.send(PeerEvent::Command { id, command });
                    }
                    Err(e) => warn!(explorer = %id, error = %e, "ignoring peer line"),
                }
            }
            received = lines.recv() => {
                if !forward(&mut write, received, &mut lines, &snapshots, id).await? {
                    return Ok(());
                }
            }
        }
    }
}

/// Write one broadcast message to a peer
///
/// A peer that fell behind has missed deltas the shared encoder will not
/// repeat, so its backlog is discarded and it receives a full snapshot
/// instead. Returns `false` once the broadcast side has closed.
async fn forward<W>(
    write: &mut W,
    received: std::result::Result<Arc<str>, RecvError>,
    lines: &mut broadcast::Receiver<Arc<str>>,
    snapshots: &watch::Receiver<WorldSnapshot>,
    id: ExplorerId,
) -> Result<bool>
where
    W: AsyncWrite + Unpin,
{
    match received {
        Ok(text) => write.write_all(text.as_bytes()).await?,
        Err(RecvError::Lagged(skipped)) => {
            warn!(explorer = %id, skipped, "peer lagging, resending full snapshot");
            *lines = lines.resubscribe();
            let full = render(&snapshots.borrow().full_records());
            write.write_all(full.as_bytes()).await?;
        }
        Err(RecvError::Closed) => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::{Particle, ParticleId};
    use crossbeam_channel::{unbounded, Receiver};

    async fn next_event(events: &Receiver<PeerEvent>) -> PeerEvent {
        for _ in 0..200 {
            if let Ok(event) = events.try_recv() {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no peer event within 2s");
    }

    async fn start(
        snapshot: WorldSnapshot,
    ) -> (SocketAddr, watch::Sender<WorldSnapshot>, Receiver<PeerEvent>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot);
        let (event_tx, event_rx) = unbounded();
        let server = BroadcastServer::bind(
            "127.0.0.1:0",
            Duration::from_millis(10),
            snapshot_rx,
            event_tx,
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        (addr, snapshot_tx, event_rx)
    }

    #[tokio::test]
    async fn test_lagging_peer_resyncs_with_full_snapshot() {
        let snapshot = WorldSnapshot {
            frame: 9,
            particles: vec![Particle::new(ParticleId::new(2), 7.0, 8.0, 0.0, 0.0)],
            explorers: Vec::new(),
        };
        let (_snapshot_tx, snapshots) = watch::channel(snapshot);
        let (lines_tx, mut lines) = broadcast::channel::<Arc<str>>(2);
        for frame in 0..5 {
            lines_tx.send(Arc::from(format!("stale {frame}\n"))).unwrap();
        }

        let received = lines.recv().await;
        assert!(matches!(received, Err(RecvError::Lagged(3))));

        let mut out: Vec<u8> = Vec::new();
        let open = forward(&mut out, received, &mut lines, &snapshots, ExplorerId::new(0))
            .await
            .unwrap();
        assert!(open);
        assert_eq!(String::from_utf8(out).unwrap(), "PARTICLE: 2, 7, 8, 0, 0\n");

        // the stale backlog is gone; new deltas flow again
        assert!(matches!(lines.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
        lines_tx.send(Arc::from("fresh\n")).unwrap();
        assert_eq!(&*lines.recv().await.unwrap(), "fresh\n");
    }

    #[tokio::test]
    async fn test_forward_stops_when_broadcast_closes() {
        let (_snapshot_tx, snapshots) = watch::channel(WorldSnapshot::default());
        let (lines_tx, mut lines) = broadcast::channel::<Arc<str>>(2);
        drop(lines_tx);
        let received = lines.recv().await;

        let mut out: Vec<u8> = Vec::new();
        let open = forward(&mut out, received, &mut lines, &snapshots, ExplorerId::new(0))
            .await
            .unwrap();
        assert!(!open);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_peer_gets_controlled_explorer_then_snapshot() {
        let snapshot = WorldSnapshot {
            frame: 0,
            particles: vec![Particle::new(ParticleId::new(4), 1.0, 2.0, 3.0, 4.0)],
            explorers: Vec::new(),
        };
        let (addr, _snapshots, events) = start(snapshot).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "CONTROLLED_EXPLORER: 0");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PARTICLE: 4, 1, 2, 3, 4");
        assert_eq!(next_event(&events).await, PeerEvent::Joined { id: ExplorerId::new(0) });
    }

    #[tokio::test]
    async fn test_commands_forwarded_and_garbage_ignored() {
        let (addr, _snapshots, events) = start(WorldSnapshot::default()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"DANCE\nMOVE_LEFT\n").await.unwrap();
        let id = ExplorerId::new(0);
        assert_eq!(next_event(&events).await, PeerEvent::Joined { id });
        assert_eq!(
            next_event(&events).await,
            PeerEvent::Command { id, command: PeerCommand::MoveLeft }
        );

        drop(stream);
        assert_eq!(next_event(&events).await, PeerEvent::Left { id });
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let (addr, snapshots, _events) = start(WorldSnapshot::default()).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "CONTROLLED_EXPLORER: 0");

        snapshots.send_replace(WorldSnapshot {
            frame: 1,
            particles: vec![Particle::new(ParticleId::new(1), 5.0, 6.0, 0.0, 0.0)],
            explorers: Vec::new(),
        });
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(line, "PARTICLE: 1, 5, 6, 0, 0");
    }
}
