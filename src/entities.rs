//! Live entity state synchronization
//!
//! A background task polls the world state endpoint on a fixed cadence and sends
//! each result, tagged with a request sequence number, back to the render loop.
//! The render loop owns the [`EntityIndex`] and applies results between frames,
//! so a rebuild is never observed half-done.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Configuration for the world state poller
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Full URL of the world state endpoint
    pub endpoint: String,
    /// Time between polls
    pub interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/api/world".to_string(),
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// One sub-tile of a multi-cell entity: `[[x, y], character, color]`
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SubTile(pub [i64; 2], pub String, pub String);

/// An entity as reported by the server. Unknown fields are ignored.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Entity {
    pub coordinates: [i64; 2],
    pub character: String,
    pub color: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub life: Option<f64>,
    pub state: Option<String>,
    /// Degrees
    pub rotation: Option<f64>,
    pub debug_info: Option<String>,
    pub tiles: Option<Vec<SubTile>>,
}

impl Entity {
    /// First character of the glyph string (servers send one-character strings)
    pub fn glyph(&self) -> char {
        self.character.chars().next().unwrap_or('?')
    }

    /// Text shown when hovering the entity
    pub fn tooltip_text(&self) -> String {
        if let Some(info) = &self.debug_info {
            return info.clone();
        }
        let label = match (&self.name, &self.kind) {
            (Some(name), Some(kind)) => format!("{} ({})", name, kind),
            (Some(name), None) => name.clone(),
            (None, Some(kind)) => kind.clone(),
            (None, None) => "Entity".to_string(),
        };
        format!("{} at ({}, {})", label, self.coordinates[0], self.coordinates[1])
    }

    /// Copy of this entity placed on one of its sub-tiles
    fn project(&self, tile: &SubTile) -> Entity {
        Entity {
            coordinates: tile.0,
            character: tile.1.clone(),
            color: tile.2.clone(),
            tiles: None,
            ..self.clone()
        }
    }
}

/// Parsed world state response
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldPayload {
    pub entities: Vec<Entity>,
    /// Seconds until the server advances its simulation
    pub next_update_in: Option<f64>,
}

/// Top level of a response. Fields are kept loose so that a mistyped optional
/// field never discards the rest of the body.
#[derive(Deserialize)]
struct RawPayload {
    entities: Option<serde_json::Value>,
    next_update_in: Option<serde_json::Value>,
}

/// Errors that can occur while fetching world state
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    Network(String),
    Status(u16),
    Parse(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Network(e) => write!(f, "Network error: {}", e),
            SyncError::Status(code) => write!(f, "Server returned status {}", code),
            SyncError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for SyncError {}

/// Parse a response body. A body without `entities` means no entities;
/// individual malformed entities are skipped.
pub fn parse_payload(body: &str) -> Result<WorldPayload, SyncError> {
    let raw: RawPayload = serde_json::from_str(body).map_err(|e| SyncError::Parse(e.to_string()))?;

    let values = match raw.entities {
        Some(serde_json::Value::Array(values)) => values,
        Some(serde_json::Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!("Ignoring non-list entities field: {}", other);
            Vec::new()
        }
    };
    let total = values.len();
    let entities: Vec<Entity> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(entity) => Some(entity),
            Err(e) => {
                debug!("Skipping malformed entity: {}", e);
                None
            }
        })
        .collect();

    if entities.len() < total {
        warn!("Skipped {} of {} malformed entities", total - entities.len(), total);
    }

    Ok(WorldPayload {
        entities,
        next_update_in: raw.next_update_in.as_ref().and_then(serde_json::Value::as_f64),
    })
}

/// Fetch and parse the world state once.
pub async fn fetch_world(client: &reqwest::Client, url: &str) -> Result<WorldPayload, SyncError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SyncError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(SyncError::Status(response.status().as_u16()));
    }

    let body = response.text().await.map_err(|e| SyncError::Network(e.to_string()))?;
    parse_payload(&body)
}

// =============================================================================
// ENTITY INDEX
// =============================================================================

/// Coordinate-keyed lookup of the entities currently on the map.
/// At most one entry per tile; later entities overwrite earlier ones.
#[derive(Clone, Debug, Default)]
pub struct EntityIndex {
    entries: BTreeMap<(usize, usize), Entity>,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear and repopulate from a full entity list. Multi-tile entities get one
    /// entry per sub-tile. Returns the number of placements dropped for lying
    /// outside `width` x `height`.
    pub fn rebuild(&mut self, entities: &[Entity], width: usize, height: usize) -> usize {
        self.entries.clear();
        let mut dropped = 0;

        for entity in entities {
            match &entity.tiles {
                Some(tiles) => {
                    for tile in tiles {
                        if !self.place(entity.project(tile), width, height) {
                            dropped += 1;
                        }
                    }
                }
                None => {
                    if !self.place(entity.clone(), width, height) {
                        dropped += 1;
                    }
                }
            }
        }

        if dropped > 0 {
            debug!("Dropped {} out-of-bounds entity placements", dropped);
        }
        dropped
    }

    fn place(&mut self, entity: Entity, width: usize, height: usize) -> bool {
        let [x, y] = entity.coordinates;
        if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
            return false;
        }
        self.entries.insert((x as usize, y as usize), entity);
        true
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&Entity> {
        self.entries.get(&(x, y))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &Entity)> {
        self.entries.iter().map(|(&pos, entity)| (pos, entity))
    }

    pub fn positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.keys().copied()
    }
}

// =============================================================================
// SYNC STATE
// =============================================================================

/// Result of one poll, tagged with the order in which it was requested
#[derive(Debug)]
pub struct SyncOutcome {
    pub seq: u64,
    pub result: Result<WorldPayload, SyncError>,
    pub elapsed: Duration,
}

/// What applying an outcome did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncApplied {
    /// Index rebuilt with this many entries
    Updated(usize),
    /// Older than an already applied response; ignored
    Stale,
    /// Fetch or parse failed; previous index kept
    Failed,
}

/// Owner of the live entity index
pub struct EntitySync {
    width: usize,
    height: usize,
    index: EntityIndex,
    last_applied_seq: Option<u64>,
    next_update_at: Option<Instant>,
    last_sync: Option<DateTime<Local>>,
    consecutive_failures: u32,
}

impl EntitySync {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            index: EntityIndex::new(),
            last_applied_seq: None,
            next_update_at: None,
            last_sync: None,
            consecutive_failures: 0,
        }
    }

    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    pub fn last_sync(&self) -> Option<DateTime<Local>> {
        self.last_sync
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Seconds until the server's next simulation step, if it told us.
    pub fn seconds_until_update(&self, now: Instant) -> Option<f64> {
        self.next_update_at
            .map(|at| at.saturating_duration_since(now).as_secs_f64())
    }

    /// Apply a poll result. Stale results are discarded; failures keep the
    /// previous index.
    pub fn apply(&mut self, outcome: SyncOutcome) -> SyncApplied {
        if self.last_applied_seq.is_some_and(|last| outcome.seq <= last) {
            debug!("Discarding stale sync response #{}", outcome.seq);
            return SyncApplied::Stale;
        }

        match outcome.result {
            Ok(payload) => {
                self.last_applied_seq = Some(outcome.seq);
                let count = self.apply_payload(&payload);
                debug!(
                    "Sync #{} completed in {:.2?} ({} tiles)",
                    outcome.seq, outcome.elapsed, count
                );
                SyncApplied::Updated(count)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Failed to fetch world data (#{}, {} in a row): {}",
                    outcome.seq, self.consecutive_failures, e
                );
                SyncApplied::Failed
            }
        }
    }

    /// Rebuild the index from a payload regardless of ordering.
    pub fn apply_payload(&mut self, payload: &WorldPayload) -> usize {
        self.index.rebuild(&payload.entities, self.width, self.height);
        self.next_update_at = payload
            .next_update_in
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| Instant::now() + Duration::from_secs_f64(s));
        self.last_sync = Some(Local::now());
        self.consecutive_failures = 0;
        self.index.len()
    }
}

/// Start polling on `handle`. Every tick spawns an independent fetch whose
/// outcome is sent to `tx`; slow fetches may overlap.
pub fn spawn_sync_task(
    handle: &Handle,
    config: SyncConfig,
    tx: Sender<SyncOutcome>,
) -> Result<JoinHandle<()>, SyncError> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| SyncError::Network(e.to_string()))?;

    let task = handle.spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq = 0u64;

        loop {
            ticker.tick().await;
            seq += 1;

            let client = client.clone();
            let url = config.endpoint.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let start = Instant::now();
                let result = fetch_world(&client, &url).await;
                let outcome = SyncOutcome { seq, result, elapsed: start.elapsed() };
                if tx.send(outcome).is_err() {
                    debug!("Sync receiver dropped, discarding response #{}", seq);
                }
            });
        }
    });

    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn entity(x: i64, y: i64, ch: &str) -> Entity {
        Entity {
            coordinates: [x, y],
            character: ch.to_string(),
            color: "#ff0000".to_string(),
            kind: Some("Dragon".to_string()),
            name: Some("Syrax".to_string()),
            life: Some(10.0),
            state: None,
            rotation: None,
            debug_info: Some(format!("{} at {},{}", ch, x, y)),
            tiles: None,
        }
    }

    fn ok(seq: u64, entities: Vec<Entity>) -> SyncOutcome {
        SyncOutcome {
            seq,
            result: Ok(WorldPayload { entities, next_update_in: None }),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_parse_full_payload() {
        let body = r##"{
            "entities": [
                {"type": "Dragon", "name": "Caraxes", "color": "#c00", "character": "D",
                 "coordinates": [3, 4], "life": 90, "rotation": 45.0,
                 "debug_info": "Caraxes type fire rotation 45.0°"},
                {"type": "City", "name": "Oldtown", "color": "#808080", "character": "₼",
                 "coordinates": [10, 10], "life": 1000, "settlement_type": "city",
                 "tiles": [[[9, 9], "#", "#808080"], [[10, 10], "Ѻ", "#808080"]]}
            ],
            "update_count": 12,
            "timestamp": 1700000000.5,
            "next_update_in": 0.4
        }"##;
        let payload = parse_payload(body).unwrap();
        assert_eq!(payload.entities.len(), 2);
        assert_eq!(payload.next_update_in, Some(0.4));
        let dragon = &payload.entities[0];
        assert_eq!(dragon.kind.as_deref(), Some("Dragon"));
        assert_eq!(dragon.rotation, Some(45.0));
        assert_eq!(dragon.glyph(), 'D');
        let city = &payload.entities[1];
        assert_eq!(city.tiles.as_ref().map(|t| t.len()), Some(2));
        assert_eq!(city.tiles.as_ref().unwrap()[1], SubTile([10, 10], "Ѻ".into(), "#808080".into()));
    }

    #[test]
    fn test_missing_entities_means_empty() {
        let payload = parse_payload(r#"{"update_count": 3}"#).unwrap();
        assert!(payload.entities.is_empty());
        assert_eq!(payload.next_update_in, None);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(parse_payload("<html>"), Err(SyncError::Parse(_))));
    }

    #[test]
    fn test_mistyped_hint_keeps_entities() {
        let body = r##"{"entities": [{"coordinates": [1, 1], "character": "a", "color": "#fff"}],
                       "next_update_in": "soon"}"##;
        let payload = parse_payload(body).unwrap();
        assert_eq!(payload.entities.len(), 1);
        assert_eq!(payload.next_update_in, None);

        let mut sync = EntitySync::new(10, 10);
        sync.apply(ok(1, vec![entity(5, 5, "old")]));
        let applied = sync.apply(SyncOutcome { seq: 2, result: Ok(payload), elapsed: Duration::ZERO });
        assert_eq!(applied, SyncApplied::Updated(1));
        assert!(sync.index().get(1, 1).is_some());
        assert!(sync.index().get(5, 5).is_none());
    }

    #[test]
    fn test_non_list_entities_means_empty() {
        let payload = parse_payload(r#"{"entities": {"a": 1}, "next_update_in": 4}"#).unwrap();
        assert!(payload.entities.is_empty());
        assert_eq!(payload.next_update_in, Some(4.0));
        assert!(parse_payload(r#"{"entities": null}"#).unwrap().entities.is_empty());
    }

    #[test]
    fn test_malformed_entity_is_skipped() {
        let body = r##"{"entities": [
            {"coordinates": [1, 1], "character": "a", "color": "#fff"},
            {"coordinates": "nowhere", "character": "b", "color": "#fff"}
        ]}"##;
        let payload = parse_payload(body).unwrap();
        assert_eq!(payload.entities.len(), 1);
        assert_eq!(payload.entities[0].character, "a");
    }

    #[test]
    fn test_distinct_entities_index_one_each() {
        let entities: Vec<Entity> = (0..5).map(|i| entity(i, i * 2, "x")).collect();
        let mut index = EntityIndex::new();
        index.rebuild(&entities, 20, 20);
        assert_eq!(index.len(), 5);
        for i in 0..5usize {
            assert!(index.get(i, i * 2).is_some());
        }
    }

    #[test]
    fn test_multi_tile_entity_expands() {
        let mut city = entity(5, 5, "₼");
        city.tiles = Some(vec![
            SubTile([4, 4], "#".into(), "#808080".into()),
            SubTile([5, 4], "═".into(), "#808080".into()),
            SubTile([5, 5], "Ѻ".into(), "#228B22".into()),
        ]);
        let mut index = EntityIndex::new();
        index.rebuild(&[city], 20, 20);

        assert_eq!(index.len(), 3);
        let square = index.get(5, 5).unwrap();
        assert_eq!(square.character, "Ѻ");
        assert_eq!(square.color, "#228B22");
        for (_, part) in index.iter() {
            assert_eq!(part.name.as_deref(), Some("Syrax"));
            assert_eq!(part.kind.as_deref(), Some("Dragon"));
            assert_eq!(part.life, Some(10.0));
        }
        assert_eq!(index.get(4, 4).unwrap().coordinates, [4, 4]);
    }

    #[test]
    fn test_collision_keeps_last() {
        let mut wall = entity(0, 0, "W");
        wall.tiles = Some(vec![SubTile([2, 2], "#".into(), "#fff".into())]);
        let first = entity(2, 2, "A");
        let last = entity(2, 2, "B");

        let mut index = EntityIndex::new();
        index.rebuild(&[first, wall.clone(), last], 10, 10);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(2, 2).unwrap().character, "B");

        index.rebuild(&[entity(2, 2, "A"), wall], 10, 10);
        assert_eq!(index.get(2, 2).unwrap().character, "#");
    }

    #[test]
    fn test_out_of_bounds_dropped() {
        let mut index = EntityIndex::new();
        let dropped = index.rebuild(&[entity(-1, 0, "a"), entity(10, 3, "b"), entity(9, 9, "c")], 10, 10);
        assert_eq!(dropped, 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_empty_payload_clears_index() {
        let mut sync = EntitySync::new(10, 10);
        assert_eq!(sync.apply(ok(1, vec![entity(1, 1, "a"), entity(2, 2, "b")])), SyncApplied::Updated(2));
        assert_eq!(sync.apply(ok(2, vec![])), SyncApplied::Updated(0));
        assert!(sync.index().is_empty());
        assert!(sync.last_sync().is_some());
    }

    #[test]
    fn test_failure_keeps_previous_index() {
        let mut sync = EntitySync::new(10, 10);
        sync.apply(ok(1, vec![entity(1, 1, "a")]));
        let failed = SyncOutcome {
            seq: 2,
            result: Err(SyncError::Network("connection refused".into())),
            elapsed: Duration::ZERO,
        };
        assert_eq!(sync.apply(failed), SyncApplied::Failed);
        assert_eq!(sync.index().len(), 1);
        assert_eq!(sync.consecutive_failures(), 1);

        sync.apply(ok(3, vec![]));
        assert_eq!(sync.consecutive_failures(), 0);
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut sync = EntitySync::new(10, 10);
        assert_eq!(sync.apply(ok(2, vec![entity(2, 2, "new")])), SyncApplied::Updated(1));
        assert_eq!(sync.apply(ok(1, vec![entity(1, 1, "old")])), SyncApplied::Stale);
        assert!(sync.index().get(2, 2).is_some());
        assert!(sync.index().get(1, 1).is_none());
    }

    #[test]
    fn test_next_update_countdown() {
        let mut sync = EntitySync::new(10, 10);
        assert_eq!(sync.seconds_until_update(Instant::now()), None);
        sync.apply_payload(&WorldPayload { entities: vec![], next_update_in: Some(5.0) });
        let remaining = sync.seconds_until_update(Instant::now()).unwrap();
        assert!(remaining > 4.0 && remaining <= 5.0);
    }

    #[test]
    fn test_tooltip_text_fallback() {
        let mut e = entity(3, 4, "D");
        assert_eq!(e.tooltip_text(), "D at 3,4");
        e.debug_info = None;
        assert_eq!(e.tooltip_text(), "Syrax (Dragon) at (3, 4)");
    }

    /// Serve `responses` one connection at a time, then stop.
    async fn serve(responses: Vec<(u16, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        format!("http://{}/api/world", addr)
    }

    #[tokio::test]
    async fn test_fetch_world_success() {
        let body = r##"{"entities": [{"coordinates": [1, 2], "character": "c", "color": "#fff"}], "next_update_in": 1.5}"##;
        let url = serve(vec![(200, body.to_string())]).await;
        let payload = fetch_world(&reqwest::Client::new(), &url).await.unwrap();
        assert_eq!(payload.entities.len(), 1);
        assert_eq!(payload.next_update_in, Some(1.5));
    }

    #[tokio::test]
    async fn test_fetch_world_bad_status() {
        let url = serve(vec![(500, "{}".to_string())]).await;
        let err = fetch_world(&reqwest::Client::new(), &url).await.unwrap_err();
        assert_eq!(err, SyncError::Status(500));
    }

    #[tokio::test]
    async fn test_fetch_world_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = fetch_world(&reqwest::Client::new(), &format!("http://{}/api/world", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
    }

    #[test]
    fn test_sync_task_delivers_sequenced_outcomes() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let body = r#"{"entities": []}"#.to_string();
        let url = runtime.block_on(serve(vec![(200, body.clone()), (200, body)]));

        let (tx, rx) = mpsc::channel();
        let config = SyncConfig {
            endpoint: url,
            interval: Duration::from_millis(50),
            timeout: Duration::from_secs(2),
        };
        let task = spawn_sync_task(runtime.handle(), config, tx).unwrap();

        let mut served = Vec::new();
        for _ in 0..10 {
            let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if outcome.result.is_ok() {
                served.push(outcome.seq);
            }
            if served.len() == 2 {
                break;
            }
        }
        task.abort();

        served.sort();
        assert_eq!(served.len(), 2);
        assert!(served[0] >= 1 && served[0] < served[1]);
    }
}
