//! Per-map tile cache.
//!
//! Holds every known submap tile tagged with a version number, decides which
//! tiles need their raster (re)fetched, and evicts tiles that fall out of the
//! authoritative set on a full resync. Versions are compared strictly (`>`)
//! when deciding to fetch — re-announcing an already-known version must not
//! trigger redundant traffic — but texture commits accept equality so a
//! retried fetch for the same version still applies.
//!
//! The store is deliberately synchronous: all mutation happens on the owning
//! map view's event turn. The asynchronous part of the pipeline lives in the
//! view, which re-validates against this store before committing a decoded
//! raster (stale-write rejection).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use image::GrayImage;

use crate::protocol::{MapDataMessage, Pose2, SubmapId};

/// Decoded occupancy raster plus its physical resolution in metres per pixel.
#[derive(Debug)]
pub struct TileRaster {
    pub image: GrayImage,
    pub resolution: f64,
}

#[derive(Debug, Default)]
pub struct Tile {
    version: u64,
    global_pose: Option<Pose2>,
    submap_pose: Option<Pose2>,
    raster: Option<Arc<TileRaster>>,
}

impl Tile {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn global_pose(&self) -> Option<Pose2> {
        self.global_pose
    }

    pub fn submap_pose(&self) -> Option<Pose2> {
        self.submap_pose
    }

    pub fn raster(&self) -> Option<&Arc<TileRaster>> {
        self.raster.as_ref()
    }

    /// A tile is rendering-visible only once it has both a pose and pixels.
    pub fn is_visible(&self) -> bool {
        self.global_pose.is_some() && self.raster.is_some()
    }
}

/// Result of absorbing one metadata update.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MapDataOutcome {
    /// Keys whose raster must be (re)fetched, already filtered against
    /// outstanding fetches for an unadvanced version.
    pub fetch: Vec<SubmapId>,
    /// Keys whose global pose was set or overwritten (full resync only).
    pub poses_changed: Vec<SubmapId>,
    /// Keys evicted because the resync's authoritative set omitted them.
    pub evicted: Vec<SubmapId>,
    /// Whether this update was a full resync.
    pub resynced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The tile's stored version moved past the payload while it decoded.
    SupersededVersion,
    /// The tile was evicted while the payload was in flight or decoding.
    TileEvicted,
}

pub struct TileStore {
    map_id: String,
    have_version: u64,
    tiles: HashMap<SubmapId, Tile>,
    /// Keys with an outstanding texture request, mapped to the highest
    /// version requested so far. Cleared when any payload for the key
    /// arrives.
    in_flight: HashMap<SubmapId, u64>,
}

impl TileStore {
    pub fn new(map_id: impl Into<String>) -> Self {
        Self {
            map_id: map_id.into(),
            have_version: 0,
            tiles: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    /// Generation last fully absorbed; only advances on a full resync.
    pub fn have_version(&self) -> u64 {
        self.have_version
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, key: &SubmapId) -> Option<&Tile> {
        self.tiles.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SubmapId> {
        self.tiles.keys()
    }

    pub fn has_in_flight(&self, key: &SubmapId) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Absorb a server-pushed metadata update.
    ///
    /// Stored versions are bumped at accept time, before the raster itself is
    /// fetched, so a tile can transiently report a newer version than its
    /// currently-held raster. Changing this would alter fetch-triggering
    /// semantics; see the version comparisons below.
    pub fn apply_map_data(&mut self, update: &MapDataMessage) -> MapDataOutcome {
        let mut outcome = MapDataOutcome {
            resynced: update.is_new_map_version,
            ..MapDataOutcome::default()
        };

        // On a full resync every currently-known key starts out obsolete and
        // must re-earn its place by appearing in the authoritative list.
        let mut candidate_obsolete: Option<HashSet<SubmapId>> = update
            .is_new_map_version
            .then(|| self.tiles.keys().copied().collect());

        for entry in &update.submaps {
            let key = entry.submap_id;
            let tile = self.tiles.entry(key).or_default();

            if entry.version > tile.version {
                tile.version = entry.version;
                let outstanding = self.in_flight.get(&key).copied();
                if outstanding.is_none_or(|requested| entry.version > requested) {
                    self.in_flight.insert(key, entry.version);
                    outcome.fetch.push(key);
                }
            }

            if update.is_new_map_version {
                if let Some(pose) = entry.global_pose {
                    tile.global_pose = Some(pose);
                    outcome.poses_changed.push(key);
                }
                if let Some(obsolete) = candidate_obsolete.as_mut() {
                    obsolete.remove(&key);
                }
            }
        }

        if update.is_new_map_version {
            self.have_version = update.map_version;
            if let Some(obsolete) = candidate_obsolete {
                for key in obsolete {
                    self.tiles.remove(&key);
                    self.in_flight.remove(&key);
                    outcome.evicted.push(key);
                }
            }
        }

        outcome
    }

    /// Record that a texture payload for `key` has come back, whatever its
    /// version: the fetch is no longer outstanding.
    pub fn note_texture_arrival(&mut self, key: SubmapId) {
        self.in_flight.remove(&key);
    }

    /// Commit a decoded raster, unless the tile moved on while the payload
    /// was in flight or decoding. Equal versions are accepted so a retried
    /// fetch for the current version still lands.
    pub fn commit_texture(
        &mut self,
        key: SubmapId,
        version: u64,
        raster: Arc<TileRaster>,
        submap_pose: Pose2,
    ) -> CommitOutcome {
        let Some(tile) = self.tiles.get_mut(&key) else {
            return CommitOutcome::TileEvicted;
        };
        if tile.version > version {
            return CommitOutcome::SupersededVersion;
        }
        tile.version = version;
        tile.raster = Some(raster);
        tile.submap_pose = Some(submap_pose);
        CommitOutcome::Committed
    }
}
