//! Per-map vehicle indicator overlay.
//!
//! Each pose broadcast carries the complete set of vehicles on the map, so
//! reconciliation is a key-set diff against the previous broadcast: survivors
//! update in place, newcomers get an indicator seeded with their keep-out
//! radius, and vehicles absent from the broadcast are removed.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::protocol::{Pose2, VehiclePose};

/// On-map representation of one vehicle's live pose.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub vehicle_id: String,
    pub pose: Pose2,
    /// Drawn once from vehicle metadata at creation; never re-read.
    pub keep_out_radius: f64,
    pub label: String,
}

/// Ids touched by one broadcast, in the order the sink should be notified.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct IndicatorSet {
    indicators: HashMap<String, Indicator>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, vehicle_id: &str) -> Option<&Indicator> {
        self.indicators.get(vehicle_id)
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Absorb one pose broadcast. `radius_of` consults the vehicle directory
    /// for newcomers only; a vehicle unknown to the directory still gets an
    /// indicator, with a zero radius.
    pub fn reconcile(
        &mut self,
        poses: &[VehiclePose],
        radius_of: impl Fn(&str) -> Option<f64>,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        let mut obsolete: HashSet<String> = self.indicators.keys().cloned().collect();

        for vehicle_pose in poses {
            let id = &vehicle_pose.vehicle_id;
            obsolete.remove(id);

            match self.indicators.get_mut(id) {
                Some(indicator) => {
                    indicator.pose = vehicle_pose.pose;
                    indicator.label = indicator_label(id, vehicle_pose.pose);
                    outcome.updated.push(id.clone());
                }
                None => {
                    let keep_out_radius = radius_of(id).unwrap_or_else(|| {
                        debug!(vehicle_id = %id, "vehicle missing from directory, radius 0");
                        0.0
                    });
                    self.indicators.insert(
                        id.clone(),
                        Indicator {
                            vehicle_id: id.clone(),
                            pose: vehicle_pose.pose,
                            keep_out_radius,
                            label: indicator_label(id, vehicle_pose.pose),
                        },
                    );
                    outcome.created.push(id.clone());
                }
            }
        }

        for id in obsolete {
            self.indicators.remove(&id);
            outcome.removed.push(id);
        }

        outcome
    }
}

/// Label text: id, position to one decimal, heading in whole degrees.
pub fn indicator_label(vehicle_id: &str, pose: Pose2) -> String {
    format!(
        "{}\n{:.1}\n{:.1}\n{:.0}°",
        vehicle_id,
        pose.x,
        pose.y,
        pose.r.to_degrees()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(x: f64, y: f64, r: f64) -> Pose2 {
        Pose2::new(x, y, r)
    }

    fn broadcast(entries: &[(&str, Pose2)]) -> Vec<VehiclePose> {
        entries
            .iter()
            .map(|(id, p)| VehiclePose {
                vehicle_id: (*id).to_string(),
                pose: *p,
            })
            .collect()
    }

    #[test]
    fn consecutive_broadcasts_diff_cleanly() {
        let mut set = IndicatorSet::new();

        let first = set.reconcile(
            &broadcast(&[("a", pose(0.0, 0.0, 0.0)), ("b", pose(1.0, 0.0, 0.0))]),
            |_| Some(0.4),
        );
        assert_eq!(first.created.len(), 2);
        assert!(first.updated.is_empty() && first.removed.is_empty());

        let second = set.reconcile(
            &broadcast(&[("b", pose(1.5, 0.0, 0.0)), ("c", pose(2.0, 0.0, 0.0))]),
            |_| Some(0.4),
        );
        assert_eq!(second.created, vec!["c".to_string()]);
        assert_eq!(second.updated, vec!["b".to_string()]);
        assert_eq!(second.removed, vec!["a".to_string()]);

        assert_eq!(set.len(), 2);
        assert!(set.get("a").is_none());
        assert_eq!(set.get("b").unwrap().pose.x, 1.5);
    }

    #[test]
    fn radius_is_seeded_once_and_never_reread() {
        let mut set = IndicatorSet::new();
        set.reconcile(&broadcast(&[("a", pose(0.0, 0.0, 0.0))]), |_| Some(0.7));
        assert_eq!(set.get("a").unwrap().keep_out_radius, 0.7);

        // Directory changes afterwards; the indicator keeps its radius.
        set.reconcile(&broadcast(&[("a", pose(1.0, 0.0, 0.0))]), |_| Some(9.9));
        assert_eq!(set.get("a").unwrap().keep_out_radius, 0.7);
    }

    #[test]
    fn unknown_vehicle_defaults_to_zero_radius() {
        let mut set = IndicatorSet::new();
        let outcome = set.reconcile(&broadcast(&[("ghost", pose(0.0, 0.0, 0.0))]), |_| None);
        assert_eq!(outcome.created, vec!["ghost".to_string()]);
        assert_eq!(set.get("ghost").unwrap().keep_out_radius, 0.0);
    }

    #[test]
    fn empty_broadcast_removes_everything() {
        let mut set = IndicatorSet::new();
        set.reconcile(
            &broadcast(&[("a", pose(0.0, 0.0, 0.0)), ("b", pose(1.0, 0.0, 0.0))]),
            |_| Some(0.4),
        );
        let outcome = set.reconcile(&broadcast(&[]), |_| Some(0.4));
        assert_eq!(outcome.removed.len(), 2);
        assert!(set.is_empty());
    }

    #[test]
    fn label_formats_position_and_heading() {
        let label = indicator_label("agv1", pose(1.25, -3.04, std::f64::consts::FRAC_PI_2));
        assert_eq!(label, "agv1\n1.2\n-3.0\n90°");
    }
}
