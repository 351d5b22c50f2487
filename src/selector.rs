//! Chooses which tracked body controls the effect.
//!
//! Every frame each slot gets a quality score. The controlling slot is kept
//! until another slot beats it by the hysteresis ratio, so two people with
//! near-equal scores don't make control flicker between them.

use crate::types::{Frame, Joint, SkeletonSnapshot, Vector4, SKELETON_COUNT};

/// Selector tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    /// Where a performer's shoulder center ideally sits, sensor space.
    pub ideal_center: Vector4,
    /// Distance from `ideal_center` at which centeredness reaches zero (meters).
    pub max_center_distance: f32,
    /// A challenger must exceed the current slot's total score by this factor.
    pub hysteresis: f32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            ideal_center: Vector4::point(0.0, 0.2, 2.5),
            max_center_distance: 2.0,
            hysteresis: 1.05,
        }
    }
}

/// Per-slot quality scores, each in [0, 1]. All zero when the slot is untracked.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlotScores {
    pub centeredness: f32,
    pub joint_quality: f32,
    pub movement_amount: f32,
}

impl SlotScores {
    pub fn total(&self) -> f32 {
        self.centeredness + self.joint_quality + self.movement_amount
    }
}

/// Score one skeleton snapshot.
///
/// Joint quality and movement amount are flat 1.0 for any tracked body;
/// only centeredness discriminates between candidates.
pub fn score_skeleton(config: &SelectorConfig, skeleton: &SkeletonSnapshot) -> SlotScores {
    if !skeleton.is_tracked() {
        return SlotScores::default();
    }
    let dist = skeleton
        .joint(Joint::ShoulderCenter)
        .distance(&config.ideal_center);
    SlotScores {
        centeredness: (1.0 - dist / config.max_center_distance).clamp(0.0, 1.0),
        joint_quality: 1.0,
        movement_amount: 1.0,
    }
}

pub struct SkeletonSelector {
    config: SelectorConfig,
    scores: [SlotScores; SKELETON_COUNT],
    current: Option<usize>,
}

impl SkeletonSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            scores: [SlotScores::default(); SKELETON_COUNT],
            current: None,
        }
    }

    /// Slot selected by the last call to [`select`](Self::select).
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn scores(&self) -> &[SlotScores; SKELETON_COUNT] {
        &self.scores
    }

    /// Rescore every slot and return the slot that controls the effect this frame.
    pub fn select(&mut self, frame: &Frame) -> Option<usize> {
        for (score, skeleton) in self.scores.iter_mut().zip(frame.skeletons.iter()) {
            *score = score_skeleton(&self.config, skeleton);
        }

        let previous = self.current;
        let kept = previous.filter(|&slot| frame.skeletons[slot].is_tracked());

        self.current = match kept {
            Some(current) => {
                let bar = self.scores[current].total() * self.config.hysteresis;
                match self.best_slot(frame, Some(current)) {
                    Some(challenger) if self.scores[challenger].total() > bar => Some(challenger),
                    _ => Some(current),
                }
            }
            None => self.best_slot(frame, None),
        };

        if self.current != previous {
            log::debug!("Controlling slot {:?} -> {:?}", previous, self.current);
        }
        self.current
    }

    /// Highest-scoring tracked slot; the lowest index wins ties.
    fn best_slot(&self, frame: &Frame, exclude: Option<usize>) -> Option<usize> {
        let mut best: Option<usize> = None;
        for slot in frame.tracked_slots() {
            if Some(slot) == exclude {
                continue;
            }
            match best {
                Some(b) if self.scores[slot].total() > self.scores[b].total() => best = Some(slot),
                None => best = Some(slot),
                _ => {}
            }
        }
        best
    }
}

impl Default for SkeletonSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}
