//! `battle_unit`: animation timing and anchor points of battle creature sprites.

use serde::Deserialize;
use serde_json::Value;

use crate::graphics::sprite::AnimationSequence;

/// Battle animation groups by their legacy group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BattleAnimation {
    Move,
    Nervous,
    StandStill,
    PainRanged,
    PainMelee,
    Death,
    Death2,
    Turning,
    MeleeUp,
    MeleeCenter,
    MeleeDown,
    RangedUp,
    RangedCenter,
    RangedDown,
    MagicUp,
    MagicCenter,
    MagicDown,
    MoveStart,
    MoveFinish,
}

impl BattleAnimation {
    fn from_group(group_id: i32) -> Option<Self> {
        use BattleAnimation::*;
        Some(match group_id {
            0 => Move,
            1 => Nervous,
            2 => StandStill,
            3 => PainRanged,
            4 => PainMelee,
            5 => Death,
            6 => Death2,
            7 => Turning,
            11 => MeleeUp,
            12 => MeleeCenter,
            13 => MeleeDown,
            14 => RangedUp,
            15 => RangedCenter,
            16 => RangedDown,
            17 => MagicUp,
            18 => MagicCenter,
            19 => MagicDown,
            20 => MoveStart,
            21 => MoveFinish,
            _ => return None,
        })
    }

    /// Base cycle duration in milliseconds.
    fn base_duration(self) -> i32 {
        use BattleAnimation::*;
        match self {
            Move => 500,
            Nervous | StandStill | Turning | MoveStart | MoveFinish => 100,
            MeleeUp | MeleeCenter | MeleeDown | RangedUp | RangedCenter | RangedDown
            | MagicUp | MagicCenter | MagicDown => 500,
            PainMelee | PainRanged => 400,
            Death => 600,
            Death2 => 1000,
        }
    }

    fn per_frame(self) -> bool {
        use BattleAnimation::*;
        matches!(self, Turning | StandStill | Nervous | MoveStart | MoveFinish)
    }

    /// Index into the `speed` parameter list.
    fn speed_slot(self) -> Option<usize> {
        use BattleAnimation::*;
        match self {
            Move | MoveStart | MoveFinish => Some(0),
            StandStill => Some(1),
            Nervous => Some(2),
            _ => None,
        }
    }

    /// Index of the action point pair.
    fn action_point_pair(self) -> Option<usize> {
        use BattleAnimation::*;
        match self {
            RangedUp => Some(0),
            RangedCenter => Some(1),
            RangedDown => Some(2),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BattleUnitParams {
    wide: bool,
    /// Relative speed in percent for move, stand and nervous animations.
    speed: Vec<i32>,
    action_points: Option<Vec<i32>>,
    special: Option<i32>,
}

const WIDE_SHIFT: (i32, i32) = (6, -10);
const NARROW_SHIFT: (i32, i32) = (30, -10);

pub(super) fn battle_unit(
    group_id: i32,
    mut sequence: AnimationSequence,
    params: &Value,
) -> AnimationSequence {
    let params: BattleUnitParams = super::parse_params("battle_unit", params);
    let animation = BattleAnimation::from_group(group_id);
    if animation.is_none() {
        log::warn!("Group {} is not a battle animation", group_id);
    }

    let mut duration = animation.map_or(1000, BattleAnimation::base_duration);
    if animation.is_some_and(BattleAnimation::per_frame) {
        duration *= sequence.frames.len() as i32;
    }
    let relative_speed = animation
        .and_then(BattleAnimation::speed_slot)
        .and_then(|slot| params.speed.get(slot).copied())
        .unwrap_or(100);
    sequence.params.animation_cycle_duration = duration * relative_speed / 100;

    if let Some(points) = &params.action_points {
        let special = params.special.unwrap_or(4);
        let pair = animation
            .and_then(BattleAnimation::action_point_pair)
            .and_then(|pair| Some((*points.get(pair * 2)?, *points.get(pair * 2 + 1)?)));
        if let Some(point) = pair {
            sequence.params.action_point = Some(point);
            sequence.params.special_frame_index = special;
        }
    }

    let shift = if params.wide { WIDE_SHIFT } else { NARROW_SHIFT };
    for frame in sequence.frames.iter_mut() {
        frame.padding.0 += shift.0;
        frame.padding.1 += shift.1;
    }
    sequence
}
