use std::collections::HashMap;

use bevy_ecs::{name::Name, prelude::*};
use derive_more::{Deref, DerefMut};
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::basic::{
    branch_flow::{BranchFlow, Side},
    error::PowerFlowError,
    system::BusType,
};

/// Insertion index of a bus; breaks ties when buses are ordered by type.
#[derive(
    Debug, Component, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BusID(pub usize);

/// Type of a bus together with its one-way lock.
///
/// A bus declared Slack is locked and can no longer change type.
#[derive(Debug, Component, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusKind {
    kind: BusType,
    locked: bool,
}

impl BusKind {
    pub fn kind(&self) -> BusType {
        self.kind
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Changes the type of an unlocked bus. Becoming Slack locks it.
    pub fn change_type(&mut self, to: BusType) -> Result<(), PowerFlowError> {
        if self.locked {
            warn!(from = ?self.kind, to = ?to, "type change on a locked bus");
            return Err(PowerFlowError::TypeLocked(self.kind));
        }
        self.kind = to;
        if to == BusType::Slack {
            self.locked = true;
        }
        Ok(())
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }
}

/// Scheduled generation and demand of a bus in per unit.
#[derive(Debug, Component, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSchedule {
    pub generation: Complex64,
    pub demand: Complex64,
}

impl PowerSchedule {
    /// Net injection `(Pg - Pd) + j(Qg - Qd)`.
    #[inline]
    pub fn net(&self) -> Complex64 {
        self.generation - self.demand
    }
}

#[derive(Debug, Component, Clone, Copy, PartialEq, Deref, DerefMut, Serialize, Deserialize)]
pub struct VBusPu(pub Complex64);

impl Default for VBusPu {
    fn default() -> Self {
        VBusPu(Complex64::new(1.0, 0.0))
    }
}

/// Voltage set-point of PV and Slack buses; `va` (radians) is only used by
/// the slack.
#[derive(Debug, Component, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VSetpoint {
    pub vm: f64,
    pub va: f64,
}

impl Default for VSetpoint {
    fn default() -> Self {
        Self { vm: 1.0, va: 0.0 }
    }
}

/// Sum of the shunt contributions attached to a bus.
#[derive(Debug, Component, Clone, Copy, Default, PartialEq, Deref, DerefMut, Serialize, Deserialize)]
pub struct ShuntAdmittance(pub Complex64);

/// Operating limits of a bus; informational only.
#[derive(Debug, Component, Clone, Copy, PartialEq)]
pub struct OperatingLimits {
    pub p_min: f64,
    pub p_max: f64,
    pub q_min: f64,
    pub q_max: f64,
    pub v_min: f64,
    pub v_max: f64,
}

impl Default for OperatingLimits {
    fn default() -> Self {
        Self {
            p_min: f64::NEG_INFINITY,
            p_max: f64::INFINITY,
            q_min: f64::NEG_INFINITY,
            q_max: f64::INFINITY,
            v_min: 0.0,
            v_max: f64::INFINITY,
        }
    }
}

/// Branches incident to a bus and the terminal the bus sits on.
#[derive(Debug, Component, Clone, Default, Deref, DerefMut)]
pub struct ConnectedBranches(pub Vec<(Entity, Side)>);

/// Injection computed from the solved voltages.
#[derive(Debug, Component, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SBusResult(pub Complex64);

/// Generation reconstructed from demand, shunt and branch flows.
#[derive(Debug, Component, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SGenResult(pub Complex64);

#[derive(Bundle, Default)]
pub struct BusBundle {
    pub name: Name,
    pub id: BusID,
    pub kind: BusKind,
    pub schedule: PowerSchedule,
    pub v: VBusPu,
    pub v_set: VSetpoint,
    pub ys: ShuntAdmittance,
    pub limits: OperatingLimits,
    pub branches: ConnectedBranches,
    pub s_res: SBusResult,
    pub sg_res: SGenResult,
}

impl BusBundle {
    pub fn new(name: impl Into<String>, id: usize) -> Self {
        Self {
            name: Name::new(name.into()),
            id: BusID(id),
            ..Default::default()
        }
    }
}

/// Insertion index of a branch.
#[derive(
    Debug, Component, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BranchID(pub usize);

#[derive(Debug, Component, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BranchKind {
    Line,
    /// Off-nominal tap ratio on the `from` side.
    Transformer { tap: f64 },
}

/// Series admittance of a branch.
#[derive(Debug, Component, Clone, Copy, Default, PartialEq, Deref, DerefMut, Serialize, Deserialize)]
pub struct Admittance(pub Complex64);

/// Non-owning handles to the two buses of a branch.
#[derive(Debug, Component, Clone, Copy, PartialEq, Eq)]
pub struct Terminals {
    pub from: Entity,
    pub to: Entity,
}

impl Terminals {
    pub fn side_of(&self, bus: Entity) -> Option<Side> {
        if bus == self.from {
            Some(Side::From)
        } else if bus == self.to {
            Some(Side::To)
        } else {
            None
        }
    }
}

/// Rated current, used for reporting only.
#[derive(Debug, Component, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IRated(pub Option<f64>);

#[derive(Debug, Component, Clone, Copy, Default, PartialEq, Deref, DerefMut, Serialize, Deserialize)]
pub struct BranchResult(pub BranchFlow);

#[derive(Bundle)]
pub struct BranchBundle {
    pub name: Name,
    pub id: BranchID,
    pub kind: BranchKind,
    pub y: Admittance,
    pub terminals: Terminals,
    pub rated: IRated,
    pub result: BranchResult,
}

/// Resource that maps names to entities for one element family.
#[derive(Debug, Default, Clone)]
pub struct NameLookup {
    forward: HashMap<String, Entity>,
}

impl NameLookup {
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Entity> {
        self.forward.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.forward.contains_key(name)
    }

    pub(crate) fn insert(&mut self, name: &str, entity: Entity) {
        self.forward.insert(name.to_owned(), entity);
    }
}

#[derive(Debug, Default, Clone, Resource, Deref, DerefMut)]
pub struct NodeLookup(pub NameLookup);

#[derive(Debug, Default, Clone, Resource, Deref, DerefMut)]
pub struct BranchLookup(pub NameLookup);

/// System-wide base values.
#[derive(Debug, Clone, Copy, Resource, Serialize, Deserialize)]
pub struct PFCommonData {
    /// Power base in MVA; profile powers are divided by it.
    pub sbase: f64,
    /// Nominal frequency in Hz.
    pub freq: f64,
}

impl Default for PFCommonData {
    fn default() -> Self {
        Self {
            sbase: 1.0,
            freq: 50.0,
        }
    }
}

/// Shunts a transformer's tap adds at its `from` and `to` buses.
///
/// With a tap `k` on the `from` side the series admittance becomes `y/k` and
/// the remaining pi-model legs are `y(1-k)/k²` and `y(k-1)/k`.
pub fn tap_model(y: Complex64, tap: f64) -> (Complex64, Complex64, Complex64) {
    if tap == 1.0 {
        return (y, Complex64::zero(), Complex64::zero());
    }
    let series = y / tap;
    let from = y * (1.0 - tap) / (tap * tap);
    let to = y * (tap - 1.0) / tap;
    (series, from, to)
}
