use bevy_app::prelude::*;
use bevy_ecs::{component::Mutable, name::Name, prelude::*, world::error::EntityMutableFetchError};
use num_complex::Complex64;
use tracing::debug;

use super::{elements::*, plugin::PowerFlowPlugin, systems::*};
use crate::basic::{
    branch_flow::{BranchFlow, Side},
    error::PowerFlowError,
    method::SolveReport,
    system::BusType,
};

#[derive(Clone, SystemSet, Debug, Hash, PartialEq, Eq)]
pub enum SolverStage {
    BeforeSolve,
    Solve,
    AfterSolve,
}

/// Represents the power grid, managing the ECS world for power flow calculations.
///
/// Buses and branches are entities of the world; they refer to each other by
/// `Entity` handle and are looked up by name through [`NodeLookup`] and
/// [`BranchLookup`].
pub struct PowerGrid {
    data_storage: App,
}

impl Default for PowerGrid {
    fn default() -> Self {
        let mut app = App::new();
        app.add_plugins(PowerFlowPlugin);
        Self { data_storage: app }
    }
}

/// Trait for performing operations on ECS data, such as getting and mutating components of entities.
pub trait DataOps {
    fn get_entity_mut(
        &mut self,
        entity: Entity,
    ) -> Result<EntityWorldMut<'_>, EntityMutableFetchError>;
    fn get_mut<T>(&'_ mut self, entity: Entity) -> Option<Mut<'_, T>>
    where
        T: Component<Mutability = Mutable>;
    fn get<T>(&self, entity: Entity) -> Option<&T>
    where
        T: Component;
    fn world_mut(&mut self) -> &mut World;
    fn world(&self) -> &World;
}

/// Trait for running the power flow on the stored network.
pub trait PowerFlow {
    /// Rebuilds the working tables, solves with the configured formulation and
    /// recovers the branch flows.
    ///
    /// A solve that stops at the iteration cap is `Ok` with
    /// `converged == false`; voltages of the last iterate are still written
    /// back.
    fn run_pf(&mut self) -> Result<SolveReport, PowerFlowError>;

    /// Result of the last run, if any.
    fn pf_result(&self) -> Option<&PowerFlowResult>;
}

impl PowerFlow for PowerGrid {
    fn run_pf(&mut self) -> Result<SolveReport, PowerFlowError> {
        self.app_mut().update();
        self.pf_result()
            .and_then(|x| x.outcome.clone())
            .unwrap_or(Err(PowerFlowError::NotInitialized))
    }

    fn pf_result(&self) -> Option<&PowerFlowResult> {
        self.world().get_resource::<PowerFlowResult>()
    }
}

impl PowerGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(&self) -> &App {
        &self.data_storage
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.data_storage
    }

    pub fn config(&self) -> &PowerFlowConfig {
        self.world().resource::<PowerFlowConfig>()
    }

    pub fn config_mut(&mut self) -> Mut<'_, PowerFlowConfig> {
        self.world_mut().resource_mut::<PowerFlowConfig>()
    }

    pub fn common(&self) -> &PFCommonData {
        self.world().resource::<PFCommonData>()
    }

    pub fn common_mut(&mut self) -> Mut<'_, PFCommonData> {
        self.world_mut().resource_mut::<PFCommonData>()
    }

    pub fn bus(&self, name: &str) -> Option<Entity> {
        self.world().resource::<NodeLookup>().get(name)
    }

    pub fn branch(&self, name: &str) -> Option<Entity> {
        self.world().resource::<BranchLookup>().get(name)
    }

    pub fn bus_count(&self) -> usize {
        self.world().resource::<NodeLookup>().len()
    }

    pub fn branch_count(&self) -> usize {
        self.world().resource::<BranchLookup>().len()
    }

    /// Returns the bus called `name`, creating a flat-start PQ bus on first
    /// reference.
    pub fn bus_or_insert(&mut self, name: &str) -> Entity {
        if let Some(entity) = self.bus(name) {
            return entity;
        }
        let id = self.bus_count();
        let entity = self.world_mut().spawn(BusBundle::new(name, id)).id();
        self.world_mut()
            .resource_mut::<NodeLookup>()
            .insert(name, entity);
        debug!(bus = name, id, "bus created");
        entity
    }

    /// Adds a series branch between two buses, creating them if needed.
    pub fn add_branch(
        &mut self,
        name: &str,
        from: &str,
        to: &str,
        kind: BranchKind,
        y: Complex64,
        i_rated: Option<f64>,
    ) -> Result<Entity, PowerFlowError> {
        if self.branch(name).is_some() {
            return Err(PowerFlowError::DuplicateBranch(name.to_owned()));
        }
        let from = self.bus_or_insert(from);
        let to = self.bus_or_insert(to);
        let id = self.branch_count();
        let entity = self
            .world_mut()
            .spawn(BranchBundle {
                name: Name::new(name.to_owned()),
                id: BranchID(id),
                kind,
                y: Admittance(y),
                terminals: Terminals { from, to },
                rated: IRated(i_rated),
                result: BranchResult::default(),
            })
            .id();
        self.world_mut()
            .resource_mut::<BranchLookup>()
            .insert(name, entity);
        for (bus, side) in [(from, Side::From), (to, Side::To)] {
            if let Some(mut connected) = self.get_mut::<ConnectedBranches>(bus) {
                connected.push((entity, side));
            }
        }
        Ok(entity)
    }

    /// Adds a pi-model line with series impedance `z` and half line charging
    /// susceptance `b_half` at each end.
    pub fn add_line(
        &mut self,
        name: &str,
        from: &str,
        to: &str,
        z: Complex64,
        b_half: f64,
        i_rated: Option<f64>,
    ) -> Result<Entity, PowerFlowError> {
        let entity = self.add_branch(name, from, to, BranchKind::Line, z.inv(), i_rated)?;
        let charging = Complex64::new(0.0, b_half);
        for bus in [from, to] {
            let bus = self.bus_or_insert(bus);
            self.add_shunt(bus, charging);
        }
        Ok(entity)
    }

    /// Adds a transformer with series impedance `z` and off-nominal tap `tap`
    /// on the `from` side.
    pub fn add_transformer(
        &mut self,
        name: &str,
        from: &str,
        to: &str,
        z: Complex64,
        tap: f64,
        i_rated: Option<f64>,
    ) -> Result<Entity, PowerFlowError> {
        let (series, y_from, y_to) = tap_model(z.inv(), tap);
        let kind = BranchKind::Transformer { tap };
        let entity = self.add_branch(name, from, to, kind, series, i_rated)?;
        let (from, to) = (self.bus_or_insert(from), self.bus_or_insert(to));
        self.add_shunt(from, y_from);
        self.add_shunt(to, y_to);
        Ok(entity)
    }

    pub fn add_shunt(&mut self, bus: Entity, ys: Complex64) {
        if let Some(mut shunt) = self.get_mut::<ShuntAdmittance>(bus) {
            shunt.0 += ys;
        }
    }

    pub fn add_demand(&mut self, bus: Entity, s: Complex64) {
        if let Some(mut schedule) = self.get_mut::<PowerSchedule>(bus) {
            schedule.demand += s;
        }
    }

    pub fn add_generation(&mut self, bus: Entity, s: Complex64) {
        if let Some(mut schedule) = self.get_mut::<PowerSchedule>(bus) {
            schedule.generation += s;
        }
    }

    pub fn set_bus_type(&mut self, bus: Entity, kind: BusType) -> Result<(), PowerFlowError> {
        match self.get_mut::<BusKind>(bus) {
            Some(mut current) => current.change_type(kind),
            None => Err(PowerFlowError::NotInitialized),
        }
    }

    pub fn set_voltage_setpoint(&mut self, bus: Entity, vm: f64) {
        if let Some(mut v_set) = self.get_mut::<VSetpoint>(bus) {
            v_set.vm = vm;
        }
    }

    /// Declares `bus` the reference bus at `vm∠va` (radians) and locks its type.
    pub fn set_slack(&mut self, bus: Entity, vm: f64, va: f64) -> Result<(), PowerFlowError> {
        self.set_bus_type(bus, BusType::Slack)?;
        if let Some(mut v_set) = self.get_mut::<VSetpoint>(bus) {
            *v_set = VSetpoint { vm, va };
        }
        if let Some(mut v) = self.get_mut::<VBusPu>(bus) {
            v.0 = Complex64::from_polar(vm, va);
        }
        Ok(())
    }

    pub fn set_limits(&mut self, bus: Entity, limits: OperatingLimits) {
        if let Some(mut current) = self.get_mut::<OperatingLimits>(bus) {
            *current = limits;
        }
    }

    /// Solved (or last iterate) voltage of a bus.
    pub fn voltage(&self, name: &str) -> Option<Complex64> {
        self.bus(name).and_then(|e| self.get::<VBusPu>(e)).map(|v| v.0)
    }

    /// Injection computed from the voltages of the last run.
    pub fn injection(&self, name: &str) -> Option<Complex64> {
        self.bus(name)
            .and_then(|e| self.get::<SBusResult>(e))
            .map(|s| s.0)
    }

    /// Generation reconstructed by the last run.
    pub fn generation(&self, name: &str) -> Option<Complex64> {
        self.bus(name)
            .and_then(|e| self.get::<SGenResult>(e))
            .map(|s| s.0)
    }

    pub fn bus_kind(&self, name: &str) -> Option<BusKind> {
        self.bus(name).and_then(|e| self.get::<BusKind>(e)).copied()
    }

    pub fn branch_result(&self, name: &str) -> Option<BranchFlow> {
        self.branch(name)
            .and_then(|e| self.get::<BranchResult>(e))
            .map(|r| r.0)
    }

    /// Sum of branch losses of the last run.
    pub fn total_loss(&self) -> Complex64 {
        self.pf_result().map(|r| r.total_loss).unwrap_or_default()
    }
}

impl DataOps for PowerGrid {
    fn world(&self) -> &World {
        self.app().world()
    }
    fn world_mut(&mut self) -> &mut World {
        self.app_mut().world_mut()
    }
    fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world().get(entity)
    }
    fn get_mut<T: Component>(&'_ mut self, entity: Entity) -> Option<Mut<'_, T>>
    where
        T: Component<Mutability = Mutable>,
    {
        self.world_mut().get_mut(entity)
    }
    fn get_entity_mut(
        &mut self,
        entity: Entity,
    ) -> Result<EntityWorldMut<'_>, EntityMutableFetchError> {
        self.world_mut().get_entity_mut(entity)
    }
}
