use bevy_ecs::{name::Name, prelude::*, system::RunSystemOnce};
use tabled::{Table, settings::Style};

mod res_display;
use res_display::*;

use super::{elements::*, network::*, systems::PowerFlowResult};
use crate::basic::complex::format_polar;

fn range(min: f64, max: f64, scale: f64) -> String {
    format!(
        "{}..{}",
        FloatWrapper::new(min * scale, 2),
        FloatWrapper::new(max * scale, 2)
    )
}

/// Renders the bus results of the last run, ordered by insertion.
fn bus_table(
    q: Query<(
        &Name,
        &BusID,
        &BusKind,
        &VBusPu,
        &SBusResult,
        &PowerSchedule,
        &SGenResult,
        &OperatingLimits,
    )>,
    common: Res<PFCommonData>,
) -> String {
    let sbase = common.sbase;
    let rows = q
        .iter()
        .sort::<&BusID>()
        .map(|(name, _, kind, v, s, schedule, sg, limits)| BusResTable {
            Bus: name.as_str().to_owned(),
            Type: format!("{:?}", kind.kind()),
            P_mw: FloatWrapper::new(s.0.re * sbase, 3),
            Q_mvar: FloatWrapper::new(s.0.im * sbase, 3),
            Vm: FloatWrapper::new(v.0.norm(), 5),
            Va: FloatWrapper::new(v.0.arg().to_degrees(), 4),
            Pd_mw: FloatWrapper::new(schedule.demand.re * sbase, 3),
            Qd_mvar: FloatWrapper::new(schedule.demand.im * sbase, 3),
            Pg_mw: FloatWrapper::new(sg.0.re * sbase, 3),
            Qg_mvar: FloatWrapper::new(sg.0.im * sbase, 3),
            Q_range: range(limits.q_min, limits.q_max, sbase),
            V_range: range(limits.v_min, limits.v_max, 1.0),
        });
    Table::new(rows).with(Style::markdown()).to_string()
}

/// Renders the branch results of the last run, ordered by insertion.
fn branch_table(
    q: Query<(
        &Name,
        &BranchID,
        &Terminals,
        &Admittance,
        &BranchResult,
        &IRated,
    )>,
    buses: Query<&Name, With<BusID>>,
    common: Res<PFCommonData>,
) -> String {
    let sbase = common.sbase;
    let bus_name = |e: Entity| {
        buses
            .get(e)
            .map(|n| n.as_str().to_owned())
            .unwrap_or_else(|_| format!("{e}"))
    };
    let rows = q
        .iter()
        .sort::<&BranchID>()
        .map(|(name, _, t, y, res, rated)| BranchResTable {
            name: name.as_str().to_owned(),
            from: bus_name(t.from),
            to: bus_name(t.to),
            y: format_polar(y.0, 4),
            flow_mva: format_polar(res.flow * sbase, 3),
            loss_mva: format_polar(res.loss * sbase, 4),
            current: format_polar(res.current, 4),
            i_rated: rated
                .0
                .map(|x| FloatWrapper::new(x, 3).to_string())
                .unwrap_or_else(|| "-".to_owned()),
        });
    Table::new(rows).with(Style::markdown()).to_string()
}

fn loss_summary(res: Res<PowerFlowResult>, common: Res<PFCommonData>) -> String {
    let loss = res.total_loss * common.sbase;
    format!(
        "Total loss: {} MW, {} MVAr",
        FloatWrapper::new(loss.re, 4),
        FloatWrapper::new(loss.im, 4)
    )
}

/// Trait for reporting the results of a power flow run.
pub trait PostProcessing {
    /// Markdown table of bus voltages, injections and generation.
    fn bus_table(&mut self) -> String;

    /// Markdown table of branch flows, losses and currents.
    fn branch_table(&mut self) -> String;

    /// Network-wide loss as real and reactive parts.
    fn loss_summary(&mut self) -> String;

    fn print_res_bus(&mut self) {
        println!("{}", self.bus_table());
    }

    fn print_res_branch(&mut self) {
        println!("{}", self.branch_table());
    }
}

impl PostProcessing for PowerGrid {
    fn bus_table(&mut self) -> String {
        self.world_mut()
            .run_system_once(bus_table)
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "bus_table report failed");
                String::new()
            })
    }

    fn branch_table(&mut self) -> String {
        self.world_mut()
            .run_system_once(branch_table)
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "branch_table report failed");
                String::new()
            })
    }

    fn loss_summary(&mut self) -> String {
        self.world_mut()
            .run_system_once(loss_summary)
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "loss_summary report failed");
                String::new()
            })
    }
}
