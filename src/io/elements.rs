use num_complex::Complex64;
use tracing::warn;

use super::{ParseError, profile::Record};
use crate::basic::{
    ecs::{elements::OperatingLimits, network::PowerGrid},
    error::PowerFlowError,
    system::BusType,
};

/// A profile record decoded into a network element.
///
/// Powers are in MW / MVAr and are divided by the system base when applied;
/// impedances, admittances and voltages are per unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    SysBase(f64),
    SysFreq(f64),
    Line {
        name: String,
        from: String,
        to: String,
        r: f64,
        x: f64,
        b_half: f64,
        i_rated: Option<f64>,
    },
    Transformer {
        name: String,
        from: String,
        to: String,
        r: f64,
        x: f64,
        tap: f64,
        i_rated: Option<f64>,
    },
    Shunt {
        name: String,
        bus: String,
        g: f64,
        b: f64,
    },
    Load {
        name: String,
        bus: String,
        p: f64,
        q: f64,
    },
    Generator {
        name: String,
        bus: String,
        p: f64,
        q: f64,
    },
    GeneratorPV {
        name: String,
        bus: String,
        p: f64,
        v: f64,
    },
    Slack {
        name: String,
        bus: String,
        v: f64,
        theta_deg: f64,
    },
    GeneratorLimits {
        name: String,
        bus: String,
        p_min: f64,
        p_max: f64,
        q_min: f64,
        q_max: f64,
        v_min: Option<f64>,
        v_max: Option<f64>,
    },
}

fn positive(rec: &Record, idx: usize, field: &'static str) -> Result<f64, ParseError> {
    let value = rec.f64_field(idx, field)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ParseError::InvalidNumber {
            line: rec.line,
            field,
            value: rec.tokens[idx].clone(),
        })
    }
}

impl Element {
    pub fn from_record(rec: &Record) -> Result<Self, ParseError> {
        let name = || rec.str_field(1, "name").map(str::to_owned);
        let bus = || rec.str_field(2, "bus").map(str::to_owned);
        let element = match rec.keyword() {
            "SYSBASE" => Element::SysBase(positive(rec, 1, "S_base")?),
            "SYSFREQ" => Element::SysFreq(positive(rec, 1, "frequency")?),
            "THLINE" => Element::Line {
                name: name()?,
                from: bus()?,
                to: rec.str_field(3, "to")?.to_owned(),
                r: rec.f64_field(4, "R")?,
                x: rec.f64_field(5, "X")?,
                b_half: rec.f64_field(6, "B/2")?,
                i_rated: rec.opt_f64_field(7, "Irated")?,
            },
            "THTRFO" => Element::Transformer {
                name: name()?,
                from: bus()?,
                to: rec.str_field(3, "to")?.to_owned(),
                r: rec.f64_field(4, "R")?,
                x: rec.f64_field(5, "X")?,
                tap: positive(rec, 6, "k")?,
                i_rated: rec.opt_f64_field(7, "Irated")?,
            },
            "THSHUNT" => Element::Shunt {
                name: name()?,
                bus: bus()?,
                g: rec.f64_field(3, "G")?,
                b: rec.f64_field(4, "B")?,
            },
            "THLOAD" => Element::Load {
                name: name()?,
                bus: bus()?,
                p: rec.f64_field(3, "P")?,
                q: rec.f64_field(4, "Q")?,
            },
            "GENER" => Element::Generator {
                name: name()?,
                bus: bus()?,
                p: rec.f64_field(3, "P")?,
                q: rec.f64_field(4, "Q")?,
            },
            "GENERCV" => Element::GeneratorPV {
                name: name()?,
                bus: bus()?,
                p: rec.f64_field(3, "P")?,
                v: positive(rec, 4, "V")?,
            },
            "THSLACK" => Element::Slack {
                name: name()?,
                bus: bus()?,
                v: positive(rec, 3, "V")?,
                theta_deg: rec.opt_f64_field(4, "theta")?.unwrap_or(0.0),
            },
            "GENERDATA" => Element::GeneratorLimits {
                name: name()?,
                bus: bus()?,
                p_min: rec.f64_field(3, "Pmin")?,
                p_max: rec.f64_field(4, "Pmax")?,
                q_min: rec.f64_field(5, "Qmin")?,
                q_max: rec.f64_field(6, "Qmax")?,
                v_min: rec.opt_f64_field(7, "Vmin")?,
                v_max: rec.opt_f64_field(8, "Vmax")?,
            },
            other => {
                return Err(ParseError::UnknownRecord {
                    line: rec.line,
                    keyword: other.to_owned(),
                });
            }
        };
        Ok(element)
    }

    /// Applies the element to `grid`, creating referenced buses as PQ buses.
    pub fn apply(&self, grid: &mut PowerGrid) -> Result<(), PowerFlowError> {
        let sbase = grid.common().sbase;
        match self {
            Element::SysBase(s) => grid.common_mut().sbase = *s,
            Element::SysFreq(f) => grid.common_mut().freq = *f,
            Element::Line {
                name,
                from,
                to,
                r,
                x,
                b_half,
                i_rated,
            } => {
                grid.add_line(name, from, to, Complex64::new(*r, *x), *b_half, *i_rated)?;
            }
            Element::Transformer {
                name,
                from,
                to,
                r,
                x,
                tap,
                i_rated,
            } => {
                grid.add_transformer(name, from, to, Complex64::new(*r, *x), *tap, *i_rated)?;
            }
            Element::Shunt { bus, g, b, .. } => {
                let bus = grid.bus_or_insert(bus);
                grid.add_shunt(bus, Complex64::new(*g, *b));
            }
            Element::Load { bus, p, q, .. } => {
                let bus = grid.bus_or_insert(bus);
                grid.add_demand(bus, Complex64::new(*p, *q) / sbase);
            }
            Element::Generator { bus, p, q, .. } => {
                let bus = grid.bus_or_insert(bus);
                grid.add_generation(bus, Complex64::new(*p, *q) / sbase);
            }
            Element::GeneratorPV { name, bus, p, v } => {
                let entity = grid.bus_or_insert(bus);
                grid.add_generation(entity, Complex64::new(*p / sbase, 0.0));
                match grid.set_bus_type(entity, BusType::PV) {
                    Ok(()) => grid.set_voltage_setpoint(entity, *v),
                    Err(err) => warn!(generator = %name, bus = %bus, %err, "kept bus type"),
                }
            }
            Element::Slack {
                bus, v, theta_deg, ..
            } => {
                let bus = grid.bus_or_insert(bus);
                grid.set_slack(bus, *v, theta_deg.to_radians())?;
            }
            Element::GeneratorLimits {
                bus,
                p_min,
                p_max,
                q_min,
                q_max,
                v_min,
                v_max,
                ..
            } => {
                let defaults = OperatingLimits::default();
                let bus = grid.bus_or_insert(bus);
                grid.set_limits(
                    bus,
                    OperatingLimits {
                        p_min: p_min / sbase,
                        p_max: p_max / sbase,
                        q_min: q_min / sbase,
                        q_max: q_max / sbase,
                        v_min: v_min.unwrap_or(defaults.v_min),
                        v_max: v_max.unwrap_or(defaults.v_max),
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        basic::ecs::network::DataOps,
        basic::ecs::elements::{PowerSchedule, ShuntAdmittance, VSetpoint},
        io::profile::Profile,
    };
    use approx::assert_abs_diff_eq;

    fn element(line: &str) -> Result<Element, ParseError> {
        Element::from_record(&Profile::parse(line).records()[0])
    }

    #[test]
    fn line_record_with_optional_rating() {
        let e = element("THLINE L1 A B 0.01 0.1 0.02 1.5").unwrap();
        assert_eq!(
            e,
            Element::Line {
                name: "L1".into(),
                from: "A".into(),
                to: "B".into(),
                r: 0.01,
                x: 0.1,
                b_half: 0.02,
                i_rated: Some(1.5)
            }
        );
        assert!(matches!(
            element("THLINE L1 A B 0.01 0.1"),
            Err(ParseError::MissingField { field: "B/2", .. })
        ));
    }

    #[test]
    fn non_positive_tap_is_rejected() {
        assert!(matches!(
            element("THTRFO T1 A B 0 0.1 0"),
            Err(ParseError::InvalidNumber { field: "k", .. })
        ));
    }

    #[test]
    fn powers_are_scaled_by_base() {
        let mut grid = PowerGrid::default();
        element("SYSBASE 100").unwrap().apply(&mut grid).unwrap();
        element("THLOAD D1 B 50 20").unwrap().apply(&mut grid).unwrap();
        element("GENER G1 B 10 0").unwrap().apply(&mut grid).unwrap();
        element("THSHUNT S1 B 0 0.19").unwrap().apply(&mut grid).unwrap();
        let bus = grid.bus("B").unwrap();
        let schedule = grid.get::<PowerSchedule>(bus).unwrap();
        assert_abs_diff_eq!(schedule.demand.re, 0.5);
        assert_abs_diff_eq!(schedule.demand.im, 0.2);
        assert_abs_diff_eq!(schedule.net().re, -0.4);
        // shunts are already per unit
        assert_abs_diff_eq!(grid.get::<ShuntAdmittance>(bus).unwrap().0.im, 0.19);
    }

    #[test]
    fn pv_record_leaves_slack_alone() {
        let mut grid = PowerGrid::default();
        element("THSLACK S1 A 1.05 0").unwrap().apply(&mut grid).unwrap();
        element("GENERCV G1 A 10 1.0").unwrap().apply(&mut grid).unwrap();
        assert_eq!(grid.bus_kind("A").unwrap().kind(), BusType::Slack);
        let a = grid.bus("A").unwrap();
        assert_eq!(grid.get::<VSetpoint>(a).unwrap().vm, 1.05);

        element("GENERCV G2 B 20 1.03").unwrap().apply(&mut grid).unwrap();
        let b = grid.bus("B").unwrap();
        assert_eq!(grid.bus_kind("B").unwrap().kind(), BusType::PV);
        assert_eq!(grid.get::<VSetpoint>(b).unwrap().vm, 1.03);
    }

    #[test]
    fn slack_angle_is_in_degrees() {
        let mut grid = PowerGrid::default();
        element("THSLACK S1 A 1.0 30").unwrap().apply(&mut grid).unwrap();
        let v = grid.voltage("A").unwrap();
        assert_abs_diff_eq!(v.arg(), 30f64.to_radians(), epsilon = 1e-12);
    }
}
