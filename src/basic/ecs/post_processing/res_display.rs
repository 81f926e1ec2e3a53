use std::fmt;

use tabled::Tabled;

/// A wrapper around a float that limits the number of decimal places when printed.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FloatWrapper {
    pub(crate) value: f64,
    pub(crate) precision: usize, // Number of decimal places to display
}

impl FloatWrapper {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl Default for FloatWrapper {
    fn default() -> Self {
        Self {
            value: Default::default(),
            precision: 3,
        }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_infinite() {
            return write!(f, "{}", if self.value > 0.0 { "inf" } else { "-inf" });
        }
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Table row for bus results; powers in MW / MVAr.
#[derive(Debug, Tabled)]
#[allow(non_snake_case)]
pub(crate) struct BusResTable {
    pub(crate) Bus: String,
    pub(crate) Type: String,
    pub(crate) P_mw: FloatWrapper,
    pub(crate) Q_mvar: FloatWrapper,
    pub(crate) Vm: FloatWrapper,
    pub(crate) Va: FloatWrapper,
    pub(crate) Pd_mw: FloatWrapper,
    pub(crate) Qd_mvar: FloatWrapper,
    pub(crate) Pg_mw: FloatWrapper,
    pub(crate) Qg_mvar: FloatWrapper,
    pub(crate) Q_range: String,
    pub(crate) V_range: String,
}

/// Table row for branch results; phasors printed as `magnitude∠degrees`.
#[derive(Debug, Tabled)]
pub(crate) struct BranchResTable {
    pub(crate) name: String,
    pub(crate) from: String,
    pub(crate) to: String,
    pub(crate) y: String,
    pub(crate) flow_mva: String,
    pub(crate) loss_mva: String,
    pub(crate) current: String,
    pub(crate) i_rated: String,
}
