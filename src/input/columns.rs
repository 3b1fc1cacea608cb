use polars::prelude::DataFrame;
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::error::{EscalaResult, InputError};

/// Required columns of the employee table (`matricula` keyed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum EmployeeCol {
    #[strum(serialize = "matricula")]
    Matricula,
    #[strum(serialize = "tipo_contrato")]
    TipoContrato,
    #[strum(serialize = "ciclo")]
    Ciclo,
    #[strum(serialize = "l_total")]
    LTotal,
    #[strum(serialize = "l_dom")]
    LDom,
    #[strum(serialize = "l_dom_salsa")]
    LDomSalsa,
    #[strum(serialize = "c2d")]
    C2d,
    #[strum(serialize = "c3d")]
    C3d,
    #[strum(serialize = "l_d")]
    LD,
    #[strum(serialize = "cxx")]
    Cxx,
    #[strum(serialize = "vz")]
    Vz,
    #[strum(serialize = "l_res")]
    LRes,
    #[strum(serialize = "l_res2")]
    LRes2,
}

/// Required columns of the calendar table (row per worker-day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum CalendarCol {
    #[strum(serialize = "colaborador")]
    Colaborador,
    #[strum(serialize = "data")]
    Data,
    #[strum(serialize = "ww")]
    Ww,
    #[strum(serialize = "wd")]
    Wd,
    #[strum(serialize = "dia_tipo")]
    DiaTipo,
    #[strum(serialize = "tipo_turno")]
    TipoTurno,
}

/// Required columns of the demand table (row per day-shift).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum DemandCol {
    #[strum(serialize = "data")]
    Data,
    #[strum(serialize = "turno")]
    Turno,
    #[strum(serialize = "pess_obj")]
    PessObj,
    #[strum(serialize = "min_turno")]
    MinTurno,
    #[strum(serialize = "max_turno")]
    MaxTurno,
    #[strum(serialize = "wday")]
    Wday,
}

impl EmployeeCol {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl CalendarCol {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl DemandCol {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

// Optional columns; their absence is not an error.
pub const EMPLOYEE_ROLE: &str = "funcao";
pub const EMPLOYEE_HIRE_DATE: &str = "data_admissao";
pub const EMPLOYEE_TERMINATION_DATE: &str = "data_demissao";
pub const CALENDAR_HOURS: &str = "horas";

/// Fails with the first missing required column of `table`.
pub fn require_columns<I: IntoIterator<Item = &'static str>>(
    df: &DataFrame,
    table: &'static str,
    required: I,
) -> EscalaResult<()> {
    for column in required {
        if df.column(column).is_err() {
            return Err(InputError::MissingColumn {
                table,
                column: column.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

pub fn employee_required() -> impl Iterator<Item = &'static str> {
    EmployeeCol::iter().map(EmployeeCol::as_str)
}

pub fn calendar_required() -> impl Iterator<Item = &'static str> {
    CalendarCol::iter().map(CalendarCol::as_str)
}

pub fn demand_required() -> impl Iterator<Item = &'static str> {
    DemandCol::iter().map(DemandCol::as_str)
}
