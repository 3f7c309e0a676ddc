//! Butcher tableaus: structure checks, classification and stage assembly.

pub mod registry;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use registry::{Scheme, TableauRegistry};

/// Family of a Runge-Kutta scheme, derived from the shape of `A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RkType {
    Invalid,
    /// Explicit.
    Erk,
    /// Fully implicit.
    Irk,
    /// Diagonally implicit.
    Dirk,
    /// Singly diagonally implicit.
    Sdirk,
}

/// Coefficients `(A, b, c)` of an `s`-stage Runge-Kutta scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawTableau")]
pub struct ButcherTableau {
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: DVector<f64>,
    order: usize,
    #[serde(default)]
    description: String,
}

/// Unchecked wire form; deserialization goes through `ButcherTableau::new`.
#[derive(Deserialize)]
struct RawTableau {
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: DVector<f64>,
    order: usize,
    #[serde(default)]
    description: String,
}

impl TryFrom<RawTableau> for ButcherTableau {
    type Error = Error;

    fn try_from(raw: RawTableau) -> Result<Self> {
        Ok(ButcherTableau::new(raw.a, raw.b, raw.c, raw.order)?.with_description(raw.description))
    }
}

impl ButcherTableau {
    pub fn new(a: DMatrix<f64>, b: DVector<f64>, c: DVector<f64>, order: usize) -> Result<Self> {
        let s = a.nrows();
        if a.ncols() != s {
            return Err(Error::dimension("tableau A columns", s, a.ncols()));
        }
        if b.len() != s {
            return Err(Error::dimension("tableau b", s, b.len()));
        }
        if c.len() != s {
            return Err(Error::dimension("tableau c", s, c.len()));
        }
        if order < 1 {
            return Err(Error::InvalidOrder(order));
        }
        Ok(Self {
            a,
            b,
            c,
            order,
            description: String::new(),
        })
    }

    /// Builds a tableau from row-major `A`.
    pub fn from_rows(a: &[&[f64]], b: &[f64], c: &[f64], order: usize) -> Result<Self> {
        let s = a.len();
        let mut matrix = DMatrix::zeros(s, s);
        for (i, row) in a.iter().enumerate() {
            if row.len() != s {
                return Err(Error::dimension("tableau A row", s, row.len()));
            }
            for (j, value) in row.iter().enumerate() {
                matrix[(i, j)] = *value;
            }
        }
        Self::new(
            matrix,
            DVector::from_column_slice(b),
            DVector::from_column_slice(c),
            order,
        )
    }

    /// The tableau with no stages. It classifies as `Invalid`.
    pub fn empty() -> Self {
        Self {
            a: DMatrix::zeros(0, 0),
            b: DVector::zeros(0),
            c: DVector::zeros(0),
            order: 1,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn num_stages(&self) -> usize {
        self.a.nrows()
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn c(&self) -> &DVector<f64> {
        &self.c
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// No stages, or a weight vector that is identically zero.
    pub fn is_empty(&self) -> bool {
        self.num_stages() == 0 || self.b.iter().all(|v| *v == 0.0)
    }

    pub fn is_erk(&self) -> bool {
        self.erk_violation().is_none()
    }

    pub fn is_dirk(&self) -> bool {
        self.dirk_violation().is_none()
    }

    pub fn is_sdirk(&self) -> bool {
        self.sdirk_violation().is_none()
    }

    pub fn is_irk(&self) -> bool {
        !self.is_empty()
    }

    pub fn classify(&self) -> RkType {
        if self.is_empty() {
            RkType::Invalid
        } else if self.is_erk() {
            RkType::Erk
        } else if self.num_stages() == 1 {
            RkType::Irk
        } else if self.is_sdirk() {
            RkType::Sdirk
        } else if self.is_dirk() {
            RkType::Dirk
        } else if self.is_irk() {
            RkType::Irk
        } else {
            RkType::Invalid
        }
    }

    pub fn validate_erk(&self) -> Result<()> {
        match self.erk_violation() {
            None => Ok(()),
            Some(reason) => Err(Error::structural("ERK", reason)),
        }
    }

    pub fn validate_dirk(&self) -> Result<()> {
        match self.dirk_violation() {
            None => Ok(()),
            Some(reason) => Err(Error::structural("DIRK", reason)),
        }
    }

    pub fn validate_sdirk(&self) -> Result<()> {
        match self.sdirk_violation() {
            None => Ok(()),
            Some(reason) => Err(Error::structural("SDIRK", reason)),
        }
    }

    pub fn validate_irk(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::structural("IRK", "tableau is empty"));
        }
        Ok(())
    }

    fn erk_violation(&self) -> Option<String> {
        if self.is_empty() {
            return Some("tableau is empty".to_string());
        }
        let s = self.num_stages();
        for i in 0..s {
            for j in i..s {
                if self.a[(i, j)] != 0.0 {
                    return Some(format!("A[{i}][{j}] = {} is on or above the diagonal", self.a[(i, j)]));
                }
            }
        }
        if self.c[0] != 0.0 {
            return Some(format!("c[0] = {} is nonzero", self.c[0]));
        }
        None
    }

    fn dirk_violation(&self) -> Option<String> {
        if self.is_empty() {
            return Some("tableau is empty".to_string());
        }
        let s = self.num_stages();
        for i in 0..s {
            for j in (i + 1)..s {
                if self.a[(i, j)] != 0.0 {
                    return Some(format!("A[{i}][{j}] = {} is above the diagonal", self.a[(i, j)]));
                }
            }
        }
        None
    }

    fn sdirk_violation(&self) -> Option<String> {
        if let Some(reason) = self.dirk_violation() {
            return Some(reason);
        }
        let gamma = self.a[(0, 0)];
        (1..self.num_stages())
            .find(|&i| self.a[(i, i)] != gamma)
            .map(|i| format!("A[{i}][{i}] = {} differs from A[0][0] = {gamma}", self.a[(i, i)]))
    }

    /// Checks the classical order conditions up to `min(order, 3)`:
    /// `sum b = 1`, `b.c = 1/2`, `b.c^2 = 1/3` and `b.A.c = 1/6`.
    pub fn satisfies_order_conditions(&self, order: usize, tolerance: f64) -> bool {
        let close = |value: f64, target: f64| (value - target).abs() <= tolerance;
        if order >= 1 && !close(self.b.sum(), 1.0) {
            return false;
        }
        if order >= 2 && !close(self.b.dot(&self.c), 0.5) {
            return false;
        }
        if order >= 3 {
            let c_squared = self.c.component_mul(&self.c);
            if !close(self.b.dot(&c_squared), 1.0 / 3.0) {
                return false;
            }
            let ac = &self.a * &self.c;
            if !close(self.b.dot(&ac), 1.0 / 6.0) {
                return false;
            }
        }
        true
    }
}

impl PartialEq for ButcherTableau {
    fn eq(&self, other: &Self) -> bool {
        self.num_stages() == other.num_stages()
            && self.order == other.order
            && self.a == other.a
            && self.b == other.b
            && self.c == other.c
    }
}

fn check_blocks(x_base: &DVector<f64>, stages: &[DVector<f64>], s: usize) -> Result<()> {
    if stages.len() != s {
        return Err(Error::dimension("stage count", s, stages.len()));
    }
    if let Some(block) = stages.iter().find(|block| block.len() != x_base.len()) {
        return Err(Error::dimension("stage block", x_base.len(), block.len()));
    }
    Ok(())
}

/// State seen by stage `stage`: `x_base + dt * sum_j A[stage][j] * stages[j]`.
pub fn assemble_irk_state(
    stage: usize,
    a: &DMatrix<f64>,
    dt: f64,
    x_base: &DVector<f64>,
    stages: &[DVector<f64>],
) -> Result<DVector<f64>> {
    let s = a.nrows();
    if a.ncols() != s {
        return Err(Error::dimension("tableau A columns", s, a.ncols()));
    }
    if stage >= s {
        return Err(Error::index("stage index", stage, s));
    }
    check_blocks(x_base, stages, s)?;

    let mut out = x_base.clone();
    for (j, block) in stages.iter().enumerate() {
        out.axpy(dt * a[(stage, j)], block, 1.0);
    }
    Ok(out)
}

/// Step result: `x_base + dt * sum_j b[j] * stages[j]`.
pub fn assemble_irk_solution(
    b: &DVector<f64>,
    dt: f64,
    x_base: &DVector<f64>,
    stages: &[DVector<f64>],
) -> Result<DVector<f64>> {
    check_blocks(x_base, stages, b.len())?;

    let mut out = x_base.clone();
    for (j, block) in stages.iter().enumerate() {
        out.axpy(dt * b[j], block, 1.0);
    }
    Ok(out)
}
