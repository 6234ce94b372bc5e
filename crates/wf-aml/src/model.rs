//! Variable/parameter/constraint registry with residual and Jacobian
//! evaluation.

use std::collections::{BTreeSet, HashMap};

use nalgebra::DVector;
use sprs::{CsMat, TriMat};
use tracing::debug;

use crate::error::{AmlError, AmlResult};
use crate::expr::{EvalContext, Expr};
use crate::ids::{ConId, ParamId, VarId};

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    value: f64,
}

#[derive(Debug, Clone)]
struct Parameter {
    name: String,
    value: f64,
}

#[derive(Debug, Clone)]
struct Constraint {
    name: String,
    expr: Expr,
}

/// One Jacobian row: (column, symbolic partial) in column order.
#[derive(Debug, Clone)]
struct Row {
    con: ConId,
    entries: Vec<(usize, Expr)>,
}

/// Indices and derivatives fixed by `finalize_structure`.
#[derive(Debug, Clone)]
struct Structure {
    /// Column -> variable
    columns: Vec<VarId>,
    /// Variable slot -> column
    column_of: Vec<Option<usize>>,
    rows: Vec<Row>,
}

/// Registry of named variables, parameters and constraints.
///
/// Declarations are addressed by handles that stay valid for the life of the
/// model. Vector positions (columns for variables, rows for constraints)
/// follow insertion order and are only assigned by
/// [`Model::finalize_structure`]; any declaration or removal of a variable
/// or constraint invalidates them until the next finalize.
#[derive(Debug, Clone, Default)]
pub struct Model {
    vars: Vec<Option<Variable>>,
    params: Vec<Parameter>,
    cons: Vec<Option<Constraint>>,
    var_names: HashMap<String, VarId>,
    param_names: HashMap<String, ParamId>,
    con_names: HashMap<String, ConId>,
    structure: Option<Structure>,
    structure_version: u64,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremented by every successful `finalize_structure`.
    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    pub fn is_finalized(&self) -> bool {
        self.structure.is_some()
    }

    fn structure(&self) -> AmlResult<&Structure> {
        self.structure.as_ref().ok_or(AmlError::NotInitialized)
    }

    /// Number of columns in the variable vector.
    pub fn num_variables(&self) -> usize {
        self.var_names.len()
    }

    /// Number of rows in the residual vector.
    pub fn num_constraints(&self) -> usize {
        self.con_names.len()
    }

    pub fn declare_variable(&mut self, name: impl Into<String>, initial: f64) -> AmlResult<VarId> {
        let name = name.into();
        if self.var_names.contains_key(&name) {
            return Err(AmlError::AlreadyExists {
                kind: "variable",
                name,
            });
        }
        let id = VarId::new(self.vars.len());
        self.var_names.insert(name.clone(), id);
        self.vars.push(Some(Variable {
            name,
            value: initial,
        }));
        self.structure = None;
        Ok(id)
    }

    /// Declare a parameter. Parameters never change the structure.
    pub fn declare_parameter(&mut self, name: impl Into<String>, value: f64) -> AmlResult<ParamId> {
        let name = name.into();
        if self.param_names.contains_key(&name) {
            return Err(AmlError::AlreadyExists {
                kind: "parameter",
                name,
            });
        }
        let id = ParamId::new(self.params.len());
        self.param_names.insert(name.clone(), id);
        self.params.push(Parameter { name, value });
        Ok(id)
    }

    /// Declare a constraint `expr = 0`.
    pub fn declare_constraint(&mut self, name: impl Into<String>, expr: Expr) -> AmlResult<ConId> {
        let name = name.into();
        if self.con_names.contains_key(&name) {
            return Err(AmlError::AlreadyExists {
                kind: "constraint",
                name,
            });
        }
        let mut vars = BTreeSet::new();
        expr.collect_vars(&mut vars);
        if let Some(v) = vars.iter().find(|v| self.var(**v).is_none()) {
            return Err(AmlError::NotFound {
                kind: "variable",
                name: v.to_string(),
            });
        }
        let mut params = BTreeSet::new();
        expr.collect_params(&mut params);
        if let Some(p) = params.iter().find(|p| p.slot() >= self.params.len()) {
            return Err(AmlError::NotFound {
                kind: "parameter",
                name: p.to_string(),
            });
        }
        let id = ConId::new(self.cons.len());
        self.con_names.insert(name.clone(), id);
        self.cons.push(Some(Constraint { name, expr }));
        self.structure = None;
        Ok(id)
    }

    pub fn remove_constraint(&mut self, name: &str) -> AmlResult<()> {
        let id = self.con_names.remove(name).ok_or_else(|| AmlError::NotFound {
            kind: "constraint",
            name: name.to_string(),
        })?;
        self.cons[id.slot()] = None;
        self.structure = None;
        Ok(())
    }

    /// Remove a variable that no remaining constraint references.
    pub fn remove_variable(&mut self, name: &str) -> AmlResult<()> {
        let id = self.var_id(name)?;
        if let Some(c) = self.cons.iter().flatten().find(|c| c.expr.depends_on(id)) {
            return Err(AmlError::VariableInUse {
                variable: name.to_string(),
                constraint: c.name.clone(),
            });
        }
        self.var_names.remove(name);
        self.vars[id.slot()] = None;
        self.structure = None;
        Ok(())
    }

    /// Assign vector positions in insertion order, fix the Jacobian sparsity
    /// pattern and derive the symbolic partials for every nonzero.
    pub fn finalize_structure(&mut self) -> AmlResult<()> {
        let mut column_of = vec![None; self.vars.len()];
        let mut columns = Vec::with_capacity(self.var_names.len());
        for (slot, var) in self.vars.iter().enumerate() {
            if var.is_some() {
                column_of[slot] = Some(columns.len());
                columns.push(VarId::new(slot));
            }
        }

        let mut rows = Vec::with_capacity(self.con_names.len());
        let mut nnz = 0;
        for (slot, con) in self.cons.iter().enumerate() {
            let Some(con) = con else { continue };
            let mut deps = BTreeSet::new();
            con.expr.collect_vars(&mut deps);
            let mut entries = Vec::with_capacity(deps.len());
            for v in deps {
                let col = column_of
                    .get(v.slot())
                    .copied()
                    .flatten()
                    .ok_or_else(|| AmlError::NotFound {
                        kind: "variable",
                        name: v.to_string(),
                    })?;
                entries.push((col, con.expr.derivative(v)));
            }
            nnz += entries.len();
            rows.push(Row {
                con: ConId::new(slot),
                entries,
            });
        }

        self.structure_version += 1;
        debug!(
            variables = columns.len(),
            constraints = rows.len(),
            nnz,
            version = self.structure_version,
            "finalized model structure"
        );
        self.structure = Some(Structure {
            columns,
            column_of,
            rows,
        });
        Ok(())
    }

    fn values(&self) -> (Vec<f64>, Vec<f64>) {
        let vars = self
            .vars
            .iter()
            .map(|v| v.as_ref().map_or(f64::NAN, |v| v.value))
            .collect();
        let params = self.params.iter().map(|p| p.value).collect();
        (vars, params)
    }

    fn constraint_name_of(&self, id: ConId) -> String {
        self.cons
            .get(id.slot())
            .and_then(Option::as_ref)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Residual of every constraint at the current variable values.
    pub fn evaluate_residuals(&self) -> AmlResult<DVector<f64>> {
        let structure = self.structure()?;
        let (vars, params) = self.values();
        let ctx = EvalContext {
            vars: &vars,
            params: &params,
        };
        let mut r = DVector::zeros(structure.rows.len());
        for (i, row) in structure.rows.iter().enumerate() {
            let value = self
                .cons
                .get(row.con.slot())
                .and_then(Option::as_ref)
                .map_or(f64::NAN, |c| c.expr.eval(&ctx));
            if !value.is_finite() {
                return Err(AmlError::NonFinite {
                    constraint: self.constraint_name_of(row.con),
                    value,
                });
            }
            r[i] = value;
        }
        Ok(r)
    }

    /// Jacobian in CSR form over the fixed sparsity pattern.
    pub fn evaluate_jacobian(&self) -> AmlResult<CsMat<f64>> {
        let structure = self.structure()?;
        let (vars, params) = self.values();
        let ctx = EvalContext {
            vars: &vars,
            params: &params,
        };
        let mut tri = TriMat::new((structure.rows.len(), structure.columns.len()));
        for (i, row) in structure.rows.iter().enumerate() {
            for (col, partial) in &row.entries {
                let value = partial.eval(&ctx);
                if !value.is_finite() {
                    return Err(AmlError::NonFinite {
                        constraint: self.constraint_name_of(row.con),
                        value,
                    });
                }
                tri.add_triplet(i, *col, value);
            }
        }
        Ok(tri.to_csr())
    }

    /// (row, column) positions of the Jacobian nonzeros.
    pub fn jacobian_pattern(&self) -> AmlResult<Vec<(usize, usize)>> {
        let structure = self.structure()?;
        Ok(structure
            .rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.entries.iter().map(move |(col, _)| (i, *col)))
            .collect())
    }

    pub fn get_variable_vector(&self) -> AmlResult<DVector<f64>> {
        let structure = self.structure()?;
        Ok(DVector::from_iterator(
            structure.columns.len(),
            structure
                .columns
                .iter()
                .map(|v| self.var(*v).map_or(f64::NAN, |var| var.value)),
        ))
    }

    pub fn set_variable_vector(&mut self, x: &DVector<f64>) -> AmlResult<()> {
        let structure = self.structure.as_ref().ok_or(AmlError::NotInitialized)?;
        if x.len() != structure.columns.len() {
            return Err(AmlError::DimensionMismatch {
                expected: structure.columns.len(),
                actual: x.len(),
            });
        }
        for (col, v) in structure.columns.iter().enumerate() {
            if let Some(Some(var)) = self.vars.get_mut(v.slot()) {
                var.value = x[col];
            }
        }
        Ok(())
    }

    fn var(&self, id: VarId) -> Option<&Variable> {
        self.vars.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn var_id(&self, name: &str) -> AmlResult<VarId> {
        self.var_names.get(name).copied().ok_or_else(|| AmlError::NotFound {
            kind: "variable",
            name: name.to_string(),
        })
    }

    pub fn param_id(&self, name: &str) -> AmlResult<ParamId> {
        self.param_names.get(name).copied().ok_or_else(|| AmlError::NotFound {
            kind: "parameter",
            name: name.to_string(),
        })
    }

    pub fn variable(&self, id: VarId) -> AmlResult<f64> {
        self.var(id).map(|v| v.value).ok_or_else(|| AmlError::NotFound {
            kind: "variable",
            name: id.to_string(),
        })
    }

    pub fn variable_value(&self, name: &str) -> AmlResult<f64> {
        self.variable(self.var_id(name)?)
    }

    pub fn set_variable(&mut self, id: VarId, value: f64) -> AmlResult<()> {
        match self.vars.get_mut(id.slot()) {
            Some(Some(var)) => {
                var.value = value;
                Ok(())
            }
            _ => Err(AmlError::NotFound {
                kind: "variable",
                name: id.to_string(),
            }),
        }
    }

    pub fn parameter(&self, id: ParamId) -> AmlResult<f64> {
        self.params
            .get(id.slot())
            .map(|p| p.value)
            .ok_or_else(|| AmlError::NotFound {
                kind: "parameter",
                name: id.to_string(),
            })
    }

    /// Update a parameter; the structure is untouched.
    pub fn set_parameter(&mut self, id: ParamId, value: f64) -> AmlResult<()> {
        let param = self.params.get_mut(id.slot()).ok_or_else(|| AmlError::NotFound {
            kind: "parameter",
            name: id.to_string(),
        })?;
        param.value = value;
        Ok(())
    }

    pub fn parameter_name(&self, id: ParamId) -> Option<&str> {
        self.params.get(id.slot()).map(|p| p.name.as_str())
    }

    /// Column of a variable in the finalized structure.
    pub fn column(&self, id: VarId) -> Option<usize> {
        self.structure
            .as_ref()
            .and_then(|s| s.column_of.get(id.slot()).copied().flatten())
    }

    /// Name of the variable at `column`.
    pub fn variable_name(&self, column: usize) -> Option<&str> {
        let id = *self.structure.as_ref()?.columns.get(column)?;
        self.var(id).map(|v| v.name.as_str())
    }

    /// Name of the constraint at residual `row`.
    pub fn constraint_name(&self, row: usize) -> Option<&str> {
        let con = self.structure.as_ref()?.rows.get(row)?.con;
        self.cons
            .get(con.slot())
            .and_then(Option::as_ref)
            .map(|c| c.name.as_str())
    }

    /// Constraint names in residual order.
    pub fn constraint_names(&self) -> AmlResult<Vec<&str>> {
        let structure = self.structure()?;
        Ok(structure
            .rows
            .iter()
            .filter_map(|row| self.cons.get(row.con.slot()).and_then(Option::as_ref))
            .map(|c| c.name.as_str())
            .collect())
    }
}
