//! wf-aml: algebraic modeling layer for the hydraulic solve.
//!
//! A [`Model`] holds named variables (unknowns), parameters (data that can
//! change between solves without a rebuild) and constraints (scalar
//! expressions that should evaluate to zero). After
//! [`Model::finalize_structure`] the model exposes a dense residual vector
//! and a sparse Jacobian whose entries come from symbolic derivatives of
//! each constraint, derived once per structure version.
//!
//! # Example
//!
//! ```
//! use wf_aml::{Expr, Model};
//!
//! let mut model = Model::new();
//! let x = model.declare_variable("x", 3.0).unwrap();
//! let c = model.declare_parameter("c", 4.0).unwrap();
//! model
//!     .declare_constraint("square", Expr::var(x) * Expr::var(x) - Expr::param(c))
//!     .unwrap();
//! model.finalize_structure().unwrap();
//!
//! let r = model.evaluate_residuals().unwrap();
//! assert_eq!(r[0], 5.0);
//! let j = model.evaluate_jacobian().unwrap();
//! assert_eq!(j.get(0, 0), Some(&6.0));
//! ```

pub mod error;
pub mod expr;
pub mod ids;
pub mod model;

pub use error::{AmlError, AmlResult};
pub use expr::{EvalContext, Expr, Func};
pub use ids::{ConId, ParamId, VarId};
pub use model::Model;
