//! Scalar expression trees with constant folding and symbolic derivatives.

use std::collections::BTreeSet;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::ids::{ParamId, VarId};

/// Unary functions available inside expressions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Func {
    Abs,
    /// -1, 0 or 1
    Sign,
    Exp,
    Ln,
    Sqrt,
    /// `sign(x) * |x|^p`
    SignedPow(f64),
    /// `|x|^p`
    AbsPow(f64),
}

impl Func {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Abs => x.abs(),
            Func::Sign => sign(x),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Sqrt => x.sqrt(),
            Func::SignedPow(p) => sign(x) * x.abs().powf(p),
            Func::AbsPow(p) => x.abs().powf(p),
        }
    }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Variable and parameter values, indexed by declaration slot.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub vars: &'a [f64],
    pub params: &'a [f64],
}

/// A scalar expression over variables, parameters and constants.
///
/// Build expressions with the constructors and the arithmetic operators;
/// both fold constants and drop neutral terms, so derivatives stay small.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Var(VarId),
    Param(ParamId),
    Sum(Vec<Expr>),
    Product(Vec<Expr>),
    Quotient(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    /// Power with a constant exponent
    Pow(Box<Expr>, f64),
    Call(Func, Box<Expr>),
    /// `if test < 0 { then } else { otherwise }`
    IfNegative {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn constant(value: f64) -> Self {
        Expr::Const(value)
    }

    pub fn var(id: VarId) -> Self {
        Expr::Var(id)
    }

    pub fn param(id: ParamId) -> Self {
        Expr::Param(id)
    }

    pub fn zero() -> Self {
        Expr::Const(0.0)
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_const() == Some(0.0)
    }

    fn is_one(&self) -> bool {
        self.as_const() == Some(1.0)
    }

    /// Sum of terms with nested sums flattened and constants folded.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        let mut constant = 0.0;
        let mut out = Vec::new();
        for term in terms {
            match term {
                Expr::Const(c) => constant += c,
                Expr::Sum(inner) => {
                    for t in inner {
                        match t {
                            Expr::Const(c) => constant += c,
                            other => out.push(other),
                        }
                    }
                }
                other => out.push(other),
            }
        }
        if constant != 0.0 {
            out.push(Expr::Const(constant));
        }
        match out.len() {
            0 => Expr::Const(0.0),
            1 => out.pop().unwrap_or(Expr::Const(0.0)),
            _ => Expr::Sum(out),
        }
    }

    /// Product of factors with nested products flattened and constants folded.
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Self {
        let mut constant = 1.0;
        let mut out = Vec::new();
        for factor in factors {
            match factor {
                Expr::Const(c) => constant *= c,
                Expr::Product(inner) => {
                    for f in inner {
                        match f {
                            Expr::Const(c) => constant *= c,
                            other => out.push(other),
                        }
                    }
                }
                other => out.push(other),
            }
        }
        if constant == 0.0 || out.is_empty() {
            return Expr::Const(constant);
        }
        if constant == -1.0 && out.len() == 1 {
            return Expr::neg(out.pop().unwrap_or(Expr::Const(0.0)));
        }
        if constant != 1.0 {
            out.insert(0, Expr::Const(constant));
        }
        match out.len() {
            1 => out.pop().unwrap_or(Expr::Const(1.0)),
            _ => Expr::Product(out),
        }
    }

    pub fn quotient(num: Expr, den: Expr) -> Self {
        if den.is_one() {
            return num;
        }
        match (num.as_const(), den.as_const()) {
            (Some(a), Some(b)) => Expr::Const(a / b),
            (Some(a), None) if a == 0.0 => Expr::Const(0.0),
            (None, Some(b)) => Expr::product([Expr::Const(1.0 / b), num]),
            _ => Expr::Quotient(Box::new(num), Box::new(den)),
        }
    }

    pub fn neg(inner: Expr) -> Self {
        match inner {
            Expr::Const(c) => Expr::Const(-c),
            Expr::Neg(e) => *e,
            other => Expr::Neg(Box::new(other)),
        }
    }

    /// `base^exponent` for a constant exponent.
    pub fn powf(self, exponent: f64) -> Self {
        if exponent == 0.0 {
            return Expr::Const(1.0);
        }
        if exponent == 1.0 {
            return self;
        }
        match self {
            Expr::Const(c) => Expr::Const(c.powf(exponent)),
            other => Expr::Pow(Box::new(other), exponent),
        }
    }

    pub fn call(func: Func, arg: Expr) -> Self {
        match arg {
            Expr::Const(c) => Expr::Const(func.apply(c)),
            other => Expr::Call(func, Box::new(other)),
        }
    }

    pub fn abs(self) -> Self {
        Expr::call(Func::Abs, self)
    }

    pub fn sign(self) -> Self {
        Expr::call(Func::Sign, self)
    }

    pub fn exp(self) -> Self {
        Expr::call(Func::Exp, self)
    }

    pub fn ln(self) -> Self {
        Expr::call(Func::Ln, self)
    }

    pub fn sqrt(self) -> Self {
        Expr::call(Func::Sqrt, self)
    }

    pub fn signed_pow(self, p: f64) -> Self {
        Expr::call(Func::SignedPow(p), self)
    }

    pub fn abs_pow(self, p: f64) -> Self {
        if p == 0.0 {
            return Expr::Const(1.0);
        }
        Expr::call(Func::AbsPow(p), self)
    }

    /// Piecewise expression selecting `then` where `test < 0`.
    pub fn if_negative(test: Expr, then: Expr, otherwise: Expr) -> Self {
        if let Some(t) = test.as_const() {
            return if t < 0.0 { then } else { otherwise };
        }
        if then == otherwise {
            return then;
        }
        Expr::IfNegative {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn eval(&self, ctx: &EvalContext<'_>) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Var(v) => ctx.vars.get(v.slot()).copied().unwrap_or(f64::NAN),
            Expr::Param(p) => ctx.params.get(p.slot()).copied().unwrap_or(f64::NAN),
            Expr::Sum(terms) => terms.iter().map(|t| t.eval(ctx)).sum(),
            Expr::Product(factors) => factors.iter().map(|f| f.eval(ctx)).product(),
            Expr::Quotient(a, b) => a.eval(ctx) / b.eval(ctx),
            Expr::Neg(a) => -a.eval(ctx),
            Expr::Pow(a, p) => a.eval(ctx).powf(*p),
            Expr::Call(f, a) => f.apply(a.eval(ctx)),
            Expr::IfNegative {
                test,
                then,
                otherwise,
            } => {
                if test.eval(ctx) < 0.0 {
                    then.eval(ctx)
                } else {
                    otherwise.eval(ctx)
                }
            }
        }
    }

    /// Symbolic partial derivative with respect to `v`.
    pub fn derivative(&self, v: VarId) -> Expr {
        match self {
            Expr::Const(_) | Expr::Param(_) => Expr::zero(),
            Expr::Var(w) => Expr::Const(if *w == v { 1.0 } else { 0.0 }),
            Expr::Sum(terms) => Expr::sum(terms.iter().map(|t| t.derivative(v))),
            Expr::Product(factors) => {
                let mut terms = Vec::new();
                for (i, f) in factors.iter().enumerate() {
                    let df = f.derivative(v);
                    if df.is_zero() {
                        continue;
                    }
                    let rest = factors
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, g)| g.clone());
                    terms.push(Expr::product(std::iter::once(df).chain(rest)));
                }
                Expr::sum(terms)
            }
            Expr::Quotient(a, b) => {
                let da = a.derivative(v);
                let db = b.derivative(v);
                if db.is_zero() {
                    return Expr::quotient(da, (**b).clone());
                }
                let num = da * (**b).clone() - (**a).clone() * db;
                Expr::quotient(num, (**b).clone().powf(2.0))
            }
            Expr::Neg(a) => Expr::neg(a.derivative(v)),
            Expr::Pow(a, p) => {
                let da = a.derivative(v);
                if da.is_zero() {
                    return Expr::zero();
                }
                Expr::product([Expr::Const(*p), (**a).clone().powf(p - 1.0), da])
            }
            Expr::Call(func, a) => {
                let da = a.derivative(v);
                if da.is_zero() {
                    return Expr::zero();
                }
                let inner = (**a).clone();
                let outer = match func {
                    Func::Abs => inner.sign(),
                    Func::Sign => return Expr::zero(),
                    Func::Exp => inner.exp(),
                    Func::Ln => Expr::quotient(Expr::Const(1.0), inner),
                    Func::Sqrt => Expr::quotient(Expr::Const(0.5), inner.sqrt()),
                    Func::SignedPow(p) => Expr::Const(*p) * inner.abs_pow(p - 1.0),
                    Func::AbsPow(p) => Expr::Const(*p) * inner.signed_pow(p - 1.0),
                };
                outer * da
            }
            Expr::IfNegative {
                test,
                then,
                otherwise,
            } => Expr::if_negative(
                (**test).clone(),
                then.derivative(v),
                otherwise.derivative(v),
            ),
        }
    }

    /// Collect the variables this expression depends on.
    pub fn collect_vars(&self, out: &mut BTreeSet<VarId>) {
        self.visit(&mut |e| {
            if let Expr::Var(v) = e {
                out.insert(*v);
            }
        });
    }

    /// Collect the parameters this expression reads.
    pub fn collect_params(&self, out: &mut BTreeSet<ParamId>) {
        self.visit(&mut |e| {
            if let Expr::Param(p) = e {
                out.insert(*p);
            }
        });
    }

    pub fn depends_on(&self, v: VarId) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Var(w) if *w == v));
        found
    }

    fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Const(_) | Expr::Var(_) | Expr::Param(_) => {}
            Expr::Sum(items) | Expr::Product(items) => {
                for item in items {
                    item.visit(f);
                }
            }
            Expr::Quotient(a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Expr::Neg(a) | Expr::Pow(a, _) | Expr::Call(_, a) => a.visit(f),
            Expr::IfNegative {
                test,
                then,
                otherwise,
            } => {
                test.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

impl From<VarId> for Expr {
    fn from(id: VarId) -> Self {
        Expr::Var(id)
    }
}

impl From<ParamId> for Expr {
    fn from(id: ParamId) -> Self {
        Expr::Param(id)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::neg(self)
    }
}

macro_rules! impl_binary_ops {
    ($rhs:ty) => {
        impl Add<$rhs> for Expr {
            type Output = Expr;
            fn add(self, rhs: $rhs) -> Expr {
                Expr::sum([self, Expr::from(rhs)])
            }
        }

        impl Sub<$rhs> for Expr {
            type Output = Expr;
            fn sub(self, rhs: $rhs) -> Expr {
                Expr::sum([self, Expr::neg(Expr::from(rhs))])
            }
        }

        impl Mul<$rhs> for Expr {
            type Output = Expr;
            fn mul(self, rhs: $rhs) -> Expr {
                Expr::product([self, Expr::from(rhs)])
            }
        }

        impl Div<$rhs> for Expr {
            type Output = Expr;
            fn div(self, rhs: $rhs) -> Expr {
                Expr::quotient(self, Expr::from(rhs))
            }
        }
    };
}

impl_binary_ops!(Expr);
impl_binary_ops!(f64);
impl_binary_ops!(VarId);
impl_binary_ops!(ParamId);

impl Add<Expr> for f64 {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([Expr::Const(self), rhs])
    }
}

impl Sub<Expr> for f64 {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum([Expr::Const(self), Expr::neg(rhs)])
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::product([Expr::Const(self), rhs])
    }
}

impl Div<Expr> for f64 {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::quotient(Expr::Const(self), rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> VarId {
        VarId::new(0)
    }

    fn y() -> VarId {
        VarId::new(1)
    }

    fn eval_at(e: &Expr, vars: &[f64]) -> f64 {
        e.eval(&EvalContext { vars, params: &[] })
    }

    #[test]
    fn constants_fold() {
        let e = Expr::from(2.0) * 3.0 + 1.0;
        assert_eq!(e, Expr::Const(7.0));
        assert_eq!(Expr::var(x()) * 0.0, Expr::Const(0.0));
        assert_eq!(Expr::var(x()) * 1.0, Expr::var(x()));
        assert_eq!(-(-Expr::var(x())), Expr::var(x()));
    }

    #[test]
    fn unit_denominator_drops_quotient() {
        assert_eq!(Expr::var(x()) / 1.0, Expr::var(x()));
        let unit = Expr::product([Expr::from(0.5), Expr::from(2.0)]);
        assert_eq!(Expr::quotient(Expr::var(y()), unit), Expr::var(y()));
        assert_eq!(Expr::quotient(Expr::from(3.0), Expr::from(1.0)), Expr::Const(3.0));
    }

    #[test]
    fn derivative_of_product_rule() {
        // d/dx (x * y) = y
        let e = Expr::var(x()) * Expr::var(y());
        assert_eq!(e.derivative(x()), Expr::var(y()));
        assert_eq!(eval_at(&e.derivative(y()), &[5.0, 2.0]), 5.0);
    }

    #[test]
    fn signed_pow_derivative() {
        // d/dx sign(x)|x|^1.852 = 1.852 |x|^0.852
        let e = Expr::var(x()).signed_pow(1.852);
        let d = e.derivative(x());
        for &v in &[-2.0, 0.5, 3.0] {
            let expected = 1.852 * f64::abs(v).powf(0.852);
            assert!((eval_at(&d, &[v]) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn if_negative_selects_branch() {
        let e = Expr::if_negative(Expr::var(x()), Expr::from(-1.0), Expr::var(x()) * 2.0);
        assert_eq!(eval_at(&e, &[-3.0]), -1.0);
        assert_eq!(eval_at(&e, &[3.0]), 6.0);
        assert_eq!(eval_at(&e.derivative(x()), &[3.0]), 2.0);
        assert_eq!(eval_at(&e.derivative(x()), &[-3.0]), 0.0);
    }

    #[test]
    fn collects_sparsity() {
        let e = Expr::var(y()).exp() + Expr::var(x()).sqrt();
        let mut vars = BTreeSet::new();
        e.collect_vars(&mut vars);
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec![x(), y()]);
        assert!(e.depends_on(y()));
    }
}
