//! Fixed-length numeric vectors with element-wise arithmetic.
//!
//! Every value held by the trace store, raw or derived, is a
//! [`NumericVector`]. Scalars are represented as 1-element vectors so that
//! all stored values share a uniform shape.
//!
//! # Arithmetic
//!
//! [`NumericVector::combine`] is the single element-wise primitive. The
//! right-hand side is an [`Operand`]: a scalar is broadcast against every
//! element, a vector must have the same length. [`add`], [`sub`], [`mul`]
//! and [`div`] are specializations of it. Length mismatches are reported
//! as [`VectorError::LengthMismatch`] and no partial result is produced.
//!
//! Scalar-only arithmetic cannot fail and is also available through the
//! `std::ops` operators on `&NumericVector`.
//!
//! [`add`]: NumericVector::add
//! [`sub`]: NumericVector::sub
//! [`mul`]: NumericVector::mul
//! [`div`]: NumericVector::div

use core::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Errors produced by vector arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VectorError {
    /// Two vectors combined element-wise (or dot-multiplied) differ in length.
    #[error("length of vectors do not match ({left} vs {right})")]
    LengthMismatch {
        /// Length of the left-hand operand.
        left: usize,
        /// Length of the right-hand operand.
        right: usize,
    },
}

/// Right-hand side of an element-wise operation.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    /// A scalar broadcast against every element.
    Scalar(f64),
    /// A vector combined pairwise; must match the left-hand length.
    Vector(&'a NumericVector),
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl<'a> From<&'a NumericVector> for Operand<'a> {
    fn from(value: &'a NumericVector) -> Self {
        Self::Vector(value)
    }
}

/// An owned, fixed-length sequence of `f64` values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct NumericVector(Vec<f64>);

impl NumericVector {
    /// Create an empty vector.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a 1-element vector holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self(vec![value])
    }

    /// Create a vector of `len` zeros.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    /// Copy `values` into a new vector.
    pub fn from_slice(values: &[f64]) -> Self {
        Self(values.to_vec())
    }

    /// Return the number of components.
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Return whether the vector has no components.
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return the component at `index`, if present.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Borrow the components as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Iterate over the components by value.
    pub fn iter(&self) -> core::iter::Copied<core::slice::Iter<'_, f64>> {
        self.0.iter().copied()
    }

    /// Consume the vector and return its components.
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Apply `op` to every component, returning a new vector.
    #[must_use]
    pub fn map(&self, op: impl Fn(f64) -> f64) -> Self {
        self.iter().map(op).collect()
    }

    /// Combine this vector with `other` element-wise using `op`.
    ///
    /// A scalar operand is broadcast: `op(element, scalar)` is applied to
    /// every element. A vector operand is applied pairwise.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::LengthMismatch`] if `other` is a vector of a
    /// different length.
    pub fn combine<'a, F>(&self, other: impl Into<Operand<'a>>, op: F) -> Result<Self, VectorError>
    where
        F: Fn(f64, f64) -> f64,
    {
        match other.into() {
            Operand::Scalar(scalar) => Ok(self.map(|element| op(element, scalar))),
            Operand::Vector(rhs) => {
                self.check_len(rhs)?;
                Ok(self.iter().zip(rhs.iter()).map(|(a, b)| op(a, b)).collect())
            }
        }
    }

    /// Element-wise sum.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::LengthMismatch`] on a vector length mismatch.
    #[allow(clippy::should_implement_trait)]
    pub fn add<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, VectorError> {
        self.combine(other, |a, b| a + b)
    }

    /// Element-wise difference.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::LengthMismatch`] on a vector length mismatch.
    #[allow(clippy::should_implement_trait)]
    pub fn sub<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, VectorError> {
        self.combine(other, |a, b| a - b)
    }

    /// Element-wise product.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::LengthMismatch`] on a vector length mismatch.
    #[allow(clippy::should_implement_trait)]
    pub fn mul<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, VectorError> {
        self.combine(other, |a, b| a * b)
    }

    /// Element-wise quotient. Division by zero follows IEEE 754.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::LengthMismatch`] on a vector length mismatch.
    #[allow(clippy::should_implement_trait)]
    pub fn div<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, VectorError> {
        self.combine(other, |a, b| a / b)
    }

    /// Sum of pairwise products.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::LengthMismatch`] if the lengths differ.
    pub fn dot(&self, other: &Self) -> Result<f64, VectorError> {
        self.check_len(other)?;
        Ok(self.iter().zip(other.iter()).map(|(a, b)| a * b).sum())
    }

    /// Euclidean length.
    pub fn norm(&self) -> f64 {
        self.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    const fn check_len(&self, other: &Self) -> Result<(), VectorError> {
        if self.len() == other.len() {
            Ok(())
        } else {
            Err(VectorError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            })
        }
    }
}

impl From<Vec<f64>> for NumericVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<&[f64]> for NumericVector {
    fn from(values: &[f64]) -> Self {
        Self::from_slice(values)
    }
}

impl<const N: usize> From<[f64; N]> for NumericVector {
    fn from(values: [f64; N]) -> Self {
        Self(values.to_vec())
    }
}

impl From<&NumericVector> for NumericVector {
    fn from(value: &NumericVector) -> Self {
        value.clone()
    }
}

/// Scalars are promoted to 1-element vectors.
impl From<f64> for NumericVector {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl FromIterator<f64> for NumericVector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a NumericVector {
    type Item = f64;
    type IntoIter = core::iter::Copied<core::slice::Iter<'a, f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Add<f64> for &NumericVector {
    type Output = NumericVector;

    fn add(self, rhs: f64) -> NumericVector {
        self.map(|v| v + rhs)
    }
}

impl Sub<f64> for &NumericVector {
    type Output = NumericVector;

    fn sub(self, rhs: f64) -> NumericVector {
        self.map(|v| v - rhs)
    }
}

impl Mul<f64> for &NumericVector {
    type Output = NumericVector;

    fn mul(self, rhs: f64) -> NumericVector {
        self.map(|v| v * rhs)
    }
}

impl Div<f64> for &NumericVector {
    type Output = NumericVector;

    fn div(self, rhs: f64) -> NumericVector {
        self.map(|v| v / rhs)
    }
}

impl Neg for &NumericVector {
    type Output = NumericVector;

    fn neg(self) -> NumericVector {
        self.map(|v| -v)
    }
}
