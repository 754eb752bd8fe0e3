//! Bounded parameter vectors with shared metadata.
//!
//! Every gene and allele in a NEAT genotype carries its numeric parameters in
//! a [`Vector`]: a fixed-length array of `f64` values paired with shared
//! [`VectorMetadata`] describing, per element, a label, a closed numeric
//! bound, and whether the element is integer-valued. Gene-owned vectors are
//! frozen after creation; allele-owned vectors stay writable for the lifetime
//! of the allele.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest magnitude an integer-typed element may take: beyond 2^53 an `f64`
/// can no longer represent every whole number exactly.
pub const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53

/// Description of a single vector element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    /// Human-readable label, e.g. `"weight"` or `"bias"`.
    pub label: String,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
    /// Whether values are constrained to whole numbers.
    pub integer: bool,
}

impl ElementSpec {
    /// A float-valued element bounded to `[min, max]`.
    #[must_use]
    pub fn float(label: &str, min: f64, max: f64) -> Self {
        Self {
            label: label.to_owned(),
            min,
            max,
            integer: false,
        }
    }

    /// An integer-valued element bounded to `[min, max]`.
    #[must_use]
    pub fn integer(label: &str, min: f64, max: f64) -> Self {
        Self {
            label: label.to_owned(),
            min,
            max,
            integer: true,
        }
    }

    /// Width of the bound, used for unit-interval normalization.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Immutable per-element metadata shared by every vector of the same shape.
///
/// Metadata is held behind an [`Arc`] so that all genes and alleles of one
/// kind share a single description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    elements: Vec<ElementSpec>,
}

impl VectorMetadata {
    /// Build metadata from element specs.
    #[must_use]
    pub fn new(elements: Vec<ElementSpec>) -> Arc<Self> {
        Arc::new(Self { elements })
    }

    /// Metadata for an empty (zero-element) vector.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    /// Number of elements described.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether this metadata describes zero elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The spec for element `index`, if in range.
    #[must_use]
    pub fn element(&self, index: usize) -> Option<&ElementSpec> {
        self.elements.get(index)
    }

    /// Iterate over all element specs.
    pub fn elements(&self) -> impl Iterator<Item = &ElementSpec> {
        self.elements.iter()
    }
}

/// Errors raised by vector writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VectorError {
    /// Attempted to write to a frozen (gene-owned) vector.
    #[error("write to frozen vector")]
    Frozen,
    /// Element index outside the metadata's length.
    #[error("element index {0} out of range")]
    IndexOutOfRange(usize),
    /// NaN or infinite value.
    #[error("value for element {0} is not finite")]
    NotFinite(usize),
    /// Integer element magnitude exceeds what an `f64` represents exactly.
    #[error("integer element {0} magnitude exceeds 2^53")]
    IntegerOverflow(usize),
}

/// A fixed-length value array bound to shared [`VectorMetadata`].
///
/// Invariant: `values.len() == metadata.len()` always holds, and every
/// integer-typed element holds a whole number within `[-2^53, 2^53]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vector {
    values: Vec<f64>,
    metadata: Arc<VectorMetadata>,
    frozen: bool,
}

impl Vector {
    /// A writable vector with every element at the in-bounds value closest
    /// to zero. Deterministic, used for gene-fixed parameter sets so that
    /// identical structural events produce identical registry keys.
    #[must_use]
    pub fn zeroed(metadata: Arc<VectorMetadata>) -> Self {
        let values = metadata
            .elements()
            .map(|spec| {
                let v = 0.0_f64.clamp(spec.min, spec.max);
                if spec.integer {
                    v.round()
                } else {
                    v
                }
            })
            .collect();
        Self {
            values,
            metadata,
            frozen: false,
        }
    }

    /// A writable vector with every element sampled uniformly within its
    /// bound. Integer elements are rounded after sampling.
    #[must_use]
    pub fn sampled<R: Rng>(metadata: Arc<VectorMetadata>, rng: &mut R) -> Self {
        let values = metadata
            .elements()
            .map(|spec| {
                let v = if spec.span() > 0.0 {
                    rng.random_range(spec.min..=spec.max)
                } else {
                    spec.min
                };
                if spec.integer {
                    v.round()
                } else {
                    v
                }
            })
            .collect();
        Self {
            values,
            metadata,
            frozen: false,
        }
    }

    /// Freeze this vector, rejecting all subsequent writes.
    #[must_use]
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Whether writes are rejected.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// A writable copy of this vector (used when an allele is cloned into a
    /// new genotype, or when thawing gene parameters into allele space).
    #[must_use]
    pub fn thawed_copy(&self) -> Self {
        Self {
            values: self.values.clone(),
            metadata: Arc::clone(&self.metadata),
            frozen: false,
        }
    }

    /// Element count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has zero elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The shared metadata.
    #[must_use]
    pub fn metadata(&self) -> &Arc<VectorMetadata> {
        &self.metadata
    }

    /// Value at `index`. Panics if out of range, mirroring slice indexing.
    #[must_use]
    pub fn get(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// All values as a slice.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Write `value` to element `index`.
    ///
    /// The value is clamped to the element's bound; integer elements are
    /// rounded. Non-finite values, writes to frozen vectors, and integer
    /// magnitudes beyond 2^53 are rejected.
    ///
    /// # Errors
    ///
    /// See [`VectorError`].
    pub fn set(&mut self, index: usize, value: f64) -> Result<(), VectorError> {
        if self.frozen {
            return Err(VectorError::Frozen);
        }
        let spec = self
            .metadata
            .element(index)
            .ok_or(VectorError::IndexOutOfRange(index))?;
        if !value.is_finite() {
            return Err(VectorError::NotFinite(index));
        }
        if spec.integer && value.abs() > MAX_EXACT_INTEGER {
            return Err(VectorError::IntegerOverflow(index));
        }
        let mut v = value.clamp(spec.min, spec.max);
        if spec.integer {
            v = v.round();
        }
        self.values[index] = v;
        Ok(())
    }

    /// A hashable key over the exact bit patterns of the values, used by the
    /// innovation registry to key genes on their parameter sets.
    #[must_use]
    pub fn param_key(&self) -> ParamKey {
        ParamKey(self.values.iter().map(|v| v.to_bits()).collect())
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

/// Bit-exact hashable identity of a vector's values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey(Vec<u64>);
