//! Per-genotype mutable instances of genes.
//!
//! An [`Allele`] wraps a shared, immutable [`Gene`] with a writable parameter
//! vector and an enabled flag. Alleles are totally ordered by
//! `(gene ID, allele ID)` so that two genotypes can be merged in lock-step
//! sorted order for crossover and distance computation.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::gene::{Gene, GeneKind, NeuronRole};
use crate::vector::Vector;

/// A mutable wrapper around a gene, owned by at most one genotype at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allele {
    /// Unique allele ID, drawn from the run's ID source.
    pub id: u64,
    /// The underlying shared gene.
    pub gene: Arc<Gene>,
    /// Allele-mutable parameter vector (e.g. a synapse's weight).
    pub params: Vector,
    /// Disabled alleles are skipped during expression but preserved in the
    /// genotype for historical marking and crossover.
    pub enabled: bool,
}

impl Allele {
    /// Create an enabled allele over `gene` with the given parameters.
    #[must_use]
    pub fn new(id: u64, gene: Arc<Gene>, params: Vector) -> Self {
        Self {
            id,
            gene,
            params,
            enabled: true,
        }
    }

    /// Innovation ID of the underlying gene.
    #[must_use]
    pub fn gene_id(&self) -> u64 {
        self.gene.id
    }

    /// Structural kind of the underlying gene.
    #[must_use]
    pub fn kind(&self) -> GeneKind {
        self.gene.kind
    }

    /// Whether the underlying gene is a neuron.
    #[must_use]
    pub fn is_neuron(&self) -> bool {
        self.gene.is_neuron()
    }

    /// Whether the underlying gene is a synapse.
    #[must_use]
    pub fn is_synapse(&self) -> bool {
        self.gene.is_synapse()
    }

    /// Neuron role of the underlying gene, if any.
    #[must_use]
    pub fn role(&self) -> Option<NeuronRole> {
        self.gene.role()
    }

    /// A copy of this allele over the same gene with an independent
    /// parameter vector, used when cloning a genotype.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            id: self.id,
            gene: Arc::clone(&self.gene),
            params: self.params.thawed_copy(),
            enabled: self.enabled,
        }
    }
}

impl PartialEq for Allele {
    fn eq(&self, other: &Self) -> bool {
        self.gene_id() == other.gene_id() && self.id == other.id
    }
}

impl Eq for Allele {}

impl PartialOrd for Allele {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Allele {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gene_id()
            .cmp(&other.gene_id())
            .then(self.id.cmp(&other.id))
    }
}
