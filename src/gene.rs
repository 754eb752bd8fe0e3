//! Gene types for NEAT genotypes.
//!
//! A [`Gene`] is the immutable structural description of one network element,
//! uniquely identified by a monotonically increasing innovation ID. Genes are
//! created once by the innovation registry when a structural mutation first
//! occurs anywhere in the population, shared via [`Arc`] by every genotype
//! that inherits or independently rediscovers the same mutation, and never
//! mutated or deleted during a run.
//!
//! Instead of the classic subclass hierarchy this uses a flat tagged union:
//! kind-specific state (a synapse's endpoints) lives in the [`GeneKind`]
//! variant, not in separate types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::vector::Vector;

/// The role a neuron gene plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronRole {
    /// Receives external values.
    Input,
    /// Internal neuron added by the add-neuron mutator.
    Hidden,
    /// Produces network output.
    Output,
}

/// Structural kind of a gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneKind {
    /// A neuron with a given role.
    Neuron(NeuronRole),
    /// A directed synapse between two neuron genes, referenced by their
    /// innovation IDs.
    Synapse {
        /// Innovation ID of the source neuron gene.
        source: u64,
        /// Innovation ID of the destination neuron gene.
        destination: u64,
    },
}

/// An immutable structural unit of a genotype.
#[derive(Debug, Serialize, Deserialize)]
pub struct Gene {
    /// Globally unique innovation ID.
    pub id: u64,
    /// Neuron or synapse, with kind-specific structure.
    pub kind: GeneKind,
    /// Gene-fixed parameter vector, frozen at creation.
    pub params: Vector,
}

impl Gene {
    /// Create a neuron gene. The parameter vector is frozen.
    #[must_use]
    pub fn neuron(id: u64, role: NeuronRole, params: Vector) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: GeneKind::Neuron(role),
            params: params.frozen(),
        })
    }

    /// Create a synapse gene. The parameter vector is frozen.
    #[must_use]
    pub fn synapse(id: u64, source: u64, destination: u64, params: Vector) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: GeneKind::Synapse {
                source,
                destination,
            },
            params: params.frozen(),
        })
    }

    /// Whether this gene describes a neuron.
    #[must_use]
    pub fn is_neuron(&self) -> bool {
        matches!(self.kind, GeneKind::Neuron(_))
    }

    /// Whether this gene describes a synapse.
    #[must_use]
    pub fn is_synapse(&self) -> bool {
        matches!(self.kind, GeneKind::Synapse { .. })
    }

    /// The neuron role, if this is a neuron gene.
    #[must_use]
    pub fn role(&self) -> Option<NeuronRole> {
        match self.kind {
            GeneKind::Neuron(role) => Some(role),
            GeneKind::Synapse { .. } => None,
        }
    }

    /// Source neuron gene ID, if this is a synapse gene.
    #[must_use]
    pub fn source(&self) -> Option<u64> {
        match self.kind {
            GeneKind::Synapse { source, .. } => Some(source),
            GeneKind::Neuron(_) => None,
        }
    }

    /// Destination neuron gene ID, if this is a synapse gene.
    #[must_use]
    pub fn destination(&self) -> Option<u64> {
        match self.kind {
            GeneKind::Synapse { destination, .. } => Some(destination),
            GeneKind::Neuron(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::VectorMetadata;

    #[test]
    fn test_neuron_gene() {
        let g = Gene::neuron(7, NeuronRole::Hidden, Vector::zeroed(VectorMetadata::empty()));
        assert_eq!(g.id, 7);
        assert!(g.is_neuron());
        assert!(!g.is_synapse());
        assert_eq!(g.role(), Some(NeuronRole::Hidden));
        assert_eq!(g.source(), None);
    }

    #[test]
    fn test_synapse_gene_endpoints() {
        let g = Gene::synapse(10, 1, 3, Vector::zeroed(VectorMetadata::empty()));
        assert!(g.is_synapse());
        assert_eq!(g.source(), Some(1));
        assert_eq!(g.destination(), Some(3));
        assert_eq!(g.role(), None);
    }

    #[test]
    fn test_gene_params_frozen() {
        let g = Gene::neuron(1, NeuronRole::Input, Vector::zeroed(VectorMetadata::empty()));
        assert!(g.params.is_frozen());
    }
}
