//! Network-shape and operator configuration.
//!
//! [`NetworkConfig`] describes the evolvable network: how many inputs and
//! outputs, whether the topology must stay feed-forward, the parameter-vector
//! shapes for neuron and synapse genes and alleles, and the numeric knobs of
//! the mutators, distance metric, and speciators.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::vector::{ElementSpec, Vector, VectorMetadata};

/// Whether cycle avoidance gates structural operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyMode {
    /// The enabled-synapse graph must remain a DAG; mutators and the
    /// recombiner reject cycle-creating synapses.
    FeedForward,
    /// Cycles (including self-loops) are permitted.
    Recurrent,
}

/// Mode of the add-synapse mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddSynapseMode {
    /// Up to `max_additions` attempts, each gated by the apply rate; stops
    /// early the first time no permissible pair is found.
    Fixed {
        /// Maximum synapse additions per call.
        max_additions: usize,
    },
    /// Every unconnected (source, destination) pair is considered
    /// independently with probability equal to the apply rate.
    Any,
}

/// Configuration shared by the registry, mutators, distance metric, and
/// speciators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of input neurons in seeded genotypes.
    pub num_inputs: usize,
    /// Number of output neurons in seeded genotypes.
    pub num_outputs: usize,
    /// Feed-forward-only or recurrent-allowed.
    pub topology: TopologyMode,

    /// Gene-fixed parameter shape for neuron genes.
    pub neuron_gene_metadata: Arc<VectorMetadata>,
    /// Allele-mutable parameter shape for neuron alleles (e.g. bias).
    pub neuron_allele_metadata: Arc<VectorMetadata>,
    /// Gene-fixed parameter shape for synapse genes.
    pub synapse_gene_metadata: Arc<VectorMetadata>,
    /// Allele-mutable parameter shape for synapse alleles. Element 0 is the
    /// synapse weight.
    pub synapse_allele_metadata: Arc<VectorMetadata>,

    /// Probability that a mutation pass applies the add-neuron mutator.
    pub add_neuron_prob: f64,
    /// Upper bound for the uniformly sampled per-call neuron-addition count.
    pub max_neuron_additions: usize,
    /// Add-synapse mode.
    pub add_synapse_mode: AddSynapseMode,
    /// Per-attempt (Fixed) or per-pair (Any) apply probability of the
    /// add-synapse mutator.
    pub synapse_apply_rate: f64,
    /// Probability of perturbing each allele parameter during a mutation
    /// pass.
    pub parameter_mutation_prob: f64,
    /// Magnitude of allele parameter perturbation, as a fraction of the
    /// element's bound span.
    pub parameter_mutation_power: f64,

    /// Weight of the excess-gene sum in the compatibility distance.
    pub excess_factor: f64,
    /// Weight of the disjoint-gene sum in the compatibility distance.
    pub disjoint_factor: f64,
    /// Weight of the common-gene parameter-difference sum.
    pub param_factor: f64,
    /// Normalize per-element parameter differences to the unit interval
    /// using the element bounds, instead of using raw differences.
    pub normalized_params: bool,
    /// Mismatched (excess/disjoint) genes contribute the value of their
    /// first allele parameter instead of a constant 1.
    pub mismatch_uses_values: bool,

    /// Starting compatibility threshold for the threshold speciator.
    pub initial_threshold: f64,
    /// Target species count for adaptive threshold adjustment. `None`
    /// disables adjustment.
    pub target_species: Option<usize>,
    /// Minimum generations between threshold adjustments.
    pub threshold_adjust_period: u64,
    /// Fixed species count for the k-means speciator. `None` derives
    /// `population_size^0.6`, rounded.
    pub species_count: Option<usize>,
    /// Iteration cap for the k-means loop.
    pub kmeans_max_iterations: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_inputs: 2,
            num_outputs: 1,
            topology: TopologyMode::FeedForward,
            neuron_gene_metadata: VectorMetadata::empty(),
            neuron_allele_metadata: VectorMetadata::new(vec![ElementSpec::float(
                "bias", -3.0, 3.0,
            )]),
            synapse_gene_metadata: VectorMetadata::empty(),
            synapse_allele_metadata: VectorMetadata::new(vec![ElementSpec::float(
                "weight", -3.0, 3.0,
            )]),
            add_neuron_prob: 0.03,
            max_neuron_additions: 1,
            add_synapse_mode: AddSynapseMode::Fixed { max_additions: 1 },
            synapse_apply_rate: 0.05,
            parameter_mutation_prob: 0.8,
            parameter_mutation_power: 0.1,
            excess_factor: 1.0,
            disjoint_factor: 1.0,
            param_factor: 0.4,
            normalized_params: false,
            mismatch_uses_values: false,
            initial_threshold: 3.0,
            target_species: None,
            threshold_adjust_period: 1,
            species_count: None,
            kmeans_max_iterations: 10,
        }
    }
}

impl NetworkConfig {
    /// A minimal feed-forward configuration for the given shape.
    #[must_use]
    pub fn minimal(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            ..Default::default()
        }
    }

    /// A recurrent-allowed configuration for the given shape.
    #[must_use]
    pub fn recurrent(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            topology: TopologyMode::Recurrent,
            ..Default::default()
        }
    }

    /// Whether the topology must remain acyclic.
    #[must_use]
    pub fn feed_forward(&self) -> bool {
        self.topology == TopologyMode::FeedForward
    }

    /// Deterministic gene-fixed parameters for a neuron gene.
    #[must_use]
    pub fn neuron_gene_params(&self) -> Vector {
        Vector::zeroed(Arc::clone(&self.neuron_gene_metadata))
    }

    /// Deterministic gene-fixed parameters for a synapse gene.
    #[must_use]
    pub fn synapse_gene_params(&self) -> Vector {
        Vector::zeroed(Arc::clone(&self.synapse_gene_metadata))
    }

    /// Freshly sampled allele parameters for a neuron allele.
    #[must_use]
    pub fn neuron_allele_params<R: Rng>(&self, rng: &mut R) -> Vector {
        Vector::sampled(Arc::clone(&self.neuron_allele_metadata), rng)
    }

    /// Freshly sampled allele parameters for a synapse allele.
    #[must_use]
    pub fn synapse_allele_params<R: Rng>(&self, rng: &mut R) -> Vector {
        Vector::sampled(Arc::clone(&self.synapse_allele_metadata), rng)
    }
}
