//! High-level façade bundling the evolutionary operators.
//!
//! An [`Evolver`] owns a shared [`NetworkConfig`], the [`IdSource`] and
//! [`InnovationRegistry`] behind it, and one instance of each operator. It is
//! the intended entry point for a generation loop: seed a population, mutate
//! and recombine genotypes, and measure compatibility distances, all against
//! the same innovation history.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use crate::config::NetworkConfig;
use crate::distance::CompatibilityDistance;
use crate::gene::NeuronRole;
use crate::genotype::{Genotype, GenotypeError};
use crate::innovation::{IdSource, InnovationRegistry};
use crate::mutation::{AddNeuronMutator, AddSynapseMutator, MutationError, ParameterMutator};
use crate::recombine::{Parent, RecombineError, Recombiner};

/// Errors surfaced by the façade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvolveError {
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Recombine(#[from] RecombineError),
    #[error(transparent)]
    Genotype(#[from] GenotypeError),
}

/// Bundles all operators over one shared innovation history.
#[derive(Debug)]
pub struct Evolver {
    config: Arc<NetworkConfig>,
    registry: InnovationRegistry,
    add_neuron: AddNeuronMutator,
    add_synapse: AddSynapseMutator,
    parameters: ParameterMutator,
    recombiner: Recombiner,
    distance: CompatibilityDistance,
}

impl Evolver {
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        let config = Arc::new(config);
        let ids = Arc::new(IdSource::default());
        Self::with_ids(config, ids)
    }

    /// Build against an existing ID source, e.g. when resuming a run.
    #[must_use]
    pub fn with_ids(config: Arc<NetworkConfig>, ids: Arc<IdSource>) -> Self {
        let registry = InnovationRegistry::new(Arc::clone(&config), Arc::clone(&ids));
        Self {
            add_neuron: AddNeuronMutator::new(Arc::clone(&config)),
            add_synapse: AddSynapseMutator::new(Arc::clone(&config)),
            parameters: ParameterMutator::new(Arc::clone(&config)),
            recombiner: Recombiner::new(Arc::clone(&config), Arc::clone(&ids)),
            distance: CompatibilityDistance::new(Arc::clone(&config)),
            registry,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Arc<NetworkConfig> {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &InnovationRegistry {
        &self.registry
    }

    #[must_use]
    pub fn ids(&self) -> &Arc<IdSource> {
        self.registry.ids()
    }

    /// A minimal genotype: all configured inputs and outputs, fully
    /// connected input-to-output.
    ///
    /// Every seed built by the same evolver shares its gene IDs, since the
    /// registry keys I/O neurons by role and index and synapses by their
    /// endpoints. Allele IDs and sampled parameters stay unique per seed.
    ///
    /// # Errors
    ///
    /// Only on data-model invariant violations.
    pub fn seed_genotype<R: Rng>(&self, rng: &mut R) -> Result<Genotype, EvolveError> {
        let mut genotype = Genotype::new(self.ids().next_id());

        let mut inputs = Vec::with_capacity(self.config.num_inputs);
        for index in 0..self.config.num_inputs {
            let allele = self.registry.io_neuron_allele(NeuronRole::Input, index, rng);
            inputs.push(allele.gene_id());
            genotype.insert(allele)?;
        }
        let mut outputs = Vec::with_capacity(self.config.num_outputs);
        for index in 0..self.config.num_outputs {
            let allele = self.registry.io_neuron_allele(NeuronRole::Output, index, rng);
            outputs.push(allele.gene_id());
            genotype.insert(allele)?;
        }
        for &source in &inputs {
            for &destination in &outputs {
                genotype.insert(self.registry.synapse_allele(source, destination, rng))?;
            }
        }
        Ok(genotype)
    }

    /// Run the full mutation pipeline over `genotype` in place.
    ///
    /// Add-neuron is gated here by `add_neuron_prob`; add-synapse applies its
    /// own per-attempt gating; parameter perturbation always runs.
    ///
    /// # Errors
    ///
    /// Only on data-model invariant violations.
    pub fn mutate<R: Rng>(&self, genotype: &mut Genotype, rng: &mut R) -> Result<(), EvolveError> {
        if rng.random::<f64>() < self.config.add_neuron_prob {
            self.add_neuron.mutate(&self.registry, genotype, rng)?;
        }
        self.add_synapse.mutate(&self.registry, genotype, rng)?;
        self.parameters.mutate(genotype, rng)?;
        Ok(())
    }

    /// Cross `parents` into a child genotype.
    ///
    /// # Errors
    ///
    /// [`RecombineError::TooFewParents`] for fewer than two parents.
    pub fn recombine<R: Rng>(
        &self,
        parents: &[Parent<'_>],
        rng: &mut R,
    ) -> Result<Genotype, EvolveError> {
        Ok(self.recombiner.recombine(parents, rng)?)
    }

    /// Compatibility distance between two genotypes.
    #[must_use]
    pub fn distance(&self, a: &Genotype, b: &Genotype) -> f64 {
        self.distance.distance(a, b)
    }
}
