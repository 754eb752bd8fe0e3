//! Structural and parameter mutation operators.
//!
//! [`AddNeuronMutator`] splits an enabled synapse into two synapses around a
//! new hidden neuron; [`AddSynapseMutator`] connects two previously
//! unconnected neurons, in a fixed-budget or per-pair-probability mode. Both go through
//! the [`InnovationRegistry`] so that identical structural mutations anywhere
//! in the population share genes, and both respect feed-forward cycle
//! avoidance. Running out of legal places to mutate is not an error: the
//! mutators simply perform fewer additions than requested.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::config::{AddSynapseMode, NetworkConfig};
use crate::genotype::{Genotype, GenotypeError};
use crate::innovation::InnovationRegistry;
use crate::vector::VectorError;

/// Errors raised by mutation operators. All variants are invariant
/// violations surfaced from the data model, never "no slot found" outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// A parameter write was rejected.
    #[error(transparent)]
    Vector(#[from] VectorError),
    /// An allele insertion would have duplicated a gene.
    #[error(transparent)]
    Genotype(#[from] GenotypeError),
}

/// Splits enabled synapses to insert new hidden neurons.
#[derive(Debug, Clone)]
pub struct AddNeuronMutator {
    config: Arc<NetworkConfig>,
}

impl AddNeuronMutator {
    #[must_use]
    pub fn new(config: Arc<NetworkConfig>) -> Self {
        Self { config }
    }

    /// Add up to a uniformly sampled `1..=max_neuron_additions` neurons to
    /// `genotype`, returning how many were actually added.
    ///
    /// Each addition splits a randomly chosen enabled synapse: the new
    /// neuron is wired `source -> neuron` with weight 1 and
    /// `neuron -> destination` with the original synapse's weight, and the
    /// original synapse is disabled but kept for historical marking.
    /// Synapses whose split neuron already exists in this genotype are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Only on data-model invariant violations ([`MutationError`]).
    pub fn mutate<R: Rng>(
        &self,
        registry: &InnovationRegistry,
        genotype: &mut Genotype,
        rng: &mut R,
    ) -> Result<usize, MutationError> {
        if self.config.max_neuron_additions == 0 {
            return Ok(0);
        }
        let requested = rng.random_range(1..=self.config.max_neuron_additions);

        let mut candidates: Vec<u64> = genotype.enabled_synapses().map(|(gid, _)| gid).collect();
        candidates.shuffle(rng);

        let mut added = 0;
        for synapse_id in candidates {
            if added == requested {
                break;
            }

            let neuron = registry.split_neuron_allele(synapse_id, rng);
            if genotype.contains_gene(neuron.gene_id()) {
                // Already split the same way in this genotype.
                continue;
            }
            let neuron_id = neuron.gene_id();

            let original = genotype
                .allele(synapse_id)
                .expect("candidate synapse is present");
            let source = original.gene.source().expect("synapse gene has a source");
            let destination = original
                .gene
                .destination()
                .expect("synapse gene has a destination");
            let original_weight = if original.params.is_empty() {
                None
            } else {
                Some(original.params.get(0))
            };

            genotype.insert(neuron)?;

            let mut pre = registry.synapse_allele(source, neuron_id, rng);
            let mut post = registry.synapse_allele(neuron_id, destination, rng);
            if let Some(weight) = original_weight {
                // Preserve the original signal across the split.
                pre.params.set(0, 1.0)?;
                post.params.set(0, weight)?;
            }
            genotype.insert(pre)?;
            genotype.insert(post)?;

            genotype
                .allele_mut(synapse_id)
                .expect("candidate synapse is present")
                .enabled = false;
            added += 1;
        }

        if added < requested {
            debug!(added, requested, "add-neuron exhausted candidate synapses");
        }
        Ok(added)
    }
}

/// Connects previously unconnected neuron pairs.
#[derive(Debug, Clone)]
pub struct AddSynapseMutator {
    config: Arc<NetworkConfig>,
}

impl AddSynapseMutator {
    #[must_use]
    pub fn new(config: Arc<NetworkConfig>) -> Self {
        Self { config }
    }

    /// Apply the configured add-synapse mode to `genotype`, returning how
    /// many synapses were added.
    ///
    /// # Errors
    ///
    /// Only on data-model invariant violations ([`MutationError`]).
    pub fn mutate<R: Rng>(
        &self,
        registry: &InnovationRegistry,
        genotype: &mut Genotype,
        rng: &mut R,
    ) -> Result<usize, MutationError> {
        match self.config.add_synapse_mode {
            AddSynapseMode::Fixed { max_additions } => {
                self.mutate_fixed(registry, genotype, max_additions, rng)
            }
            AddSynapseMode::Any => self.mutate_any(registry, genotype, rng),
        }
    }

    /// Fixed mode: up to `max_additions` attempts, each gated by the apply
    /// rate, each taking the first permissible pair of a fresh random
    /// ordering.
    ///
    /// Known quirk, preserved deliberately: the first attempt whose search
    /// finds no permissible pair stops the whole call, even though a prior
    /// addition could in principle have opened a slot elsewhere.
    fn mutate_fixed<R: Rng>(
        &self,
        registry: &InnovationRegistry,
        genotype: &mut Genotype,
        max_additions: usize,
        rng: &mut R,
    ) -> Result<usize, MutationError> {
        let mut pairs = self.candidate_pairs(genotype);
        let mut added = 0;

        for _ in 0..max_additions {
            if rng.random::<f64>() >= self.config.synapse_apply_rate {
                continue;
            }
            pairs.shuffle(rng);

            let found = pairs
                .iter()
                .copied()
                .find(|&(source, destination)| self.permissible(genotype, source, destination));
            let Some((source, destination)) = found else {
                break;
            };

            genotype.insert(registry.synapse_allele(source, destination, rng))?;
            added += 1;
        }

        Ok(added)
    }

    /// Any mode: every unconnected pair is considered independently with
    /// probability equal to the apply rate.
    fn mutate_any<R: Rng>(
        &self,
        registry: &InnovationRegistry,
        genotype: &mut Genotype,
        rng: &mut R,
    ) -> Result<usize, MutationError> {
        let pairs = self.candidate_pairs(genotype);
        let mut added = 0;

        for (source, destination) in pairs {
            if rng.random::<f64>() >= self.config.synapse_apply_rate {
                continue;
            }
            if !self.permissible(genotype, source, destination) {
                continue;
            }
            genotype.insert(registry.synapse_allele(source, destination, rng))?;
            added += 1;
        }

        Ok(added)
    }

    /// All ordered neuron-ID pairs, self-pairs included; feed-forward mode
    /// rejects those via the cycle test.
    fn candidate_pairs(&self, genotype: &Genotype) -> Vec<(u64, u64)> {
        let neuron_ids = genotype.all_neuron_ids();
        let mut pairs = Vec::with_capacity(neuron_ids.len() * neuron_ids.len());
        for &source in &neuron_ids {
            for &destination in &neuron_ids {
                pairs.push((source, destination));
            }
        }
        pairs
    }

    /// A pair is permissible if no synapse runs between it yet and, for
    /// feed-forward topologies, adding it would not close a directed cycle.
    fn permissible(&self, genotype: &Genotype, source: u64, destination: u64) -> bool {
        if genotype.has_synapse_between(source, destination) {
            return false;
        }
        if self.config.feed_forward() && genotype.path_exists(destination, source) {
            return false;
        }
        true
    }
}

/// Perturbs allele parameter vectors within their bounds.
#[derive(Debug, Clone)]
pub struct ParameterMutator {
    config: Arc<NetworkConfig>,
}

impl ParameterMutator {
    #[must_use]
    pub fn new(config: Arc<NetworkConfig>) -> Self {
        Self { config }
    }

    /// Perturb each allele parameter independently with the configured
    /// probability. The perturbation magnitude is scaled by the element's
    /// bound span; writes clamp and round through [`crate::vector::Vector::set`].
    ///
    /// # Errors
    ///
    /// Only on data-model invariant violations ([`MutationError`]).
    pub fn mutate<R: Rng>(
        &self,
        genotype: &mut Genotype,
        rng: &mut R,
    ) -> Result<(), MutationError> {
        let prob = self.config.parameter_mutation_prob;
        let power = self.config.parameter_mutation_power;

        for allele in genotype.alleles_mut() {
            for index in 0..allele.params.len() {
                if rng.random::<f64>() >= prob {
                    continue;
                }
                let span = allele
                    .params
                    .metadata()
                    .element(index)
                    .map_or(0.0, crate::vector::ElementSpec::span);
                let delta = (rng.random::<f64>() * 2.0 - 1.0) * power * span;
                let current = allele.params.get(index);
                allele.params.set(index, current + delta)?;
            }
        }
        Ok(())
    }
}
