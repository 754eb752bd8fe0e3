//! Innovation-ID bookkeeping with cross-population gene reuse.
//!
//! Historical marking is what lets NEAT align genotypes during crossover and
//! distance computation: the first time a structural mutation occurs anywhere
//! in the population, the [`InnovationRegistry`] allocates a fresh innovation
//! ID and creates the gene; every later occurrence of the *same* structural
//! event (same synapse endpoints, or same split synapse, with the same
//! gene-fixed parameters) reuses the existing gene instance.
//!
//! The registry's tables are the only state mutated concurrently during a
//! parallel mutation pass, so lookups use `DashMap`'s entry API: the
//! read-check-then-insert is atomic per key, and two workers racing on the
//! same structural event in the same generation observe a single gene with a
//! single ID.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use tracing::trace;

use crate::allele::Allele;
use crate::config::NetworkConfig;
use crate::gene::{Gene, NeuronRole};
use crate::vector::ParamKey;

/// Monotonic, thread-safe source of innovation numbers and entity IDs.
#[derive(Debug)]
pub struct IdSource {
    next: AtomicU64,
}

impl IdSource {
    /// An ID source whose first issued ID is `start`.
    #[must_use]
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Issue the next ID.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The ID the next call to [`next_id`](Self::next_id) would return.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdSource {
    fn default() -> Self {
        Self::new(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SynapseKey {
    source: u64,
    destination: u64,
    params: ParamKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SplitKey {
    split_synapse: u64,
    params: ParamKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IoKey {
    role: NeuronRole,
    index: usize,
}

/// Thread-safe gene reuse tables for structural mutations.
#[derive(Debug)]
pub struct InnovationRegistry {
    config: Arc<NetworkConfig>,
    ids: Arc<IdSource>,
    synapses: DashMap<SynapseKey, Arc<Gene>>,
    split_neurons: DashMap<SplitKey, Arc<Gene>>,
    io_neurons: DashMap<IoKey, Arc<Gene>>,
}

impl InnovationRegistry {
    /// A registry drawing IDs from `ids` and vector shapes from `config`.
    #[must_use]
    pub fn new(config: Arc<NetworkConfig>, ids: Arc<IdSource>) -> Self {
        Self {
            config,
            ids,
            synapses: DashMap::new(),
            split_neurons: DashMap::new(),
            io_neurons: DashMap::new(),
        }
    }

    /// The shared ID source.
    #[must_use]
    pub fn ids(&self) -> &Arc<IdSource> {
        &self.ids
    }

    /// A fresh allele over the synapse gene for `source -> destination`.
    ///
    /// The gene is reused if the same endpoints with the same gene-fixed
    /// parameters were seen before; otherwise a new innovation ID is
    /// allocated. The returned allele is always a new instance with freshly
    /// sampled parameters.
    #[must_use]
    pub fn synapse_allele<R: Rng>(&self, source: u64, destination: u64, rng: &mut R) -> Allele {
        let params = self.config.synapse_gene_params();
        let key = SynapseKey {
            source,
            destination,
            params: params.param_key(),
        };
        let gene = self
            .synapses
            .entry(key)
            .or_insert_with(|| {
                let id = self.ids.next_id();
                trace!(id, source, destination, "new synapse gene");
                Gene::synapse(id, source, destination, params)
            })
            .clone();
        Allele::new(
            self.ids.next_id(),
            gene,
            self.config.synapse_allele_params(rng),
        )
    }

    /// A fresh allele over the hidden-neuron gene produced by splitting
    /// synapse `split_synapse`.
    #[must_use]
    pub fn split_neuron_allele<R: Rng>(&self, split_synapse: u64, rng: &mut R) -> Allele {
        let params = self.config.neuron_gene_params();
        let key = SplitKey {
            split_synapse,
            params: params.param_key(),
        };
        let gene = self
            .split_neurons
            .entry(key)
            .or_insert_with(|| {
                let id = self.ids.next_id();
                trace!(id, split_synapse, "new split-neuron gene");
                Gene::neuron(id, NeuronRole::Hidden, params)
            })
            .clone();
        Allele::new(
            self.ids.next_id(),
            gene,
            self.config.neuron_allele_params(rng),
        )
    }

    /// A fresh allele over the `index`-th input or output neuron gene.
    ///
    /// Used at population seeding so that every seeded genotype shares the
    /// same gene IDs for the fixed network interface.
    #[must_use]
    pub fn io_neuron_allele<R: Rng>(&self, role: NeuronRole, index: usize, rng: &mut R) -> Allele {
        let key = IoKey { role, index };
        let gene = self
            .io_neurons
            .entry(key)
            .or_insert_with(|| {
                let id = self.ids.next_id();
                trace!(id, ?role, index, "new interface neuron gene");
                Gene::neuron(id, role, self.config.neuron_gene_params())
            })
            .clone();
        Allele::new(
            self.ids.next_id(),
            gene,
            self.config.neuron_allele_params(rng),
        )
    }

    /// Number of distinct synapse genes allocated so far.
    #[must_use]
    pub fn synapse_gene_count(&self) -> usize {
        self.synapses.len()
    }

    /// Number of distinct split-neuron genes allocated so far.
    #[must_use]
    pub fn split_neuron_gene_count(&self) -> usize {
        self.split_neurons.len()
    }
}
