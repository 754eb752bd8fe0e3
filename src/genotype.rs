//! Genotypes: ordered, gene-ID-unique allele collections.
//!
//! A [`Genotype`] is an ordered, gene-ID-unique collection of alleles plus
//! parent lineage. Alleles are keyed by gene ID in a `BTreeMap`, which gives
//! the sorted iteration order the distance metric and recombiner rely on for
//! linear merge-style algorithms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allele::Allele;
use crate::gene::NeuronRole;

/// Errors raised by genotype membership operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenotypeError {
    /// An allele for this gene ID is already present. A gene ID appears at
    /// most once among a genotype's alleles; a duplicate indicates corrupted
    /// population state.
    #[error("gene {0} already present in genotype")]
    DuplicateGene(u64),
}

/// One individual's heritable network structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genotype {
    /// Unique genotype ID.
    pub id: u64,
    /// Alleles keyed by gene ID, iterated in ascending gene-ID order.
    alleles: BTreeMap<u64, Allele>,
    /// IDs of the genotypes this one was derived from. Record-keeping only.
    pub parents: Vec<u64>,
}

impl Genotype {
    /// An empty genotype with no lineage.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            alleles: BTreeMap::new(),
            parents: Vec::new(),
        }
    }

    /// An empty genotype recording its parent genotype IDs.
    #[must_use]
    pub fn with_parents(id: u64, parents: Vec<u64>) -> Self {
        Self {
            id,
            alleles: BTreeMap::new(),
            parents,
        }
    }

    /// A full copy of this genotype under a new ID, with this genotype as
    /// sole recorded parent. Allele parameter vectors are independent copies;
    /// genes stay shared.
    #[must_use]
    pub fn offspring_copy(&self, new_id: u64) -> Self {
        Self {
            id: new_id,
            alleles: self
                .alleles
                .iter()
                .map(|(&gid, a)| (gid, a.duplicate()))
                .collect(),
            parents: vec![self.id],
        }
    }

    /// Insert an allele.
    ///
    /// # Errors
    ///
    /// [`GenotypeError::DuplicateGene`] if an allele for the same gene is
    /// already present; the genotype is left unchanged.
    pub fn insert(&mut self, allele: Allele) -> Result<(), GenotypeError> {
        let gene_id = allele.gene_id();
        if self.alleles.contains_key(&gene_id) {
            return Err(GenotypeError::DuplicateGene(gene_id));
        }
        self.alleles.insert(gene_id, allele);
        Ok(())
    }

    /// Remove and return the allele for `gene_id`, if present.
    pub fn remove(&mut self, gene_id: u64) -> Option<Allele> {
        self.alleles.remove(&gene_id)
    }

    /// Whether an allele for `gene_id` is present.
    #[must_use]
    pub fn contains_gene(&self, gene_id: u64) -> bool {
        self.alleles.contains_key(&gene_id)
    }

    /// The allele for `gene_id`, if present.
    #[must_use]
    pub fn allele(&self, gene_id: u64) -> Option<&Allele> {
        self.alleles.get(&gene_id)
    }

    /// Mutable access to the allele for `gene_id`, if present.
    pub fn allele_mut(&mut self, gene_id: u64) -> Option<&mut Allele> {
        self.alleles.get_mut(&gene_id)
    }

    /// All alleles in ascending gene-ID order.
    pub fn alleles(&self) -> impl Iterator<Item = &Allele> {
        self.alleles.values()
    }

    /// Mutable iteration over all alleles in ascending gene-ID order.
    pub fn alleles_mut(&mut self) -> impl Iterator<Item = &mut Allele> {
        self.alleles.values_mut()
    }

    /// Number of alleles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    /// Whether the genotype carries no alleles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    /// Largest gene ID present, if any.
    #[must_use]
    pub fn max_gene_id(&self) -> Option<u64> {
        self.alleles.keys().next_back().copied()
    }

    /// Neuron alleles keyed by gene ID.
    pub fn neurons(&self) -> impl Iterator<Item = (u64, &Allele)> {
        self.alleles
            .iter()
            .filter(|(_, a)| a.is_neuron())
            .map(|(&gid, a)| (gid, a))
    }

    /// Synapse alleles keyed by gene ID.
    pub fn synapses(&self) -> impl Iterator<Item = (u64, &Allele)> {
        self.alleles
            .iter()
            .filter(|(_, a)| a.is_synapse())
            .map(|(&gid, a)| (gid, a))
    }

    /// Enabled synapse alleles keyed by gene ID.
    pub fn enabled_synapses(&self) -> impl Iterator<Item = (u64, &Allele)> {
        self.synapses().filter(|(_, a)| a.enabled)
    }

    /// Gene IDs of all neurons with the given role.
    #[must_use]
    pub fn neuron_ids(&self, role: NeuronRole) -> Vec<u64> {
        self.neurons()
            .filter(|(_, a)| a.role() == Some(role))
            .map(|(gid, _)| gid)
            .collect()
    }

    /// Gene IDs of all neurons, regardless of role.
    #[must_use]
    pub fn all_neuron_ids(&self) -> Vec<u64> {
        self.neurons().map(|(gid, _)| gid).collect()
    }

    /// Whether any synapse (enabled or not) already runs `source ->
    /// destination`.
    #[must_use]
    pub fn has_synapse_between(&self, source: u64, destination: u64) -> bool {
        self.synapses().any(|(_, a)| {
            a.gene.source() == Some(source) && a.gene.destination() == Some(destination)
        })
    }

    /// Whether a directed path over enabled synapses runs from `from` to
    /// `to`. `from == to` counts as reachable, so a prospective self-loop is
    /// reported as a cycle.
    ///
    /// This is the cycle test for feed-forward topologies: adding the edge
    /// `(s -> d)` creates a cycle iff a path already exists from `d` to `s`.
    #[must_use]
    pub fn path_exists(&self, from: u64, to: u64) -> bool {
        if from == to {
            return true;
        }

        // DFS over enabled synapses, each neuron visited at most once.
        let mut visited = std::collections::HashSet::new();
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for (_, synapse) in self.enabled_synapses() {
                if synapse.gene.source() == Some(current) {
                    let next = synapse
                        .gene
                        .destination()
                        .expect("synapse gene has a destination");
                    if next == to {
                        return true;
                    }
                    if !visited.contains(&next) {
                        stack.push(next);
                    }
                }
            }
        }

        false
    }
}
