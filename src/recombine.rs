//! Multi-parent crossover.
//!
//! The [`Recombiner`] produces a child genotype from two or more ranked
//! parents. When the top-ranked parent strictly dominates the runner-up, the
//! child inherits exactly the dominant parent's gene set; otherwise it
//! inherits the union of all parents' genes, screening feed-forward synapses
//! against cycles as they are accepted. Either way, each inherited allele's
//! enabled flag and parameter values are drawn from the subset of parents
//! carrying that gene.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use crate::config::NetworkConfig;
use crate::genotype::{Genotype, GenotypeError};
use crate::innovation::IdSource;
use crate::vector::{Vector, VectorError};

/// Errors raised by crossover.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecombineError {
    /// Crossover needs at least two parents.
    #[error("recombination requires at least 2 parents, got {0}")]
    TooFewParents(usize),
    /// A parameter write was rejected.
    #[error(transparent)]
    Vector(#[from] VectorError),
    /// An allele insertion would have duplicated a gene.
    #[error(transparent)]
    Genotype(#[from] GenotypeError),
}

/// A parent genotype with its individual's fitness rank.
#[derive(Debug, Clone, Copy)]
pub struct Parent<'a> {
    /// The parent's genotype.
    pub genotype: &'a Genotype,
    /// Fitness rank; higher is fitter.
    pub rank: u32,
}

/// Generalized multi-parent crossover operator.
#[derive(Debug, Clone)]
pub struct Recombiner {
    config: Arc<NetworkConfig>,
    ids: Arc<IdSource>,
}

impl Recombiner {
    #[must_use]
    pub fn new(config: Arc<NetworkConfig>, ids: Arc<IdSource>) -> Self {
        Self { config, ids }
    }

    /// Cross `parents` into a child genotype.
    ///
    /// # Errors
    ///
    /// [`RecombineError::TooFewParents`] for fewer than two parents; other
    /// variants only on data-model invariant violations.
    pub fn recombine<R: Rng>(
        &self,
        parents: &[Parent<'_>],
        rng: &mut R,
    ) -> Result<Genotype, RecombineError> {
        if parents.len() < 2 {
            return Err(RecombineError::TooFewParents(parents.len()));
        }

        let mut ranked: Vec<Parent<'_>> = parents.to_vec();
        ranked.sort_by_key(|p| std::cmp::Reverse(p.rank));
        let dominant = ranked[0].rank > ranked[1].rank;

        let gene_ids: Vec<u64> = if dominant {
            ranked[0].genotype.alleles().map(|a| a.gene_id()).collect()
        } else {
            let mut union = BTreeSet::new();
            for parent in &ranked {
                union.extend(parent.genotype.alleles().map(|a| a.gene_id()));
            }
            union.into_iter().collect()
        };

        let mut child = Genotype::with_parents(
            self.ids.next_id(),
            ranked.iter().map(|p| p.genotype.id).collect(),
        );

        for gene_id in gene_ids {
            let carriers: Vec<&Genotype> = ranked
                .iter()
                .map(|p| p.genotype)
                .filter(|g| g.contains_gene(gene_id))
                .collect();
            let template = carriers[0]
                .allele(gene_id)
                .expect("carrier contains the gene");

            // Union crossover may combine synapses from structurally
            // incompatible parents; screen each one against the synapses
            // already accepted into the child.
            if !dominant && template.is_synapse() && self.config.feed_forward() {
                let source = template.gene.source().expect("synapse gene has a source");
                let destination = template
                    .gene
                    .destination()
                    .expect("synapse gene has a destination");
                if child.path_exists(destination, source) {
                    continue;
                }
            }

            let enabled = carriers[rng.random_range(0..carriers.len())]
                .allele(gene_id)
                .expect("carrier contains the gene")
                .enabled;
            let params = self.inherit_params(gene_id, &carriers, rng)?;

            let mut allele =
                crate::allele::Allele::new(self.ids.next_id(), Arc::clone(&template.gene), params);
            allele.enabled = enabled;
            child.insert(allele)?;
        }

        Ok(child)
    }

    /// Parameter vector for an inherited allele: with probability 0.5 a
    /// verbatim copy from one random carrier, otherwise a convex combination
    /// of all carriers under random weights normalized to sum to 1.
    fn inherit_params<R: Rng>(
        &self,
        gene_id: u64,
        carriers: &[&Genotype],
        rng: &mut R,
    ) -> Result<Vector, RecombineError> {
        if rng.random_bool(0.5) {
            let chosen = carriers[rng.random_range(0..carriers.len())]
                .allele(gene_id)
                .expect("carrier contains the gene");
            return Ok(chosen.params.thawed_copy());
        }

        let mut weights: Vec<f64> = (0..carriers.len()).map(|_| rng.random::<f64>()).collect();
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
        } else {
            weights.fill(1.0 / carriers.len() as f64);
        }

        let template = carriers[0]
            .allele(gene_id)
            .expect("carrier contains the gene");
        let mut params = template.params.thawed_copy();
        for index in 0..params.len() {
            let blended: f64 = carriers
                .iter()
                .zip(&weights)
                .map(|(g, w)| {
                    g.allele(gene_id)
                        .expect("carrier contains the gene")
                        .params
                        .get(index)
                        * w
                })
                .sum();
            params.set(index, blended)?;
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allele::Allele;
    use crate::gene::{Gene, NeuronRole};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn recombiner(config: NetworkConfig) -> Recombiner {
        Recombiner::new(Arc::new(config), Arc::new(IdSource::new(10_000)))
    }

    fn add_neuron(g: &mut Genotype, config: &NetworkConfig, gene_id: u64, rng: &mut ChaCha8Rng) {
        let gene = Gene::neuron(gene_id, NeuronRole::Hidden, config.neuron_gene_params());
        g.insert(Allele::new(
            gene_id + 1000 + g.id * 10_000,
            gene,
            config.neuron_allele_params(rng),
        ))
        .unwrap();
    }

    fn add_synapse(
        g: &mut Genotype,
        config: &NetworkConfig,
        gene_id: u64,
        source: u64,
        destination: u64,
        rng: &mut ChaCha8Rng,
    ) {
        let gene = Gene::synapse(gene_id, source, destination, config.synapse_gene_params());
        g.insert(Allele::new(
            gene_id + 1000 + g.id * 10_000,
            gene,
            config.synapse_allele_params(rng),
        ))
        .unwrap();
    }

    fn gene_ids(g: &Genotype) -> Vec<u64> {
        g.alleles().map(Allele::gene_id).collect()
    }

    #[test]
    fn test_too_few_parents() {
        let config = NetworkConfig::default();
        let mut rng = test_rng();
        let g = Genotype::new(1);
        let err = recombiner(config)
            .recombine(&[Parent { genotype: &g, rank: 1 }], &mut rng)
            .unwrap_err();
        assert_eq!(err, RecombineError::TooFewParents(1));
    }

    #[test]
    fn test_dominant_parent_defines_gene_set() {
        let config = NetworkConfig::default();
        let mut rng = test_rng();

        let mut p1 = Genotype::new(1);
        add_neuron(&mut p1, &config, 1, &mut rng);
        add_neuron(&mut p1, &config, 2, &mut rng);
        let mut p2 = Genotype::new(2);
        add_neuron(&mut p2, &config, 1, &mut rng);
        add_neuron(&mut p2, &config, 7, &mut rng);

        let child = recombiner(config)
            .recombine(
                &[
                    Parent { genotype: &p1, rank: 5 },
                    Parent { genotype: &p2, rank: 3 },
                ],
                &mut rng,
            )
            .unwrap();

        assert_eq!(gene_ids(&child), vec![1, 2]);
        assert_eq!(child.parents, vec![1, 2]);
    }

    #[test]
    fn test_equal_rank_unions_gene_sets() {
        let config = NetworkConfig::default();
        let mut rng = test_rng();

        let mut p1 = Genotype::new(1);
        add_neuron(&mut p1, &config, 1, &mut rng);
        add_neuron(&mut p1, &config, 2, &mut rng);
        let mut p2 = Genotype::new(2);
        add_neuron(&mut p2, &config, 1, &mut rng);
        add_neuron(&mut p2, &config, 7, &mut rng);

        let child = recombiner(config)
            .recombine(
                &[
                    Parent { genotype: &p1, rank: 4 },
                    Parent { genotype: &p2, rank: 4 },
                ],
                &mut rng,
            )
            .unwrap();

        assert_eq!(gene_ids(&child), vec![1, 2, 7]);
    }

    #[test]
    fn test_union_crossover_screens_cycles() {
        let config = NetworkConfig::default();
        assert!(config.feed_forward());
        let mut rng = test_rng();

        // p1: 1 -> 2; p2: 2 -> 1. The union would be cyclic, so whichever
        // synapse is visited second (higher gene ID) must be skipped.
        let mut p1 = Genotype::new(1);
        add_neuron(&mut p1, &config, 1, &mut rng);
        add_neuron(&mut p1, &config, 2, &mut rng);
        add_synapse(&mut p1, &config, 10, 1, 2, &mut rng);
        let mut p2 = Genotype::new(2);
        add_neuron(&mut p2, &config, 1, &mut rng);
        add_neuron(&mut p2, &config, 2, &mut rng);
        add_synapse(&mut p2, &config, 11, 2, 1, &mut rng);

        let child = recombiner(config)
            .recombine(
                &[
                    Parent { genotype: &p1, rank: 4 },
                    Parent { genotype: &p2, rank: 4 },
                ],
                &mut rng,
            )
            .unwrap();

        assert_eq!(gene_ids(&child), vec![1, 2, 10]);
    }

    #[test]
    fn test_recurrent_union_keeps_cycles() {
        let config = NetworkConfig::recurrent(1, 1);
        let mut rng = test_rng();

        let mut p1 = Genotype::new(1);
        add_neuron(&mut p1, &config, 1, &mut rng);
        add_neuron(&mut p1, &config, 2, &mut rng);
        add_synapse(&mut p1, &config, 10, 1, 2, &mut rng);
        let mut p2 = Genotype::new(2);
        add_neuron(&mut p2, &config, 1, &mut rng);
        add_neuron(&mut p2, &config, 2, &mut rng);
        add_synapse(&mut p2, &config, 11, 2, 1, &mut rng);

        let child = recombiner(config)
            .recombine(
                &[
                    Parent { genotype: &p1, rank: 4 },
                    Parent { genotype: &p2, rank: 4 },
                ],
                &mut rng,
            )
            .unwrap();

        assert_eq!(gene_ids(&child), vec![1, 2, 10, 11]);
    }

    #[test]
    fn test_inherited_params_within_carrier_hull() {
        let config = NetworkConfig::default();
        let mut rng = test_rng();

        let mut p1 = Genotype::new(1);
        add_neuron(&mut p1, &config, 1, &mut rng);
        p1.allele_mut(1).unwrap().params.set(0, -1.0).unwrap();
        let mut p2 = Genotype::new(2);
        add_neuron(&mut p2, &config, 1, &mut rng);
        p2.allele_mut(1).unwrap().params.set(0, 2.0).unwrap();

        let r = recombiner(config);
        for _ in 0..50 {
            let child = r
                .recombine(
                    &[
                        Parent { genotype: &p1, rank: 4 },
                        Parent { genotype: &p2, rank: 4 },
                    ],
                    &mut rng,
                )
                .unwrap();
            let v = child.allele(1).unwrap().params.get(0);
            assert!(
                (-1.0..=2.0).contains(&v),
                "inherited value {v} outside the carriers' convex hull"
            );
        }
    }

    #[test]
    fn test_three_parent_union() {
        let config = NetworkConfig::default();
        let mut rng = test_rng();

        let mut p1 = Genotype::new(1);
        add_neuron(&mut p1, &config, 1, &mut rng);
        let mut p2 = Genotype::new(2);
        add_neuron(&mut p2, &config, 2, &mut rng);
        let mut p3 = Genotype::new(3);
        add_neuron(&mut p3, &config, 3, &mut rng);

        let child = recombiner(config)
            .recombine(
                &[
                    Parent { genotype: &p1, rank: 4 },
                    Parent { genotype: &p2, rank: 4 },
                    Parent { genotype: &p3, rank: 2 },
                ],
                &mut rng,
            )
            .unwrap();

        // Top two tie, so the union spans all parents.
        assert_eq!(gene_ids(&child), vec![1, 2, 3]);
    }
}
