//! Speciation strategies: adaptive threshold and k-means.
//!
//! Both strategies partition a [`Population`] into species for fitness
//! sharing. [`ThresholdSpeciator`] is the original NEAT style: sequential,
//! rank-ordered assignment against species representatives under an
//! adaptively tuned compatibility threshold. [`KMeansSpeciator`] treats
//! genotypes as points, iterating centroid recomputation and parallel
//! reassignment until stable.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::allele::Allele;
use crate::config::NetworkConfig;
use crate::distance::CompatibilityDistance;
use crate::genotype::Genotype;
use crate::innovation::IdSource;
use crate::species::{IndividualId, Population, SpeciesId};

/// Errors raised by speciation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeciationError {
    /// A centroid was requested for a species with no members. Speciators
    /// must never ask for one; this indicates corrupted clustering state.
    #[error("cannot compute centroid of empty species")]
    EmptySpecies,
}

/// Synthetic centroid genotype for a set of member individuals.
///
/// For every gene carried by at least one member, the centroid carries an
/// enabled allele whose parameters are the element-wise average over the
/// members that carry the gene. Members lacking a gene are skipped for that
/// gene, not treated as zero.
///
/// # Errors
///
/// [`SpeciationError::EmptySpecies`] if `members` is empty.
pub fn species_centroid(
    population: &Population,
    members: &[IndividualId],
    ids: &IdSource,
) -> Result<Genotype, SpeciationError> {
    if members.is_empty() {
        return Err(SpeciationError::EmptySpecies);
    }

    // Gene ID -> carrier alleles, ordered so the centroid's allele set is
    // deterministic for a given membership.
    let mut carriers: BTreeMap<u64, Vec<&Allele>> = BTreeMap::new();
    for &member in members {
        let individual = population
            .individual(member)
            .expect("species member is in the population");
        for allele in individual.genotype.alleles() {
            carriers.entry(allele.gene_id()).or_default().push(allele);
        }
    }

    let mut centroid = Genotype::new(ids.next_id());
    for (_, alleles) in carriers {
        let first = alleles[0];
        let mut params = first.params.thawed_copy();
        for index in 0..params.len() {
            let sum: f64 = alleles.iter().map(|a| a.params.get(index)).sum();
            params
                .set(index, sum / alleles.len() as f64)
                .expect("averaged value of bounded finite values is finite");
        }
        let allele = Allele::new(ids.next_id(), Arc::clone(&first.gene), params);
        centroid
            .insert(allele)
            .expect("carrier map holds one entry per gene");
    }
    Ok(centroid)
}

/// Original-NEAT threshold speciation with adaptive threshold.
#[derive(Debug)]
pub struct ThresholdSpeciator {
    config: Arc<NetworkConfig>,
    distance: CompatibilityDistance,
    threshold: f64,
    generation: u64,
    last_adjusted: u64,
    forced_streak: u32,
}

impl ThresholdSpeciator {
    #[must_use]
    pub fn new(config: Arc<NetworkConfig>) -> Self {
        let distance = CompatibilityDistance::new(Arc::clone(&config));
        let threshold = config.initial_threshold;
        Self {
            config,
            distance,
            threshold,
            generation: 0,
            last_adjusted: 0,
            forced_streak: 0,
        }
    }

    /// The current compatibility threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Assign every unassigned individual to a species.
    ///
    /// Individuals are processed sequentially in descending rank order, so
    /// higher-ranked individuals preferentially seed new species. Each one
    /// joins the *closest* species whose representative is within the
    /// threshold, or founds a new species with a copy of its own genotype
    /// as representative. Empty species are removed afterwards, then the
    /// threshold is adjusted toward the target species count if configured.
    pub fn speciate(&mut self, population: &mut Population) {
        self.generation += 1;

        let mut unassigned: Vec<IndividualId> = population
            .individuals()
            .filter(|(_, ind)| ind.species().is_none())
            .map(|(id, _)| id)
            .collect();
        unassigned.sort_by_key(|&id| {
            let ind = population.individual(id).expect("id from this population");
            (std::cmp::Reverse(ind.rank), id)
        });

        for id in unassigned {
            let genotype = &population
                .individual(id)
                .expect("id from this population")
                .genotype;

            let mut best: Option<(SpeciesId, f64)> = None;
            for (sid, species) in population.all_species() {
                let d = self.distance.distance(genotype, &species.representative);
                if d >= self.threshold {
                    continue;
                }
                match best {
                    Some((_, best_d)) if d >= best_d => {}
                    _ => best = Some((sid, d)),
                }
            }

            let target = match best {
                Some((sid, _)) => sid,
                None => {
                    let representative = genotype.clone();
                    population.add_species(representative)
                }
            };
            population.assign(id, target);
        }

        population.remove_empty_species();
        self.adjust_threshold(population);
        debug_assert!(population.species_consistent());
    }

    fn adjust_threshold(&mut self, population: &mut Population) {
        let Some(target) = self.config.target_species else {
            return;
        };
        if target == 0 {
            return;
        }
        let elapsed = self.generation - self.last_adjusted;
        if elapsed < self.config.threshold_adjust_period {
            return;
        }
        let actual = population.species_count();
        if actual == target {
            return;
        }

        let ratio = actual as f64 / target as f64;
        self.threshold *= ratio;
        let at_earliest = elapsed == self.config.threshold_adjust_period;
        self.forced_streak = if at_earliest {
            self.forced_streak + 1
        } else {
            0
        };
        self.last_adjusted = self.generation;
        debug!(
            threshold = self.threshold,
            actual,
            target,
            streak = self.forced_streak,
            "adjusted compatibility threshold"
        );

        // Three consecutive earliest-opportunity adjustments mean the
        // incremental assignment cannot catch up: drop all assignments so
        // the next call re-partitions under the new threshold.
        if self.forced_streak >= 3 {
            population.clear_species();
            self.forced_streak = 0;
        }
    }
}

/// K-means speciation over genotype-valued points.
#[derive(Debug)]
pub struct KMeansSpeciator {
    config: Arc<NetworkConfig>,
    distance: CompatibilityDistance,
    ids: Arc<IdSource>,
}

impl KMeansSpeciator {
    #[must_use]
    pub fn new(config: Arc<NetworkConfig>, ids: Arc<IdSource>) -> Self {
        let distance = CompatibilityDistance::new(Arc::clone(&config));
        Self {
            config,
            distance,
            ids,
        }
    }

    /// Species count for a population of `n`: configured, or `n^0.6`
    /// rounded, clamped to `1..=n`.
    #[must_use]
    pub fn species_count_for(&self, n: usize) -> usize {
        let k = self
            .config
            .species_count
            .unwrap_or_else(|| (n as f64).powf(0.6).round() as usize);
        k.clamp(1, n.max(1))
    }

    /// Partition the population into K species.
    ///
    /// If the existing species count differs from K, all species are
    /// discarded and K new ones are seeded with random individuals'
    /// genotypes. Each iteration recomputes centroids (parallel),
    /// reassigns every individual to its closest species (parallel
    /// decisions, ties keep the current species), and refills species
    /// that went empty with the individuals farthest from their current
    /// centroid. Stops on a clean iteration or at the iteration cap.
    pub fn speciate<R: Rng>(&self, population: &mut Population, rng: &mut R) {
        let n = population.len();
        if n == 0 {
            return;
        }
        let k = self.species_count_for(n);

        if population.species_count() != k {
            population.clear_species();
            let individual_ids = population.individual_ids();
            for index in rand::seq::index::sample(rng, n, k) {
                let representative = population
                    .individual(individual_ids[index])
                    .expect("id from this population")
                    .genotype
                    .clone();
                population.add_species(representative);
            }
        }

        for iteration in 0..self.config.kmeans_max_iterations {
            self.recompute_centroids(population);
            let moved = self.reassign(population);
            let refilled = self.refill_empty(population);
            debug!(iteration, moved, refilled, "k-means iteration");
            debug_assert!(population.species_consistent());
            if moved == 0 && refilled == 0 {
                break;
            }
        }
    }

    /// Replace each non-empty species' representative with its centroid.
    /// Centroids are computed in parallel, then applied sequentially.
    fn recompute_centroids(&self, population: &mut Population) {
        let memberships: Vec<(SpeciesId, Vec<IndividualId>)> = population
            .all_species()
            .filter(|(_, s)| !s.is_empty())
            .map(|(sid, s)| (sid, s.members().collect()))
            .collect();

        let pop_ref: &Population = population;
        let ids = &self.ids;
        let centroids: Vec<(SpeciesId, Genotype)> = memberships
            .par_iter()
            .map(|(sid, members)| {
                let centroid = species_centroid(pop_ref, members, ids)
                    .expect("membership list is non-empty");
                (*sid, centroid)
            })
            .collect();

        for (sid, centroid) in centroids {
            population
                .species_mut(sid)
                .expect("species id from this population")
                .representative = centroid;
        }
    }

    /// Reassign every individual to its closest species. Decisions are
    /// computed in parallel against an immutable population snapshot, then
    /// applied sequentially. Returns the number of individuals that moved.
    fn reassign(&self, population: &mut Population) -> usize {
        let individual_ids = population.individual_ids();
        let pop_ref: &Population = population;

        let decisions: Vec<(IndividualId, SpeciesId)> = individual_ids
            .par_iter()
            .map(|&id| {
                let individual = pop_ref.individual(id).expect("id from this population");
                // Seed with the current species so equal distances keep
                // the individual where it is.
                let mut best: Option<(SpeciesId, f64)> =
                    individual.species().and_then(|sid| {
                        pop_ref.species(sid).map(|s| {
                            (
                                sid,
                                self.distance.distance(&individual.genotype, &s.representative),
                            )
                        })
                    });
                for (sid, species) in pop_ref.all_species() {
                    if best.is_some_and(|(b, _)| b == sid) {
                        continue;
                    }
                    let d = self
                        .distance
                        .distance(&individual.genotype, &species.representative);
                    match best {
                        Some((_, best_d)) if d >= best_d => {}
                        _ => best = Some((sid, d)),
                    }
                }
                let (sid, _) = best.expect("at least one species exists");
                (id, sid)
            })
            .collect();

        let mut moved = 0;
        for (id, sid) in decisions {
            if population
                .individual(id)
                .expect("id from this population")
                .species()
                != Some(sid)
            {
                population.assign(id, sid);
                moved += 1;
            }
        }
        moved
    }

    /// Refill species that went empty: each takes the globally farthest
    /// individual from its current species' representative, skipping sole
    /// members so the donor species does not empty in turn. The moved
    /// individual becomes the sole member and new representative. Returns
    /// the number of refills performed.
    fn refill_empty(&self, population: &mut Population) -> usize {
        let empty: Vec<SpeciesId> = population
            .all_species()
            .filter(|(_, s)| s.is_empty())
            .map(|(sid, _)| sid)
            .collect();

        let mut refilled = 0;
        for empty_sid in empty {
            let mut farthest: Option<(IndividualId, f64)> = None;
            for (id, individual) in population.individuals() {
                let Some(current) = individual.species() else {
                    continue;
                };
                let species = population
                    .species(current)
                    .expect("assignment points at a live species");
                if species.len() <= 1 {
                    continue;
                }
                let d = self
                    .distance
                    .distance(&individual.genotype, &species.representative);
                match farthest {
                    Some((_, best_d)) if d <= best_d => {}
                    _ => farthest = Some((id, d)),
                }
            }

            let Some((id, _)) = farthest else {
                continue;
            };
            let representative = population
                .individual(id)
                .expect("id from this population")
                .genotype
                .clone();
            population.assign(id, empty_sid);
            population
                .species_mut(empty_sid)
                .expect("species id from this population")
                .representative = representative;
            refilled += 1;
        }
        refilled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{Gene, NeuronRole};
    use crate::species::Individual;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn genotype_with_genes(
        config: &NetworkConfig,
        id: u64,
        gene_ids: &[u64],
        rng: &mut ChaCha8Rng,
    ) -> Genotype {
        let mut g = Genotype::new(id);
        for &gid in gene_ids {
            let gene = Gene::neuron(gid, NeuronRole::Hidden, config.neuron_gene_params());
            g.insert(Allele::new(
                gid + 1000 + id * 10_000,
                gene,
                config.neuron_allele_params(rng),
            ))
            .unwrap();
        }
        g
    }

    /// Two well-separated structural clusters of genotypes. Parameters are
    /// zeroed so only the structural mismatch contributes to distance:
    /// within a cluster the distance is 0, across clusters it is 7.
    fn clustered_population(config: &NetworkConfig, rng: &mut ChaCha8Rng) -> Population {
        let mut pop = Population::new();
        for i in 0..5u64 {
            let mut g = genotype_with_genes(config, i + 1, &[1, 2, 3], rng);
            zero_params(&mut g);
            pop.add_individual(Individual::new(g, 10 - i as u32));
        }
        for i in 0..5u64 {
            let mut g = genotype_with_genes(config, i + 6, &[50, 51, 52, 53], rng);
            zero_params(&mut g);
            pop.add_individual(Individual::new(g, 5 - i as u32));
        }
        pop
    }

    fn zero_params(genotype: &mut Genotype) {
        for allele in genotype.alleles_mut() {
            for index in 0..allele.params.len() {
                allele.params.set(index, 0.0).unwrap();
            }
        }
    }

    #[test]
    fn test_centroid_averages_carriers_only() {
        let config = NetworkConfig::default();
        let mut rng = test_rng();
        let mut pop = Population::new();

        let mut a = genotype_with_genes(&config, 1, &[1, 2], &mut rng);
        let mut b = genotype_with_genes(&config, 2, &[1], &mut rng);
        a.allele_mut(1).unwrap().params.set(0, 1.0).unwrap();
        a.allele_mut(2).unwrap().params.set(0, 2.0).unwrap();
        b.allele_mut(1).unwrap().params.set(0, 3.0).unwrap();

        let ia = pop.add_individual(Individual::new(a, 0));
        let ib = pop.add_individual(Individual::new(b, 0));
        let ids = IdSource::new(1000);

        let centroid = species_centroid(&pop, &[ia, ib], &ids).unwrap();
        assert_eq!(centroid.len(), 2);
        // Gene 1 is carried by both: (1 + 3) / 2.
        assert!((centroid.allele(1).unwrap().params.get(0) - 2.0).abs() < 1e-12);
        // Gene 2 is carried only by `a`: average over carriers, not zeros.
        assert!((centroid.allele(2).unwrap().params.get(0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_of_empty_species_rejected() {
        let pop = Population::new();
        let ids = IdSource::new(1);
        assert!(matches!(
            species_centroid(&pop, &[], &ids),
            Err(SpeciationError::EmptySpecies)
        ));
    }

    #[test]
    fn test_threshold_separates_clusters() {
        let config = Arc::new(NetworkConfig {
            initial_threshold: 3.5,
            ..NetworkConfig::default()
        });
        let mut rng = test_rng();
        let mut pop = clustered_population(&config, &mut rng);

        let mut speciator = ThresholdSpeciator::new(Arc::clone(&config));
        speciator.speciate(&mut pop);

        assert_eq!(pop.species_count(), 2);
        assert!(pop.species_consistent());
        for (_, individual) in pop.individuals() {
            assert!(individual.species().is_some());
        }
        for (_, species) in pop.all_species() {
            assert!(!species.is_empty());
        }
    }

    #[test]
    fn test_threshold_assigned_individuals_untouched() {
        let config = Arc::new(NetworkConfig::default());
        let mut rng = test_rng();
        let mut pop = clustered_population(&config, &mut rng);

        let mut speciator = ThresholdSpeciator::new(Arc::clone(&config));
        speciator.speciate(&mut pop);
        let before: Vec<Option<SpeciesId>> = pop
            .individual_ids()
            .iter()
            .map(|&id| pop.individual(id).unwrap().species())
            .collect();

        // A second pass with nothing unassigned changes nothing.
        speciator.speciate(&mut pop);
        let after: Vec<Option<SpeciesId>> = pop
            .individual_ids()
            .iter()
            .map(|&id| pop.individual(id).unwrap().species())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_threshold_adjusts_toward_target() {
        let config = Arc::new(NetworkConfig {
            initial_threshold: 0.5,
            target_species: Some(1),
            threshold_adjust_period: 1,
            ..NetworkConfig::default()
        });
        let mut rng = test_rng();
        let mut pop = clustered_population(&config, &mut rng);

        let mut speciator = ThresholdSpeciator::new(Arc::clone(&config));
        let initial = speciator.threshold();
        speciator.speciate(&mut pop);
        // More species than the target of 1 raises the threshold.
        assert!(speciator.threshold() > initial);
    }

    #[test]
    fn test_threshold_streak_clears_assignments() {
        let config = Arc::new(NetworkConfig {
            initial_threshold: 0.01,
            target_species: Some(1),
            threshold_adjust_period: 1,
            ..NetworkConfig::default()
        });
        let mut rng = test_rng();
        let mut pop = clustered_population(&config, &mut rng);

        let mut speciator = ThresholdSpeciator::new(Arc::clone(&config));
        // Each pass forces an adjustment at the earliest opportunity; the
        // third clears all assignments.
        speciator.speciate(&mut pop);
        speciator.speciate(&mut pop);
        speciator.speciate(&mut pop);
        assert_eq!(pop.species_count(), 0);
        for (_, individual) in pop.individuals() {
            assert!(individual.species().is_none());
        }
    }

    #[test]
    fn test_kmeans_invariants_and_convergence() {
        let config = Arc::new(NetworkConfig {
            species_count: Some(2),
            kmeans_max_iterations: 20,
            ..NetworkConfig::default()
        });
        let mut rng = test_rng();
        let mut pop = clustered_population(&config, &mut rng);

        let ids = Arc::new(IdSource::new(100_000));
        let speciator = KMeansSpeciator::new(Arc::clone(&config), ids);
        speciator.speciate(&mut pop, &mut rng);

        assert_eq!(pop.species_count(), 2);
        assert!(pop.species_consistent());
        for (_, species) in pop.all_species() {
            assert!(!species.is_empty());
        }
        for (_, individual) in pop.individuals() {
            assert!(individual.species().is_some());
        }

        // A second run over the converged population reproduces the same
        // partition.
        let before: Vec<Option<SpeciesId>> = pop
            .individual_ids()
            .iter()
            .map(|&id| pop.individual(id).unwrap().species())
            .collect();
        speciator.speciate(&mut pop, &mut rng);
        let after: Vec<Option<SpeciesId>> = pop
            .individual_ids()
            .iter()
            .map(|&id| pop.individual(id).unwrap().species())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_kmeans_default_species_count() {
        let config = Arc::new(NetworkConfig::default());
        let ids = Arc::new(IdSource::new(100_000));
        let speciator = KMeansSpeciator::new(config, ids);
        // 100^0.6 = 15.8 -> 16.
        assert_eq!(speciator.species_count_for(100), 16);
        assert_eq!(speciator.species_count_for(1), 1);
        // Clamped to the population size.
        assert_eq!(speciator.species_count_for(2), 2);
    }

    #[test]
    fn test_kmeans_reseeds_on_count_mismatch() {
        let config = Arc::new(NetworkConfig {
            species_count: Some(3),
            ..NetworkConfig::default()
        });
        let mut rng = test_rng();
        let mut pop = clustered_population(&config, &mut rng);
        // Leave a stale single species behind.
        pop.add_species(Genotype::new(999));

        let ids = Arc::new(IdSource::new(100_000));
        let speciator = KMeansSpeciator::new(Arc::clone(&config), ids);
        speciator.speciate(&mut pop, &mut rng);

        assert_eq!(pop.species_count(), 3);
        for (_, species) in pop.all_species() {
            assert!(!species.is_empty());
        }
    }
}
