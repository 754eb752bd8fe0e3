//! Compatibility distance between genotypes.
//!
//! The distance walks both genotypes' alleles in lock-step sorted order, the
//! classic sorted-merge over innovation IDs: matching gene IDs accumulate a
//! parameter difference, non-matching IDs are classified as disjoint (within
//! the other genotype's ID range) or excess (beyond it). The final distance
//! is the weighted sum of the three buckets.

use std::sync::Arc;

use crate::allele::Allele;
use crate::config::NetworkConfig;
use crate::genotype::Genotype;

/// Configurable compatibility distance metric.
#[derive(Debug, Clone)]
pub struct CompatibilityDistance {
    config: Arc<NetworkConfig>,
}

impl CompatibilityDistance {
    #[must_use]
    pub fn new(config: Arc<NetworkConfig>) -> Self {
        Self { config }
    }

    /// Compatibility distance between two genotypes. Symmetric, and zero
    /// for identical genotypes.
    #[must_use]
    pub fn distance(&self, a: &Genotype, b: &Genotype) -> f64 {
        let max_a = a.max_gene_id();
        let max_b = b.max_gene_id();

        let mut excess_sum = 0.0;
        let mut disjoint_sum = 0.0;
        let mut param_sum = 0.0;

        let mut iter_a = a.alleles().peekable();
        let mut iter_b = b.alleles().peekable();

        loop {
            match (iter_a.peek(), iter_b.peek()) {
                (Some(&allele_a), Some(&allele_b)) => {
                    match allele_a.gene_id().cmp(&allele_b.gene_id()) {
                        std::cmp::Ordering::Equal => {
                            param_sum += self.param_difference(allele_a, allele_b);
                            iter_a.next();
                            iter_b.next();
                        }
                        std::cmp::Ordering::Less => {
                            self.mismatch(allele_a, max_b, &mut excess_sum, &mut disjoint_sum);
                            iter_a.next();
                        }
                        std::cmp::Ordering::Greater => {
                            self.mismatch(allele_b, max_a, &mut excess_sum, &mut disjoint_sum);
                            iter_b.next();
                        }
                    }
                }
                (Some(&allele_a), None) => {
                    self.mismatch(allele_a, max_b, &mut excess_sum, &mut disjoint_sum);
                    iter_a.next();
                }
                (None, Some(&allele_b)) => {
                    self.mismatch(allele_b, max_a, &mut excess_sum, &mut disjoint_sum);
                    iter_b.next();
                }
                (None, None) => break,
            }
        }

        self.config.excess_factor * excess_sum
            + self.config.disjoint_factor * disjoint_sum
            + self.config.param_factor * param_sum
    }

    /// Classify a gene missing from the other genotype and add its
    /// contribution to the right bucket. A gene beyond the other genotype's
    /// largest ID is excess; anything else (including every gene when the
    /// other genotype is empty, where `other_max` is `None`) follows the
    /// range rule.
    fn mismatch(
        &self,
        allele: &Allele,
        other_max: Option<u64>,
        excess_sum: &mut f64,
        disjoint_sum: &mut f64,
    ) {
        let contribution = if self.config.mismatch_uses_values && !allele.params.is_empty() {
            allele.params.get(0).abs()
        } else {
            1.0
        };
        match other_max {
            Some(max) if allele.gene_id() <= max => *disjoint_sum += contribution,
            _ => *excess_sum += contribution,
        }
    }

    /// Element-wise parameter difference between two alleles of the same
    /// gene, raw or normalized to the unit interval by the element bounds.
    fn param_difference(&self, a: &Allele, b: &Allele) -> f64 {
        let mut sum = 0.0;
        for index in 0..a.params.len().min(b.params.len()) {
            let diff = (a.params.get(index) - b.params.get(index)).abs();
            if self.config.normalized_params {
                let span = a
                    .params
                    .metadata()
                    .element(index)
                    .map_or(0.0, crate::vector::ElementSpec::span);
                if span > 0.0 {
                    sum += diff / span;
                } else {
                    sum += diff;
                }
            } else {
                sum += diff;
            }
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allele::Allele;
    use crate::gene::{Gene, NeuronRole};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn metric(config: NetworkConfig) -> CompatibilityDistance {
        CompatibilityDistance::new(Arc::new(config))
    }

    fn neuron_allele(config: &NetworkConfig, gene_id: u64, rng: &mut ChaCha8Rng) -> Allele {
        let gene = Gene::neuron(gene_id, NeuronRole::Hidden, config.neuron_gene_params());
        Allele::new(gene_id + 1000, gene, config.neuron_allele_params(rng))
    }

    fn genotype_with_genes(
        config: &NetworkConfig,
        id: u64,
        gene_ids: &[u64],
        rng: &mut ChaCha8Rng,
    ) -> Genotype {
        let mut g = Genotype::new(id);
        for &gid in gene_ids {
            g.insert(neuron_allele(config, gid, rng)).unwrap();
        }
        g
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let config = NetworkConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let g = genotype_with_genes(&config, 1, &[1, 2, 3, 7], &mut rng);
        let d = metric(config).distance(&g, &g);
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn test_distance_symmetric() {
        let config = NetworkConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let a = genotype_with_genes(&config, 1, &[1, 2, 3, 9], &mut rng);
        let b = genotype_with_genes(&config, 2, &[1, 3, 5, 6], &mut rng);
        let m = metric(config);
        assert!((m.distance(&a, &b) - m.distance(&b, &a)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_genotype_counts_all_excess() {
        let config = NetworkConfig {
            excess_factor: 2.5,
            mismatch_uses_values: false,
            ..NetworkConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let full = genotype_with_genes(&config, 1, &[1, 2, 3], &mut rng);
        let empty = Genotype::new(2);
        let m = metric(config);
        assert!((m.distance(&full, &empty) - 2.5 * 3.0).abs() < 1e-12);
        assert!((m.distance(&empty, &full) - 2.5 * 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_excess_vs_disjoint_classification() {
        // a: genes 1, 2, 5     b: genes 1, 3, 4, 8
        // gene 2 is within b's range (disjoint); gene 5 is within b's range
        // (disjoint); genes 3, 4 are within a's range (disjoint); gene 8 is
        // beyond a's max of 5 (excess).
        let config = NetworkConfig {
            excess_factor: 100.0,
            disjoint_factor: 1.0,
            param_factor: 0.0,
            mismatch_uses_values: false,
            ..NetworkConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let a = genotype_with_genes(&config, 1, &[1, 2, 5], &mut rng);
        let b = genotype_with_genes(&config, 2, &[1, 3, 4, 8], &mut rng);
        let d = metric(config).distance(&a, &b);
        assert!((d - (100.0 + 4.0)).abs() < 1e-12);
    }

    #[test]
    fn test_param_difference_accumulates() {
        let config = NetworkConfig {
            excess_factor: 0.0,
            disjoint_factor: 0.0,
            param_factor: 1.0,
            ..NetworkConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut a = genotype_with_genes(&config, 1, &[1], &mut rng);
        let mut b = genotype_with_genes(&config, 2, &[1], &mut rng);
        a.allele_mut(1).unwrap().params.set(0, 1.0).unwrap();
        b.allele_mut(1).unwrap().params.set(0, -2.0).unwrap();
        let d = metric(config).distance(&a, &b);
        assert!((d - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_params() {
        // bias bounds are [-3, 3], span 6; |1 - (-2)| / 6 = 0.5.
        let config = NetworkConfig {
            excess_factor: 0.0,
            disjoint_factor: 0.0,
            param_factor: 1.0,
            normalized_params: true,
            ..NetworkConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut a = genotype_with_genes(&config, 1, &[1], &mut rng);
        let mut b = genotype_with_genes(&config, 2, &[1], &mut rng);
        a.allele_mut(1).unwrap().params.set(0, 1.0).unwrap();
        b.allele_mut(1).unwrap().params.set(0, -2.0).unwrap();
        let d = metric(config).distance(&a, &b);
        assert!((d - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_mismatch_uses_values() {
        let config = NetworkConfig {
            excess_factor: 1.0,
            disjoint_factor: 1.0,
            param_factor: 0.0,
            mismatch_uses_values: true,
            ..NetworkConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut a = genotype_with_genes(&config, 1, &[1, 2], &mut rng);
        let b = genotype_with_genes(&config, 2, &[1], &mut rng);
        a.allele_mut(2).unwrap().params.set(0, -1.5).unwrap();
        let d = metric(config).distance(&a, &b);
        assert!((d - 1.5).abs() < 1e-12);
    }
}
