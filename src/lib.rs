//! # NEAT Core
//!
//! A `NeuroEvolution` of Augmenting Topologies (NEAT) genetic encoding and
//! its evolutionary operators: innovation tracking, structural and parameter
//! mutation, compatibility distance, speciation, and multi-parent crossover.
//!
//! ## Features
//!
//! - **Counter-Based Innovation**: A concurrent registry hands out gene IDs
//!   from a shared atomic counter and reuses genes across the population, so
//!   the same structural innovation gets the same ID everywhere
//! - **Bounded Parameter Vectors**: Every gene and allele carries a
//!   metadata-described [`Vector`] whose writes clamp to per-element bounds
//!   and round integer elements
//! - **Feed-Forward Safety**: Add-synapse mutation and union crossover screen
//!   candidate synapses against cycles when the topology is feed-forward
//! - **Two Speciators**: An adaptive-threshold greedy speciator and a
//!   k-means-style centroid speciator over the same compatibility distance
//!
//! ## Quick Start
//!
//! ```rust
//! use neat_core::{Evolver, NetworkConfig, Parent};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let evolver = Evolver::new(NetworkConfig::minimal(2, 1));
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! // Seed two genotypes; they share gene IDs through the registry.
//! let mut a = evolver.seed_genotype(&mut rng).unwrap();
//! let b = evolver.seed_genotype(&mut rng).unwrap();
//!
//! // Mutate one and cross them.
//! evolver.mutate(&mut a, &mut rng).unwrap();
//! let child = evolver
//!     .recombine(
//!         &[
//!             Parent { genotype: &a, rank: 2 },
//!             Parent { genotype: &b, rank: 1 },
//!         ],
//!         &mut rng,
//!     )
//!     .unwrap();
//! println!("child carries {} alleles", child.len());
//! ```
//!
//! ## Architecture
//!
//! ### Genes and Alleles
//!
//! A [`Gene`] is an immutable, population-shared structural unit (a neuron or
//! a synapse between two neuron genes) identified by its innovation ID. An
//! [`Allele`] is one genotype's expression of a gene: a mutable parameter
//! vector plus an enabled flag, holding the gene through an `Arc`. Genotypes
//! key alleles by gene ID in a `BTreeMap`, so the distance metric and the
//! recombiner run linear sorted merges.
//!
//! ### Innovation Registry
//!
//! The [`InnovationRegistry`] keys synapse genes by their endpoints, split
//! neurons by the synapse they split, and I/O neurons by role and index, each
//! in a concurrent map with get-or-create semantics. Equivalent structural
//! mutations anywhere in the population therefore converge on the same gene,
//! which is what makes compatibility distance meaningful.
//!
//! ### Populations and Speciation
//!
//! Individuals and species live in `SlotMap` arenas with generational keys.
//! [`ThresholdSpeciator`] grows species greedily under an adaptive distance
//! threshold; [`KMeansSpeciator`] iterates centroid recomputation and
//! reassignment, parallelized with `rayon`.

pub mod allele;
pub mod config;
pub mod distance;
pub mod evolver;
pub mod gene;
pub mod genotype;
pub mod innovation;
pub mod mutation;
pub mod recombine;
pub mod speciation;
pub mod species;
pub mod vector;

// Re-exports for convenience
pub use allele::Allele;
pub use config::{AddSynapseMode, NetworkConfig, TopologyMode};
pub use distance::CompatibilityDistance;
pub use evolver::{EvolveError, Evolver};
pub use gene::{Gene, GeneKind, NeuronRole};
pub use genotype::{Genotype, GenotypeError};
pub use innovation::{IdSource, InnovationRegistry};
pub use mutation::{AddNeuronMutator, AddSynapseMutator, MutationError, ParameterMutator};
pub use recombine::{Parent, RecombineError, Recombiner};
pub use speciation::{KMeansSpeciator, SpeciationError, ThresholdSpeciator};
pub use species::{Individual, IndividualId, Population, Species, SpeciesId};
pub use vector::{ElementSpec, Vector, VectorError, VectorMetadata};
