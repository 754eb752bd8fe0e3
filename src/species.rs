//! Population, individuals, and species.
//!
//! Individuals and species live in slotmap arenas owned by the
//! [`Population`]; the individual-to-species back-reference is a key, never
//! an owning pointer. All membership mutation goes through [`Population`]
//! methods, which keep the invariant that an individual belongs to exactly
//! the species whose member set contains it.

use std::collections::HashSet;

use slotmap::{new_key_type, SlotMap};

use crate::genotype::Genotype;

new_key_type! {
    /// Arena key of an individual within a population.
    pub struct IndividualId;

    /// Arena key of a species within a population.
    pub struct SpeciesId;
}

/// One member of the population: a genotype plus its fitness rank.
#[derive(Debug, Clone)]
pub struct Individual {
    /// The individual's genetic payload.
    pub genotype: Genotype,
    /// Fitness rank; higher is fitter.
    pub rank: u32,
    species: Option<SpeciesId>,
}

impl Individual {
    /// An unassigned individual.
    #[must_use]
    pub fn new(genotype: Genotype, rank: u32) -> Self {
        Self {
            genotype,
            rank,
            species: None,
        }
    }

    /// The species this individual currently belongs to, if any.
    #[must_use]
    pub fn species(&self) -> Option<SpeciesId> {
        self.species
    }
}

/// A cluster of individuals grouped by genotype similarity.
///
/// The representative is a real individual's genotype for the threshold
/// speciator, or a synthetic centroid genotype for k-means.
#[derive(Debug, Clone)]
pub struct Species {
    /// The genotype other individuals are compared against.
    pub representative: Genotype,
    members: HashSet<IndividualId>,
}

impl Species {
    #[must_use]
    pub fn new(representative: Genotype) -> Self {
        Self {
            representative,
            members: HashSet::new(),
        }
    }

    /// Current member IDs.
    pub fn members(&self) -> impl Iterator<Item = IndividualId> + '_ {
        self.members.iter().copied()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the species has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `individual` is a member.
    #[must_use]
    pub fn contains(&self, individual: IndividualId) -> bool {
        self.members.contains(&individual)
    }
}

/// Arena-owned individuals and species.
#[derive(Debug, Default)]
pub struct Population {
    individuals: SlotMap<IndividualId, Individual>,
    species: SlotMap<SpeciesId, Species>,
}

impl Population {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an individual, returning its arena key.
    pub fn add_individual(&mut self, individual: Individual) -> IndividualId {
        self.individuals.insert(individual)
    }

    /// Add an empty species with the given representative.
    pub fn add_species(&mut self, representative: Genotype) -> SpeciesId {
        self.species.insert(Species::new(representative))
    }

    /// Number of individuals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Whether the population has no individuals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Number of species.
    #[must_use]
    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    #[must_use]
    pub fn individual(&self, id: IndividualId) -> Option<&Individual> {
        self.individuals.get(id)
    }

    pub fn individual_mut(&mut self, id: IndividualId) -> Option<&mut Individual> {
        self.individuals.get_mut(id)
    }

    #[must_use]
    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id)
    }

    pub fn species_mut(&mut self, id: SpeciesId) -> Option<&mut Species> {
        self.species.get_mut(id)
    }

    /// All individual keys.
    #[must_use]
    pub fn individual_ids(&self) -> Vec<IndividualId> {
        self.individuals.keys().collect()
    }

    /// All species keys.
    #[must_use]
    pub fn species_ids(&self) -> Vec<SpeciesId> {
        self.species.keys().collect()
    }

    /// Iterate over individuals.
    pub fn individuals(&self) -> impl Iterator<Item = (IndividualId, &Individual)> {
        self.individuals.iter()
    }

    /// Iterate over species.
    pub fn all_species(&self) -> impl Iterator<Item = (SpeciesId, &Species)> {
        self.species.iter()
    }

    /// Move `individual` into `species`, leaving its previous species if
    /// any. The member-set/back-reference invariant holds on return.
    ///
    /// # Panics
    ///
    /// If either key is stale; a stale key here means corrupted population
    /// state.
    pub fn assign(&mut self, individual: IndividualId, species: SpeciesId) {
        self.unassign(individual);
        self.species[species].members.insert(individual);
        self.individuals[individual].species = Some(species);
    }

    /// Remove `individual` from its species, if it has one.
    ///
    /// # Panics
    ///
    /// If the individual key is stale.
    pub fn unassign(&mut self, individual: IndividualId) {
        if let Some(old) = self.individuals[individual].species.take() {
            if let Some(species) = self.species.get_mut(old) {
                species.members.remove(&individual);
            }
        }
    }

    /// Remove a species, clearing its members' back-references.
    pub fn remove_species(&mut self, id: SpeciesId) {
        if let Some(species) = self.species.remove(id) {
            for member in species.members {
                if let Some(individual) = self.individuals.get_mut(member) {
                    individual.species = None;
                }
            }
        }
    }

    /// Drop every species with no members.
    pub fn remove_empty_species(&mut self) {
        let empty: Vec<SpeciesId> = self
            .species
            .iter()
            .filter(|(_, s)| s.is_empty())
            .map(|(id, _)| id)
            .collect();
        for id in empty {
            self.species.remove(id);
        }
    }

    /// Remove all species and clear every individual's assignment.
    pub fn clear_species(&mut self) {
        self.species.clear();
        for (_, individual) in &mut self.individuals {
            individual.species = None;
        }
    }

    /// Check the speciation invariant: every assignment is mirrored by
    /// membership and vice versa. Intended for tests and debug assertions.
    #[must_use]
    pub fn species_consistent(&self) -> bool {
        for (id, individual) in &self.individuals {
            if let Some(sid) = individual.species {
                match self.species.get(sid) {
                    Some(species) if species.contains(id) => {}
                    _ => return false,
                }
            }
        }
        for (sid, species) in &self.species {
            for member in species.members() {
                match self.individuals.get(member) {
                    Some(individual) if individual.species == Some(sid) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}
