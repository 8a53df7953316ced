//! Distribution registry: maps a user-visible distribution name (`Normal`,
//! `Gamma`, `Categorical`, …) to its `{continuous, discrete}` category.
//! Unknown names are tagged `Unknown` and still compile.

use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DistributionClass {
    Continuous,
    Discrete,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct DistributionRegistry {
    table: AHashMap<String, DistributionClass>,
}

const CONTINUOUS: &[&str] = &[
    "Normal", "Gamma", "Beta", "Exponential", "Uniform", "Dirichlet", "MultivariateNormal", "Laplace", "StudentT", "Cauchy", "Chi2", "LogNormal",
];

const DISCRETE: &[&str] = &["Bernoulli", "Categorical", "Poisson", "Binomial", "DiscreteUniform", "Geometric", "Multinomial"];

impl DistributionRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut table = AHashMap::new();
        for name in CONTINUOUS {
            table.insert((*name).to_owned(), DistributionClass::Continuous);
        }
        for name in DISCRETE {
            table.insert((*name).to_owned(), DistributionClass::Discrete);
        }
        Self { table }
    }

    /// Registers or overrides a distribution's class, for callers extending
    /// the registry with their own distributions.
    pub fn insert(&mut self, name: impl Into<String>, class: DistributionClass) {
        self.table.insert(name.into(), class);
    }

    #[must_use]
    pub fn classify(&self, name: &str) -> DistributionClass {
        self.table.get(name).copied().unwrap_or(DistributionClass::Unknown)
    }
}

impl Default for DistributionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_distributions() {
        let registry = DistributionRegistry::new();
        assert_eq!(registry.classify("Normal"), DistributionClass::Continuous);
        assert_eq!(registry.classify("Bernoulli"), DistributionClass::Discrete);
        assert_eq!(registry.classify("Frobnicate"), DistributionClass::Unknown);
    }

    #[test]
    fn caller_can_extend_registry() {
        let mut registry = DistributionRegistry::new();
        registry.insert("Weibull", DistributionClass::Continuous);
        assert_eq!(registry.classify("Weibull"), DistributionClass::Continuous);
    }
}
