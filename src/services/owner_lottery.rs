// src/services/owner_lottery.rs

use std::sync::Mutex;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::common::error::AppError;

/// "Ruleta": sorteio uniforme do dono entre os membros do grupo.
pub struct OwnerLottery {
    rng: Mutex<StdRng>,
}

impl OwnerLottery {
    pub fn from_entropy() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn pick(&self, members: &[String]) -> Result<String, AppError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow::anyhow!("RNG da ruleta envenenado"))?;
        members
            .choose(&mut *rng)
            .cloned()
            .ok_or_else(|| AppError::InvalidInput("o grupo de donos do Salesforce está vazio".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_group_is_an_error() {
        assert!(OwnerLottery::seeded(1).pick(&[]).is_err());
    }

    #[test]
    fn single_member_always_wins() {
        let lottery = OwnerLottery::seeded(1);
        let members = vec!["005A".to_string()];
        for _ in 0..10 {
            assert_eq!(lottery.pick(&members).unwrap(), "005A");
        }
    }

    #[test]
    fn distribution_is_not_degenerate() {
        let lottery = OwnerLottery::seeded(42);
        let members: Vec<String> = (0..4).map(|i| format!("005{i}")).collect();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..1000 {
            *counts.entry(lottery.pick(&members).unwrap()).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        // Esperado ~250 por membro
        for count in counts.values() {
            assert!((150..=350).contains(count), "contagens: {counts:?}");
        }
    }
}
