use crate::MermaidConfig;
use std::cell::Cell;
use std::rc::Rc;

pub const ID_PREFIX: &str = "mermaid-";

/// Produces `mermaid-<n>` identifiers for the diagrams of one pass.
///
/// In deterministic mode the counter starts at the seed's length (in characters), so a fixed seed
/// gives identical id sequences across runs, which keeps snapshot output stable. Otherwise the
/// counter starts at the current Unix time in milliseconds and still advances by one per id, so
/// ids stay distinct within a pass even when the clock does not tick between them. Passes that
/// share a high-water mark ([`IdGenerator::with_high_water`]) never reuse each other's ids.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    deterministic: bool,
    next: u64,
    high_water: Option<Rc<Cell<u64>>>,
}

impl IdGenerator {
    pub fn new(deterministic: bool, seed: Option<&str>) -> Self {
        let next = if deterministic {
            seed.map(|s| s.chars().count() as u64).unwrap_or(0)
        } else {
            u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
        };
        Self {
            deterministic,
            next,
            high_water: None,
        }
    }

    /// Shares `mark` (the first number not yet handed out) with other generators.
    ///
    /// Ignored in deterministic mode, where every pass restarts from the seed.
    pub fn with_high_water(mut self, mark: Rc<Cell<u64>>) -> Self {
        if !self.deterministic {
            self.high_water = Some(mark);
        }
        self
    }

    /// Reads `deterministicIds` / `deterministicIDSeed`.
    pub fn from_config(config: &MermaidConfig) -> Self {
        let seed = config.deterministic_id_seed();
        Self::new(config.deterministic_ids(), seed.as_deref())
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    pub fn next_id(&mut self) -> String {
        if let Some(mark) = &self.high_water {
            self.next = self.next.max(mark.get());
        }
        let n = self.next;
        self.next = self.next.wrapping_add(1);
        if let Some(mark) = &self.high_water {
            mark.set(self.next);
        }
        format!("{ID_PREFIX}{n}")
    }
}

impl Iterator for IdGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.next_id())
    }
}
