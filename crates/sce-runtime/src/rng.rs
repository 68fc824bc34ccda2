/// Seeded mulberry32 generator shared by every runner of one manager, so a
/// fixed `random_seed` replays the same `VarSetRandomValue` results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRng {
    state: u32,
}

impl ScriptRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut next = self.state.wrapping_add(0x6d2b79f5);
        self.state = next;
        next = (next ^ (next >> 15)).wrapping_mul(next | 1);
        next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
        next ^ (next >> 14)
    }

    /// Uniform value in `[0, exclusive_max)`. A non-positive max rolls 0
    /// without advancing the generator.
    pub fn roll(&mut self, exclusive_max: i32) -> i32 {
        let bound = match u32::try_from(exclusive_max) {
            Ok(bound) if bound > 0 => bound,
            _ => return 0,
        };
        // 2^32 mod bound; draws in that top slice would favor low residues.
        let skew = (u32::MAX - bound + 1) % bound;
        loop {
            let draw = self.next_u32();
            if draw <= u32::MAX - skew {
                return (draw % bound) as i32;
            }
        }
    }
}
