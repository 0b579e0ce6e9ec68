use ethers::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;

pub const COMMON_WORDS: [&str; 40] = [
    "Alpha", "Beta", "Gamma", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliett",
    "Kilo", "Lima", "Mike", "November", "Oscar", "Papa", "Quebec", "Romeo", "Sierra", "Tango",
    "Uniform", "Victor", "Whiskey", "Xray", "Yankee", "Zulu", "Spark", "Nexus", "Quantum", "Hyper",
    "Astro", "Nova", "Flux", "Core", "Zenith", "Pinnacle", "Vortex", "Mirage", "Apex", "Horizon",
];

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Throwaway recipients for demo transfers. The key is dropped immediately,
/// so anything sent there is gone for good.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressGenerator;

impl AddressGenerator {
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Address {
        loop {
            let secret: [u8; 32] = rng.gen();
            // Zero or >= curve order: astronomically rare, just draw again
            if let Ok(wallet) = LocalWallet::from_bytes(&secret) {
                return wallet.address();
            }
        }
    }
}

/// Random names and tickers for the token contracts.
#[derive(Debug, Clone)]
pub struct PhraseGenerator {
    words: Vec<String>,
}

impl Default for PhraseGenerator {
    fn default() -> Self {
        Self::new(COMMON_WORDS.iter().map(|w| w.to_string()).collect())
    }
}

impl PhraseGenerator {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    /// `count` words drawn with replacement, space separated.
    pub fn phrase<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> String {
        (0..count)
            .filter_map(|_| self.words.choose(rng).cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 3 to 5 uppercase ASCII letters.
    pub fn symbol<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let len = rng.gen_range(3..=5);
        (0..len)
            .map(|_| UPPERCASE[rng.gen_range(0..UPPERCASE.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_addresses_are_fresh() {
        let mut rng = StdRng::seed_from_u64(11);
        let gen = AddressGenerator;
        let a = gen.generate(&mut rng);
        let b = gen.generate(&mut rng);
        assert_ne!(a, b);
        assert_ne!(a, Address::zero());
    }

    #[test]
    fn test_phrase_uses_word_list() {
        let mut rng = StdRng::seed_from_u64(3);
        let gen = PhraseGenerator::default();
        let phrase = gen.phrase(2, &mut rng);
        let words: Vec<&str> = phrase.split(' ').collect();
        assert_eq!(words.len(), 2);
        assert!(words.iter().all(|w| COMMON_WORDS.contains(w)));
    }

    #[test]
    fn test_symbol_shape() {
        let mut rng = StdRng::seed_from_u64(5);
        let gen = PhraseGenerator::default();
        for _ in 0..200 {
            let symbol = gen.symbol(&mut rng);
            assert!((3..=5).contains(&symbol.len()), "bad symbol {}", symbol);
            assert!(symbol.chars().all(|c| c.is_ascii_uppercase()));
        }
    }
}
