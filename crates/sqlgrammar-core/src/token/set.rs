use super::TokenTypeId;

/// Set of token types, stored as a bit set over the dense registry indices
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    words: Vec<u64>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token type, returning true if it was not present
    pub fn insert(&mut self, token: TokenTypeId) -> bool {
        let (word, bit) = Self::position(token);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let added = self.words[word] & mask == 0;
        self.words[word] |= mask;
        added
    }

    pub fn contains(&self, token: TokenTypeId) -> bool {
        let (word, bit) = Self::position(token);
        self.words
            .get(word)
            .map(|w| w & (1u64 << bit) != 0)
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Add every member of `other`, returning true if the set grew
    pub fn union_with(&mut self, other: &TokenSet) -> bool {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | *theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }

    /// Keep only members also present in `other`
    pub fn intersect_with(&mut self, other: &TokenSet) {
        for (i, mine) in self.words.iter_mut().enumerate() {
            *mine &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    pub fn intersects(&self, other: &TokenSet) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(mine, theirs)| mine & theirs != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = TokenTypeId> + '_ {
        self.words.iter().enumerate().flat_map(|(word, bits)| {
            (0..64)
                .filter(move |bit| bits & (1u64 << bit) != 0)
                .map(move |bit| TokenTypeId::new(word * 64 + bit))
        })
    }

    fn position(token: TokenTypeId) -> (usize, usize) {
        (token.index() / 64, token.index() % 64)
    }
}

impl PartialEq for TokenSet {
    fn eq(&self, other: &Self) -> bool {
        let len = self.words.len().max(other.words.len());
        (0..len).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for TokenSet {}

impl FromIterator<TokenTypeId> for TokenSet {
    fn from_iter<I: IntoIterator<Item = TokenTypeId>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}
