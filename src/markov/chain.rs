use std::collections::{BTreeMap, HashMap};

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Default bound on the length of one generated line, in tokens.
pub const DEFAULT_MAX_TOKENS: usize = 100;

/// An order-1 Markov chain over whitespace-separated tokens.
///
/// `None` marks the start and the end of a message, so every walk begins
/// with a token that started some message and stops where one ended.
#[derive(Clone, Debug, Default)]
pub struct MarkovChain {
    transitions: HashMap<Option<String>, BTreeMap<Option<String>, usize>>,
    messages: usize,
}

impl MarkovChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn one message from its text.
    pub fn add_message(&mut self, text: &str) {
        self.add_tokens(text.split_whitespace());
    }

    /// Learn one already tokenized message. Empty tokens are skipped; a
    /// message without tokens is ignored.
    pub fn add_tokens<I, T>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut states: Vec<Option<String>> = vec![None];
        states.extend(
            tokens
                .into_iter()
                .map(Into::into)
                .filter(|token| !token.is_empty())
                .map(Some),
        );
        if states.len() == 1 {
            return;
        }
        states.push(None);

        for pair in states.windows(2) {
            *self
                .transitions
                .entry(pair[0].clone())
                .or_default()
                .entry(pair[1].clone())
                .or_insert(0) += 1;
        }
        self.messages += 1;
    }

    /// Messages learned so far.
    pub fn message_count(&self) -> usize {
        self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages == 0
    }

    /// Generate a line using the thread-local RNG.
    pub fn generate(&self, max_tokens: usize) -> Option<String> {
        self.generate_with(&mut rand::thread_rng(), max_tokens)
    }

    /// Weighted random walk from the start state, stopping at an end state
    /// or after `max_tokens` tokens. `None` if nothing has been learned.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R, max_tokens: usize) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut words: Vec<&str> = Vec::new();
        let mut previous: Option<String> = None;
        while words.len() < max_tokens {
            match self.next(&previous, rng) {
                Some(Some(word)) => {
                    words.push(word);
                    previous = Some(word.to_owned());
                }
                _ => break,
            }
        }

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }

    fn next<R: Rng + ?Sized>(&self, previous: &Option<String>, rng: &mut R) -> Option<Option<&str>> {
        let successors = self.transitions.get(previous)?;
        let dist = WeightedIndex::<usize>::new(successors.values()).ok()?;
        successors
            .keys()
            .nth(dist.sample(rng))
            .map(|token| token.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_chain_generates_nothing() {
        let chain = MarkovChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.generate(DEFAULT_MAX_TOKENS), None);
    }

    #[test]
    fn test_blank_messages_are_ignored() {
        let mut chain = MarkovChain::new();
        chain.add_message("");
        chain.add_message("   ");
        chain.add_tokens(vec!["", ""]);
        assert_eq!(chain.message_count(), 0);
        assert_eq!(chain.generate(DEFAULT_MAX_TOKENS), None);
    }

    #[test]
    fn test_single_message_is_reproduced() {
        let mut chain = MarkovChain::new();
        chain.add_message("hello   there chat");
        assert_eq!(chain.message_count(), 1);
        assert_eq!(
            chain.generate(DEFAULT_MAX_TOKENS).as_deref(),
            Some("hello there chat")
        );
    }

    #[test]
    fn test_walk_is_capped() {
        let mut chain = MarkovChain::new();
        chain.add_message("a b c d e f");
        assert_eq!(chain.generate(3).as_deref(), Some("a b c"));
        assert_eq!(chain.generate(0), None);
    }

    #[test]
    fn test_generated_tokens_follow_learned_transitions() {
        let mut chain = MarkovChain::new();
        chain.add_message("the cat sat");
        chain.add_message("the dog sat down");
        chain.add_message("a cat ran");

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let line = chain.generate_with(&mut rng, DEFAULT_MAX_TOKENS).unwrap();
            let words: Vec<&str> = line.split(' ').collect();
            assert!(matches!(words[0], "the" | "a"));
            assert!(matches!(*words.last().unwrap(), "sat" | "down" | "ran"));
            for pair in words.windows(2) {
                let successors = &chain.transitions[&Some(pair[0].to_owned())];
                assert!(successors.contains_key(&Some(pair[1].to_owned())));
            }
        }
    }

    #[test]
    fn test_seeded_generation_is_repeatable() {
        let mut chain = MarkovChain::new();
        for line in ["one two three", "one three two", "two one three", "three two one"] {
            chain.add_message(line);
        }

        let first = chain.generate_with(&mut StdRng::seed_from_u64(42), 20);
        let second = chain.generate_with(&mut StdRng::seed_from_u64(42), 20);
        assert_eq!(first, second);
    }
}
