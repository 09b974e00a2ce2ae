//! Static fallback chains
//!
//! The map is a DAG of "try this next" edges. A provider's chain is its
//! direct list followed by the breadth-first expansion of the graph,
//! deduplicated and capped. Sinks (providers with no outgoing edges) fall
//! back to the terminal list, which is never expanded further.

use statroute_core::Provider;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::tables::{RoutingTables, TableError};

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackMap {
    direct: BTreeMap<Provider, Vec<Provider>>,
    terminal: Vec<Provider>,
    chains: HashMap<Provider, Vec<Provider>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl FallbackMap {
    pub fn from_tables(tables: &RoutingTables) -> Result<Self, TableError> {
        Self::new(
            tables.fallbacks.clone(),
            tables.terminal_fallbacks.clone(),
            tables.max_fallbacks,
        )
    }

    /// Validate the graph and precompute every provider's chain
    pub fn new(
        direct: BTreeMap<Provider, Vec<Provider>>,
        terminal: Vec<Provider>,
        max_fallbacks: usize,
    ) -> Result<Self, TableError> {
        if max_fallbacks == 0 {
            return Err(TableError::ZeroMaxFallbacks);
        }

        for (provider, fallbacks) in &direct {
            let mut seen = HashSet::new();
            for fallback in fallbacks {
                if fallback == provider {
                    return Err(TableError::SelfFallback(*provider));
                }
                if !seen.insert(*fallback) {
                    return Err(TableError::DuplicateFallback {
                        provider: *provider,
                        fallback: *fallback,
                    });
                }
            }
        }

        let distinct_terminal: HashSet<Provider> = terminal.iter().copied().collect();
        if distinct_terminal.len() < 2 {
            return Err(TableError::TerminalTooShort(distinct_terminal.len()));
        }

        detect_cycle(&direct)?;

        let mut map = Self {
            direct,
            terminal,
            chains: HashMap::new(),
        };
        for provider in Provider::ALL {
            let chain = map.expand(provider, max_fallbacks);
            map.chains.insert(provider, chain);
        }
        Ok(map)
    }

    /// Ordered fallbacks for `provider`; never empty, never contains `provider`
    pub fn chain(&self, provider: Provider) -> &[Provider] {
        self.chains.get(&provider).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct (unexpanded) fallbacks as configured
    pub fn direct(&self, provider: Provider) -> &[Provider] {
        self.direct.get(&provider).map(Vec::as_slice).unwrap_or(&[])
    }

    fn expand(&self, provider: Provider, max_fallbacks: usize) -> Vec<Provider> {
        let mut chain = Vec::new();
        let mut visited: HashSet<Provider> = HashSet::from([provider]);
        let mut queue: VecDeque<Provider> = self.direct(provider).iter().copied().collect();

        while let Some(next) = queue.pop_front() {
            if chain.len() >= max_fallbacks {
                break;
            }
            if !visited.insert(next) {
                continue;
            }
            chain.push(next);
            queue.extend(self.direct(next).iter().copied());
        }

        if chain.is_empty() {
            chain = self
                .terminal
                .iter()
                .copied()
                .filter(|p| *p != provider)
                .fold(Vec::new(), |mut acc, p| {
                    if !acc.contains(&p) {
                        acc.push(p);
                    }
                    acc
                });
            chain.truncate(max_fallbacks);
        }
        chain
    }
}

/// Depth-first search with three-colour marking; reports the first cycle found
fn detect_cycle(direct: &BTreeMap<Provider, Vec<Provider>>) -> Result<(), TableError> {
    fn visit(
        node: Provider,
        direct: &BTreeMap<Provider, Vec<Provider>>,
        marks: &mut HashMap<Provider, Mark>,
        stack: &mut Vec<Provider>,
    ) -> Result<(), TableError> {
        match marks.get(&node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|p| *p == node).unwrap_or(0);
                let mut path = stack[start..].to_vec();
                path.push(node);
                return Err(TableError::FallbackCycle { path });
            }
            None => {}
        }

        marks.insert(node, Mark::Visiting);
        stack.push(node);
        if let Some(edges) = direct.get(&node) {
            for next in edges {
                visit(*next, direct, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    for provider in direct.keys() {
        visit(*provider, direct, &mut marks, &mut stack)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use Provider::*;

    fn embedded() -> FallbackMap {
        FallbackMap::from_tables(&RoutingTables::embedded().unwrap()).unwrap()
    }

    #[test]
    fn test_every_chain_is_non_empty_and_clean() {
        let map = embedded();
        for provider in Provider::ALL {
            let chain = map.chain(provider);
            assert!(!chain.is_empty(), "{} has no fallbacks", provider);
            assert!(!chain.contains(&provider), "{} falls back to itself", provider);

            let distinct: HashSet<_> = chain.iter().collect();
            assert_eq!(distinct.len(), chain.len(), "{} chain has duplicates", provider);
        }
    }

    #[test]
    fn test_transitive_walk_never_returns_to_origin() {
        let map = embedded();
        for origin in Provider::ALL {
            let mut stack: Vec<Provider> = map.direct(origin).to_vec();
            let mut seen = HashSet::new();
            while let Some(next) = stack.pop() {
                assert_ne!(next, origin, "cycle back to {}", origin);
                if seen.insert(next) {
                    stack.extend(map.direct(next).iter().copied());
                }
            }
        }
    }

    #[test]
    fn test_chain_is_breadth_first_and_capped() {
        let map = embedded();
        // COINGECKO -> EXCHANGERATE -> (FRED, IMF) -> (OECD, WORLDBANK)
        assert_eq!(map.chain(CoinGecko), &[ExchangeRate, Fred, Imf, Oecd]);
        assert_eq!(map.chain(Imf), &[WorldBank]);
    }

    #[test]
    fn test_sink_uses_terminal_list() {
        let map = embedded();
        assert!(map.direct(WorldBank).is_empty());
        assert_eq!(map.chain(WorldBank), &[Imf, Oecd]);
    }

    #[test]
    fn test_terminal_member_sink_skips_itself() {
        let direct = BTreeMap::from([(Imf, vec![])]);
        let map = FallbackMap::new(direct, vec![Imf, Oecd, Imf], 4).unwrap();
        assert_eq!(map.chain(Imf), &[Oecd]);
        assert_eq!(map.chain(Bis), &[Imf, Oecd]);
    }

    #[test]
    fn test_rejects_self_fallback() {
        let direct = BTreeMap::from([(Imf, vec![WorldBank, Imf])]);
        assert!(matches!(
            FallbackMap::new(direct, vec![Imf, Oecd], 4),
            Err(TableError::SelfFallback(Imf))
        ));
    }

    #[test]
    fn test_rejects_duplicate_fallback() {
        let direct = BTreeMap::from([(Imf, vec![WorldBank, WorldBank])]);
        assert!(matches!(
            FallbackMap::new(direct, vec![Imf, Oecd], 4),
            Err(TableError::DuplicateFallback { .. })
        ));
    }

    #[test]
    fn test_rejects_cycle_with_path() {
        let direct = BTreeMap::from([
            (Fred, vec![Imf]),
            (Imf, vec![WorldBank]),
            (WorldBank, vec![Fred]),
        ]);
        let err = FallbackMap::new(direct, vec![Imf, Oecd], 4).unwrap_err();
        match err {
            TableError::FallbackCycle { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn test_rejects_short_terminal_and_zero_cap() {
        assert!(matches!(
            FallbackMap::new(BTreeMap::new(), vec![Imf, Imf], 4),
            Err(TableError::TerminalTooShort(1))
        ));
        assert!(matches!(
            FallbackMap::new(BTreeMap::new(), vec![Imf, Oecd], 0),
            Err(TableError::ZeroMaxFallbacks)
        ));
    }
}
