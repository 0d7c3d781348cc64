// ABOUTME: SLR(1) table construction (FIRST/FOLLOW, item sets, action/goto) for the fixed grammar

use crate::error::ParseError;
use crate::grammar::{NonTerminal, Production, Symbol};
use crate::token::{Position, TokenKind};
use std::collections::{BTreeMap, BTreeSet};

pub type StateId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shift(StateId),
    Reduce(usize),
    Accept,
}

/// An LR(0) item: a production together with a dot position marking how
/// much of its rhs has already been matched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Item {
    rule: usize,
    dot: usize,
}

impl Item {
    fn symbol_after_dot(&self, productions: &[Production]) -> Option<Symbol> {
        productions[self.rule].rhs.get(self.dot).copied()
    }

    fn advanced(&self) -> Item {
        Item {
            rule: self.rule,
            dot: self.dot + 1,
        }
    }
}

type ItemSet = BTreeSet<Item>;

/// The fully computed `action`/`goto` tables plus the production list they
/// reference, produced once at startup and reused for every parse.
pub struct Table {
    pub productions: Vec<Production>,
    action: Vec<BTreeMap<TokenKind, Action>>,
    goto: Vec<BTreeMap<NonTerminal, StateId>>,
    start_rule: usize,
}

#[derive(Debug)]
pub enum GrammarError {
    ShiftReduceConflict {
        state: StateId,
        terminal: TokenKind,
    },
    ReduceReduceConflict {
        state: StateId,
        terminal: TokenKind,
    },
}

impl std::fmt::Display for GrammarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarError::ShiftReduceConflict { state, terminal } => {
                write!(f, "shift/reduce conflict in state {state} on {terminal}")
            }
            GrammarError::ReduceReduceConflict { state, terminal } => {
                write!(f, "reduce/reduce conflict in state {state} on {terminal}")
            }
        }
    }
}

impl Table {
    /// Builds the canonical SLR(1) collection and derives `action`/`goto`
    /// from it. The grammar is stratified by precedence level (one
    /// nonterminal per level, each left-recursive production mirroring the
    /// next-tighter level), a standard construction that is conflict-free
    /// under SLR(1); a conflict here indicates the fixed grammar itself was
    /// changed incorrectly, so it is surfaced as a build-time error rather
    /// than silently favoring one action.
    pub fn build(productions: Vec<Production>, start: NonTerminal) -> Result<Table, GrammarError> {
        let first = compute_first(&productions);
        let follow = compute_follow(&productions, &first, start);

        // Augment with a synthetic start rule `Start' -> start $` conceptually;
        // we instead rely on `start_rule` being the grammar's own `Start -> Or`
        // production (index 0) and detect acceptance when it is reduced with
        // an empty remaining stack, i.e. when `Start` is goto'd from state 0.
        let start_rule = productions
            .iter()
            .position(|p| p.lhs == NonTerminal::Start)
            .expect("grammar must define an augmented Start production");

        let initial_item = Item {
            rule: start_rule,
            dot: 0,
        };
        let initial_set = closure(&productions, [initial_item].into_iter().collect());

        let mut states: Vec<ItemSet> = vec![initial_set];
        let mut action: Vec<BTreeMap<TokenKind, Action>> = vec![BTreeMap::new()];
        let mut goto: Vec<BTreeMap<NonTerminal, StateId>> = vec![BTreeMap::new()];

        let mut worklist = vec![0usize];
        while let Some(state_id) = worklist.pop() {
            let symbols = outgoing_symbols(&states[state_id], &productions);
            for sym in symbols {
                let target = goto_set(&states[state_id], &productions, sym);
                if target.is_empty() {
                    continue;
                }
                let target_id = match states.iter().position(|s| *s == target) {
                    Some(id) => id,
                    None => {
                        states.push(target);
                        action.push(BTreeMap::new());
                        goto.push(BTreeMap::new());
                        let id = states.len() - 1;
                        worklist.push(id);
                        id
                    }
                };
                match sym {
                    Symbol::Terminal(tk) => {
                        insert_action(&mut action, state_id, tk, Action::Shift(target_id))?;
                    }
                    Symbol::NonTerminal(nt) => {
                        goto[state_id].insert(nt, target_id);
                    }
                }
            }

            for item in &states[state_id] {
                let prod = &productions[item.rule];
                if item.dot == prod.rhs.len() {
                    if item.rule == start_rule {
                        insert_action(&mut action, state_id, TokenKind::Eof, Action::Accept)?;
                    } else {
                        for &terminal in &follow[&prod.lhs] {
                            insert_action(
                                &mut action,
                                state_id,
                                terminal,
                                Action::Reduce(item.rule),
                            )?;
                        }
                    }
                }
            }
        }

        Ok(Table {
            productions,
            action,
            goto,
            start_rule,
        })
    }

    pub fn action(&self, state: StateId, terminal: TokenKind) -> Option<Action> {
        self.action.get(state)?.get(&terminal).copied()
    }

    pub fn goto(&self, state: StateId, nt: NonTerminal) -> Option<StateId> {
        self.goto.get(state)?.get(&nt).copied()
    }

    pub fn expected_terminals(&self, state: StateId) -> Vec<TokenKind> {
        self.action
            .get(state)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn start_rule(&self) -> usize {
        self.start_rule
    }
}

fn insert_action(
    action: &mut [BTreeMap<TokenKind, Action>],
    state: StateId,
    terminal: TokenKind,
    new_action: Action,
) -> Result<(), GrammarError> {
    if let Some(existing) = action[state].get(&terminal) {
        if *existing != new_action {
            return Err(match (existing, new_action) {
                (Action::Shift(_), Action::Reduce(_)) | (Action::Reduce(_), Action::Shift(_)) => {
                    GrammarError::ShiftReduceConflict { state, terminal }
                }
                _ => GrammarError::ReduceReduceConflict { state, terminal },
            });
        }
        return Ok(());
    }
    action[state].insert(terminal, new_action);
    Ok(())
}

fn closure(productions: &[Production], mut items: ItemSet) -> ItemSet {
    loop {
        let mut added = Vec::new();
        for item in &items {
            if let Some(Symbol::NonTerminal(nt)) = item.symbol_after_dot(productions) {
                for (rule, prod) in productions.iter().enumerate() {
                    if prod.lhs == nt {
                        let candidate = Item { rule, dot: 0 };
                        if !items.contains(&candidate) {
                            added.push(candidate);
                        }
                    }
                }
            }
        }
        if added.is_empty() {
            return items;
        }
        items.extend(added);
    }
}

fn outgoing_symbols(items: &ItemSet, productions: &[Production]) -> BTreeSet<Symbol> {
    items
        .iter()
        .filter_map(|item| item.symbol_after_dot(productions))
        .collect()
}

fn goto_set(items: &ItemSet, productions: &[Production], symbol: Symbol) -> ItemSet {
    let advanced: ItemSet = items
        .iter()
        .filter(|item| item.symbol_after_dot(productions) == Some(symbol))
        .map(Item::advanced)
        .collect();
    closure(productions, advanced)
}

fn compute_first(productions: &[Production]) -> BTreeMap<NonTerminal, BTreeSet<TokenKind>> {
    let mut first: BTreeMap<NonTerminal, BTreeSet<TokenKind>> = BTreeMap::new();
    let nonterminals: BTreeSet<NonTerminal> = productions.iter().map(|p| p.lhs).collect();
    for nt in &nonterminals {
        first.insert(*nt, BTreeSet::new());
    }

    let mut nullable: BTreeSet<NonTerminal> = BTreeSet::new();

    let mut changed = true;
    while changed {
        changed = false;
        for prod in productions {
            let mut all_nullable_so_far = true;
            for sym in &prod.rhs {
                match sym {
                    Symbol::Terminal(tk) => {
                        changed |= first.get_mut(&prod.lhs).unwrap().insert(*tk);
                        all_nullable_so_far = false;
                        break;
                    }
                    Symbol::NonTerminal(nt) => {
                        let addition: Vec<TokenKind> =
                            first.get(nt).cloned().unwrap_or_default().into_iter().collect();
                        for tk in addition {
                            changed |= first.get_mut(&prod.lhs).unwrap().insert(tk);
                        }
                        if !nullable.contains(nt) {
                            all_nullable_so_far = false;
                            break;
                        }
                    }
                }
            }
            if prod.rhs.is_empty() || all_nullable_so_far {
                changed |= nullable.insert(prod.lhs);
            }
        }
    }

    first
}

fn compute_follow(
    productions: &[Production],
    first: &BTreeMap<NonTerminal, BTreeSet<TokenKind>>,
    start: NonTerminal,
) -> BTreeMap<NonTerminal, BTreeSet<TokenKind>> {
    let mut follow: BTreeMap<NonTerminal, BTreeSet<TokenKind>> = BTreeMap::new();
    for prod in productions {
        follow.entry(prod.lhs).or_default();
    }
    follow.entry(start).or_default().insert(TokenKind::Eof);

    let nullable_first = |sym: &Symbol| -> (BTreeSet<TokenKind>, bool) {
        match sym {
            Symbol::Terminal(tk) => {
                let mut s = BTreeSet::new();
                s.insert(*tk);
                (s, false)
            }
            Symbol::NonTerminal(nt) => (first.get(nt).cloned().unwrap_or_default(), false),
        }
    };

    let mut changed = true;
    while changed {
        changed = false;
        for prod in productions {
            for (i, sym) in prod.rhs.iter().enumerate() {
                if let Symbol::NonTerminal(b) = sym {
                    let rest = &prod.rhs[i + 1..];
                    let mut trailer_nullable = true;
                    let mut additions: BTreeSet<TokenKind> = BTreeSet::new();

                    for rsym in rest {
                        let (f, _) = nullable_first(rsym);
                        additions.extend(f);
                        let is_nullable_nt = matches!(rsym, Symbol::NonTerminal(n) if is_nullable(n, productions));
                        if !is_nullable_nt {
                            trailer_nullable = false;
                            break;
                        }
                    }

                    let entry = follow.entry(*b).or_default();
                    for tk in additions {
                        changed |= entry.insert(tk);
                    }
                    if trailer_nullable {
                        let lhs_follow: Vec<TokenKind> =
                            follow.get(&prod.lhs).cloned().unwrap_or_default().into_iter().collect();
                        let entry = follow.entry(*b).or_default();
                        for tk in lhs_follow {
                            changed |= entry.insert(tk);
                        }
                    }
                }
            }
        }
    }

    follow
}

fn is_nullable(nt: &NonTerminal, productions: &[Production]) -> bool {
    // Only `ArgList` is nullable in this grammar (it allows zero arguments).
    productions
        .iter()
        .any(|p| p.lhs == *nt && p.rhs.is_empty())
}

pub fn unexpected_token_error(kind: TokenKind, position: Position) -> ParseError {
    ParseError::UnexpectedToken { kind, position }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{productions, start_symbol};

    #[test]
    fn builds_without_conflicts() {
        let table = Table::build(productions(), start_symbol());
        assert!(table.is_ok(), "grammar should be SLR(1): {:?}", table.err());
    }

    #[test]
    fn start_state_shifts_on_number() {
        let table = Table::build(productions(), start_symbol()).unwrap();
        assert!(matches!(
            table.action(0, TokenKind::Number),
            Some(Action::Shift(_))
        ));
    }

    #[test]
    fn start_state_shifts_on_minus_for_unary() {
        let table = Table::build(productions(), start_symbol()).unwrap();
        assert!(matches!(
            table.action(0, TokenKind::Minus),
            Some(Action::Shift(_))
        ));
    }
}
