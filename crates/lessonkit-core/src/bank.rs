//! Token bank allocator.
//!
//! A bank hands out a finite multiset of tokens to ordered slots. Each token
//! has a stable identity that survives shuffling, so duplicate values (two
//! `"the"` tokens in one sentence) stay distinguishable. A token is either
//! available or placed in exactly one slot; every operation preserves that
//! bijection.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identity of a bank token: its value plus its position in the
/// canonical source sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId {
    pub value: String,
    pub origin: usize,
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.value)
    }
}

/// A token in the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankToken {
    pub id: TokenId,
    pub used: bool,
    /// The slot holding this token, if placed.
    pub slot: Option<usize>,
}

/// Errors from bank operations. None of them mutate the bank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("no token with origin {0} in the bank")]
    UnknownToken(usize),

    #[error("token {0} is already placed")]
    TokenInUse(TokenId),

    #[error("slot {slot} is out of range (bank has {len} slots)")]
    SlotOutOfRange { slot: usize, len: usize },

    #[error("no token is selected")]
    NothingSelected,

    #[error("every slot is already filled")]
    BankFull,
}

/// Allocator of tokens to slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBank {
    /// Tokens indexed by origin.
    tokens: Vec<BankToken>,
    /// Origins in presentation order.
    presentation: Vec<usize>,
    /// Slot contents as origins.
    slots: Vec<Option<usize>>,
    selected: Option<usize>,
}

impl TokenBank {
    /// Build a bank that presents `values` in their given order.
    pub fn new(values: &[String], slot_count: usize) -> Self {
        let tokens = values
            .iter()
            .enumerate()
            .map(|(origin, value)| BankToken {
                id: TokenId {
                    value: value.clone(),
                    origin,
                },
                used: false,
                slot: None,
            })
            .collect();
        Self {
            tokens,
            presentation: (0..values.len()).collect(),
            slots: vec![None; slot_count],
            selected: None,
        }
    }

    /// Build a bank with a freshly shuffled presentation order.
    ///
    /// When `canonical` is set and the shuffle reproduces the canonical value
    /// sequence, the order is perturbed so the answer is never shown pre-solved.
    pub fn shuffled(values: &[String], slot_count: usize, canonical: Option<&[String]>) -> Self {
        Self::shuffled_with(values, slot_count, canonical, &mut rand::rng())
    }

    pub fn shuffled_with<R: Rng + ?Sized>(
        values: &[String],
        slot_count: usize,
        canonical: Option<&[String]>,
        rng: &mut R,
    ) -> Self {
        let mut bank = Self::new(values, slot_count);
        bank.presentation.shuffle(rng);

        if let Some(canonical) = canonical.filter(|_| values.len() > 1) {
            if bank.presents(canonical) {
                bank.presentation.swap(0, 1);
            }
            if bank.presents(canonical) {
                bank.presentation.rotate_left(1);
            }
            if bank.presents(canonical) {
                // Every arrangement spells the answer, e.g. "no no no".
                tracing::debug!(tokens = values.len(), "bank cannot be presented unsolved");
            }
        }
        bank
    }

    fn presents(&self, canonical: &[String]) -> bool {
        self.presentation.len() == canonical.len()
            && self
                .presentation
                .iter()
                .zip(canonical)
                .all(|(&origin, value)| &self.tokens[origin].id.value == value)
    }

    /// Tokens in presentation order.
    pub fn presented(&self) -> impl Iterator<Item = &BankToken> + '_ {
        self.presentation.iter().map(|&origin| &self.tokens[origin])
    }

    /// Tokens not currently placed, in presentation order.
    pub fn available(&self) -> impl Iterator<Item = &BankToken> + '_ {
        self.presented().filter(|t| !t.used)
    }

    pub fn token(&self, origin: usize) -> Option<&BankToken> {
        self.tokens.get(origin)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot contents, `None` for empty slots.
    pub fn slots(&self) -> impl Iterator<Item = Option<&BankToken>> + '_ {
        self.slots
            .iter()
            .map(|slot| slot.map(|origin| &self.tokens[origin]))
    }

    pub fn selected(&self) -> Option<&BankToken> {
        self.selected.map(|origin| &self.tokens[origin])
    }

    /// Origins of placed tokens in slot order, skipping empty slots.
    pub fn placed_origins(&self) -> Vec<usize> {
        self.slots.iter().flatten().copied().collect()
    }

    /// Values of placed tokens in slot order, skipping empty slots.
    pub fn placed_values(&self) -> Vec<String> {
        self.slots
            .iter()
            .flatten()
            .map(|&origin| self.tokens[origin].id.value.clone())
            .collect()
    }

    /// Slot contents as values, empty slots as `""`.
    pub fn slot_values(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| {
                slot.map(|origin| self.tokens[origin].id.value.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Mark an available token as selected. Selecting it again clears the selection.
    pub fn select(&mut self, origin: usize) -> Result<(), BankError> {
        let token = self.tokens.get(origin).ok_or(BankError::UnknownToken(origin))?;
        if token.used {
            return Err(BankError::TokenInUse(token.id.clone()));
        }
        self.selected = if self.selected == Some(origin) {
            None
        } else {
            Some(origin)
        };
        Ok(())
    }

    /// Put a token into a slot.
    ///
    /// A token already placed elsewhere moves; a token already in the target
    /// slot goes back to the bank. Returns the evicted token's origin.
    pub fn place(&mut self, origin: usize, slot: usize) -> Result<Option<usize>, BankError> {
        if origin >= self.tokens.len() {
            return Err(BankError::UnknownToken(origin));
        }
        self.check_slot(slot)?;

        if let Some(previous) = self.tokens[origin].slot {
            self.slots[previous] = None;
        }
        let evicted = self.slots[slot].take().filter(|&o| o != origin);
        if let Some(evicted) = evicted {
            let token = &mut self.tokens[evicted];
            token.used = false;
            token.slot = None;
        }

        self.slots[slot] = Some(origin);
        let token = &mut self.tokens[origin];
        token.used = true;
        token.slot = Some(slot);
        if self.selected == Some(origin) {
            self.selected = None;
        }

        self.debug_check();
        Ok(evicted)
    }

    /// Place the selected token into a slot.
    pub fn place_selected(&mut self, slot: usize) -> Result<Option<usize>, BankError> {
        let origin = self.selected.ok_or(BankError::NothingSelected)?;
        self.place(origin, slot)
    }

    /// Append an available token to the first empty slot. Returns that slot.
    pub fn push(&mut self, origin: usize) -> Result<usize, BankError> {
        let token = self.tokens.get(origin).ok_or(BankError::UnknownToken(origin))?;
        if token.used {
            return Err(BankError::TokenInUse(token.id.clone()));
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(BankError::BankFull)?;
        self.place(origin, slot)?;
        Ok(slot)
    }

    /// Empty a slot, returning its token to the bank.
    pub fn remove(&mut self, slot: usize) -> Result<Option<usize>, BankError> {
        self.check_slot(slot)?;
        let removed = self.slots[slot].take();
        if let Some(origin) = removed {
            let token = &mut self.tokens[origin];
            token.used = false;
            token.slot = None;
        }
        self.debug_check();
        Ok(removed)
    }

    /// Return every token to the bank. Presentation order is kept.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        for token in &mut self.tokens {
            token.used = false;
            token.slot = None;
        }
        self.selected = None;
    }

    fn check_slot(&self, slot: usize) -> Result<(), BankError> {
        if slot >= self.slots.len() {
            return Err(BankError::SlotOutOfRange {
                slot,
                len: self.slots.len(),
            });
        }
        Ok(())
    }

    /// Whether the token/slot bijection holds.
    pub fn is_consistent(&self) -> bool {
        let tokens_agree = self.tokens.iter().enumerate().all(|(origin, token)| {
            token.used == token.slot.is_some()
                && token
                    .slot
                    .map_or(true, |slot| self.slots.get(slot) == Some(&Some(origin)))
        });
        let slots_agree = self.slots.iter().enumerate().all(|(slot, content)| {
            content.map_or(true, |origin| {
                self.tokens.get(origin).and_then(|t| t.slot) == Some(slot)
            })
        });
        let selection_ok = self
            .selected
            .map_or(true, |origin| self.tokens.get(origin).is_some_and(|t| !t.used));
        tokens_agree && slots_agree && selection_ok
    }

    fn debug_check(&self) {
        debug_assert!(self.is_consistent(), "token bank bijection broken: {self:?}");
    }
}
