use borsh::{BorshDeserialize, BorshSerialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::raffle_error::{RaffleError, RaffleResult};
use crate::raffle_state::{
    EntryId, ParticipantId, RaffleId, RequirementId, Stage, TokenId, WinnerId,
};

/// Id counters
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sequence {
    Raffle,
    Requirement,
    Entry,
    Winner,
}

/// Record address in the backing store
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Sequence(Sequence),
    Raffle(RaffleId),
    Requirement(RequirementId),
    RaffleRequirements(RaffleId),
    Entry(EntryId),
    RaffleEntries(RaffleId),
    ParticipantEntries(ParticipantId),
    Winner(WinnerId),
    RaffleWinners(RaffleId),
    Balance(ParticipantId, TokenId),
    DrawRecord(RaffleId, Stage),
}

/// Byte-level backend. `apply` must persist every write or none of them.
pub trait KeyValue: Send {
    fn get(&self, key: &Key) -> Option<Vec<u8>>;
    fn apply(&mut self, writes: BTreeMap<Key, Vec<u8>>) -> RaffleResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: HashMap<Key, Vec<u8>>,
}

impl KeyValue for MemoryBackend {
    fn get(&self, key: &Key) -> Option<Vec<u8>> {
        self.records.get(key).cloned()
    }

    fn apply(&mut self, writes: BTreeMap<Key, Vec<u8>>) -> RaffleResult<()> {
        self.records.extend(writes);
        Ok(())
    }
}

/// Serializes all access to the backend. Writes made inside `transact` are
/// buffered and only reach the backend when the closure returns `Ok`.
pub struct Store {
    backend: Mutex<Box<dyn KeyValue>>,
}

impl Store {
    pub fn new(backend: impl KeyValue + 'static) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    pub fn transact<T, F>(&self, f: F) -> RaffleResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> RaffleResult<T>,
    {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| RaffleError::Storage("store lock poisoned".to_string()))?;
        let mut tx = Transaction {
            base: &**backend,
            writes: BTreeMap::new(),
        };
        let value = f(&mut tx)?;
        let Transaction { writes, .. } = tx;
        if !writes.is_empty() {
            backend.apply(writes)?;
        }
        Ok(value)
    }

    /// Read-only access; nothing written in `f` is kept
    pub fn view<T, F>(&self, f: F) -> RaffleResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> RaffleResult<T>,
    {
        let backend = self
            .backend
            .lock()
            .map_err(|_| RaffleError::Storage("store lock poisoned".to_string()))?;
        let tx = Transaction {
            base: &**backend,
            writes: BTreeMap::new(),
        };
        f(&tx)
    }
}

pub struct Transaction<'a> {
    base: &'a dyn KeyValue,
    writes: BTreeMap<Key, Vec<u8>>,
}

impl<'a> Transaction<'a> {
    pub fn get<T: BorshDeserialize>(&self, key: &Key) -> RaffleResult<Option<T>> {
        let bytes = match self.writes.get(key) {
            Some(staged) => Some(staged.clone()),
            None => self.base.get(key),
        };
        match bytes {
            Some(bytes) => Ok(Some(T::try_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like `get`, but a missing record is `NotFound(what)`
    pub fn load<T: BorshDeserialize>(&self, key: &Key, what: &'static str) -> RaffleResult<T> {
        self.get(key)?.ok_or(RaffleError::NotFound(what))
    }

    pub fn put<T: BorshSerialize>(&mut self, key: Key, value: &T) -> RaffleResult<()> {
        let bytes = value.try_to_vec()?;
        self.writes.insert(key, bytes);
        Ok(())
    }

    pub fn next_id(&mut self, sequence: Sequence) -> RaffleResult<u64> {
        let key = Key::Sequence(sequence);
        let current: u64 = self.get(&key)?.unwrap_or(0);
        let next = current.checked_add(1).ok_or(RaffleError::Overflow)?;
        self.put(key, &next)?;
        Ok(next)
    }

    pub fn index<I: BorshDeserialize>(&self, key: &Key) -> RaffleResult<Vec<I>> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    pub fn push_index<I>(&mut self, key: Key, id: I) -> RaffleResult<()>
    where
        I: BorshSerialize + BorshDeserialize,
    {
        let mut ids: Vec<I> = self.index(&key)?;
        ids.push(id);
        self.put(key, &ids)
    }
}
