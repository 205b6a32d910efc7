//! Client-side copy of one resource collection with optimistic mutations.
//!
//! # Design
//! The store never performs I/O. Every network-bound operation is split in
//! two: `begin_*` applies the optimistic change (if any), records what is
//! needed to undo it, and hands back a `PendingRequest`; `complete` takes the
//! host's result for that request and either commits the server's answer or
//! rolls the optimistic change back. Hosts may run any number of pending
//! requests at once and complete them in any order.
//!
//! The collection is a persistent `im::Vector`. Entries are never mutated in
//! place: each change clones the entry, edits the copy, and sets it back, so
//! a snapshot held by a renderer is never altered underneath it.
//!
//! Optimistic creates are matched to their placeholder by a client-generated
//! token, not by position. Operations on the same id are not coalesced; the
//! last one to complete wins.

use std::collections::HashMap;

use im::Vector;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::ResourceClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::{ContentRange, Fields, Item, ItemId, PageRequest};

/// Whether a mutation shows up locally before the server answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Pessimistic,
    Optimistic,
}

/// Identity of an entry: the server id once saved, a correlation token before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Saved(ItemId),
    Unsaved(Uuid),
}

/// Transient per-entry flags for rendering. Never sent to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingState {
    pub saving: bool,
    pub deleting: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    key: EntryKey,
    item: Item,
    saves: u32,
    deletes: u32,
}

impl Entry {
    fn saved(id: ItemId, item: Item) -> Self {
        Self {
            key: EntryKey::Saved(id),
            item,
            saves: 0,
            deletes: 0,
        }
    }

    fn placeholder(token: Uuid, item: Item) -> Self {
        Self {
            key: EntryKey::Unsaved(token),
            item,
            saves: 1,
            deletes: 0,
        }
    }

    pub fn key(&self) -> EntryKey {
        self.key
    }

    pub fn id(&self) -> Option<ItemId> {
        match self.key {
            EntryKey::Saved(id) => Some(id),
            EntryKey::Unsaved(_) => None,
        }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn pending(&self) -> PendingState {
        PendingState {
            saving: self.saves > 0,
            deleting: self.deletes > 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.saves > 0 || self.deletes > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready,
    Errored(ApiError),
}

/// Handle tying a completion back to the operation that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    store: Uuid,
    op: u64,
}

/// A request the host must execute, and the ticket to complete it with.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub ticket: Ticket,
    pub request: HttpRequest,
}

/// What a completed operation did to the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Loaded { count: usize },
    Created(Item),
    Updated(Item),
    Deleted(ItemId),
    /// The store was unmounted, the ticket is unknown, or the load was
    /// superseded. Nothing changed.
    Ignored,
}

#[derive(Debug)]
enum InFlight {
    Load,
    Create {
        placeholder: Option<Uuid>,
    },
    /// `snapshot` is the item before the optimistic merge, when one was made.
    Update {
        id: ItemId,
        snapshot: Option<Item>,
    },
    Delete {
        id: ItemId,
        marked: bool,
    },
}

#[derive(Debug)]
pub struct CollectionStore {
    client: ResourceClient,
    page: Option<PageRequest>,
    store_id: Uuid,
    next_op: u64,
    mounted: bool,
    state: LoadState,
    entries: Vector<Entry>,
    range: Option<ContentRange>,
    in_flight: HashMap<u64, InFlight>,
    latest_load: Option<u64>,
    create_error: Option<ApiError>,
}

impl CollectionStore {
    pub fn new(client: ResourceClient) -> Self {
        Self {
            client,
            page: None,
            store_id: Uuid::new_v4(),
            next_op: 0,
            mounted: true,
            state: LoadState::Uninitialized,
            entries: Vector::new(),
            range: None,
            in_flight: HashMap::new(),
            latest_load: None,
            create_error: None,
        }
    }

    /// Fetch only this window of the collection.
    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = Some(page);
        self
    }

    pub fn client(&self) -> &ResourceClient {
        &self.client
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// The collection, once the fetch has succeeded.
    pub fn collection(&self) -> Option<&Vector<Entry>> {
        match self.state {
            LoadState::Ready => Some(&self.entries),
            _ => None,
        }
    }

    /// Error of the last failed fetch, while the store is in `Errored`.
    pub fn fetch_error(&self) -> Option<&ApiError> {
        match &self.state {
            LoadState::Errored(err) => Some(err),
            _ => None,
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.key == EntryKey::Saved(id))
    }

    /// Window reported by the last successful fetch.
    pub fn range(&self) -> Option<ContentRange> {
        self.range
    }

    pub fn is_creating(&self) -> bool {
        self.in_flight
            .values()
            .any(|op| matches!(op, InFlight::Create { .. }))
    }

    pub fn create_error(&self) -> Option<&ApiError> {
        self.create_error.as_ref()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Begin the initial fetch, unless one has already been started.
    pub fn ensure_loaded(&mut self) -> Option<PendingRequest> {
        match self.state {
            LoadState::Uninitialized if self.mounted => Some(self.begin_load()),
            _ => None,
        }
    }

    /// Begin a fetch. A fetch still in flight is superseded by this one.
    pub fn begin_load(&mut self) -> PendingRequest {
        if self.mounted {
            self.state = LoadState::Loading;
        }
        let request = self.client.build_list(self.page);
        let pending = self.track(InFlight::Load, request);
        if self.mounted {
            self.latest_load = Some(pending.ticket.op);
        }
        pending
    }

    pub fn begin_create(&mut self, fields: Fields, mode: Mode) -> Result<PendingRequest, ApiError> {
        let request = self.client.build_create(&fields)?;
        self.create_error = None;

        let placeholder = match self.local_mode(mode) {
            Mode::Optimistic => {
                let token = Uuid::new_v4();
                self.entries
                    .push_back(Entry::placeholder(token, Item::unsaved(fields)));
                Some(token)
            }
            Mode::Pessimistic => None,
        };
        Ok(self.track(InFlight::Create { placeholder }, request))
    }

    pub fn begin_update(
        &mut self,
        id: ItemId,
        fields: Fields,
        mode: Mode,
    ) -> Result<PendingRequest, ApiError> {
        let request = self.client.build_update(id, &fields)?;

        let snapshot = match self.local_mode(mode) {
            Mode::Optimistic => self.modify(EntryKey::Saved(id), |entry| {
                let before = entry.item.clone();
                entry.item.merge(&fields);
                entry.saves += 1;
                before
            }),
            Mode::Pessimistic => None,
        };
        Ok(self.track(InFlight::Update { id, snapshot }, request))
    }

    pub fn begin_delete(&mut self, id: ItemId, mode: Mode) -> PendingRequest {
        let request = self.client.build_delete(id);

        let marked = match self.local_mode(mode) {
            Mode::Optimistic => self
                .modify(EntryKey::Saved(id), |entry| entry.deletes += 1)
                .is_some(),
            Mode::Pessimistic => false,
        };
        self.track(InFlight::Delete { id, marked }, request)
    }

    /// Reconcile the host's result for `ticket` with the collection.
    ///
    /// Errors are the operation's failure, after any optimistic change has
    /// been rolled back.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<HttpResponse, ApiError>,
    ) -> Result<Outcome, ApiError> {
        if !self.mounted || ticket.store != self.store_id {
            return Ok(Outcome::Ignored);
        }
        let Some(op) = self.in_flight.remove(&ticket.op) else {
            return Ok(Outcome::Ignored);
        };

        match op {
            InFlight::Load => self.finish_load(ticket.op, result),
            InFlight::Create { placeholder } => self.finish_create(placeholder, result),
            InFlight::Update { id, snapshot } => self.finish_update(id, snapshot, result),
            InFlight::Delete { id, marked } => self.finish_delete(id, marked, result),
        }
    }

    /// Execute `pending` through `transport` and complete it.
    pub fn finish_with<T>(
        &mut self,
        transport: &T,
        pending: PendingRequest,
    ) -> Result<Outcome, ApiError>
    where
        T: Transport + ?Sized,
    {
        let result = transport.execute(&pending.request);
        self.complete(pending.ticket, result)
    }

    pub fn load_with<T>(&mut self, transport: &T) -> Result<Outcome, ApiError>
    where
        T: Transport + ?Sized,
    {
        let pending = self.begin_load();
        self.finish_with(transport, pending)
    }

    pub fn create_with<T>(
        &mut self,
        transport: &T,
        fields: Fields,
        mode: Mode,
    ) -> Result<Outcome, ApiError>
    where
        T: Transport + ?Sized,
    {
        let pending = self.begin_create(fields, mode)?;
        self.finish_with(transport, pending)
    }

    pub fn update_with<T>(
        &mut self,
        transport: &T,
        id: ItemId,
        fields: Fields,
        mode: Mode,
    ) -> Result<Outcome, ApiError>
    where
        T: Transport + ?Sized,
    {
        let pending = self.begin_update(id, fields, mode)?;
        self.finish_with(transport, pending)
    }

    pub fn delete_with<T>(
        &mut self,
        transport: &T,
        id: ItemId,
        mode: Mode,
    ) -> Result<Outcome, ApiError>
    where
        T: Transport + ?Sized,
    {
        let pending = self.begin_delete(id, mode);
        self.finish_with(transport, pending)
    }

    /// Discard the collection. Unmounting is final: completions arriving
    /// afterwards are ignored, and later `begin_*` calls still hand out
    /// requests but leave the store untouched.
    pub fn unmount(&mut self) {
        debug!(
            resource = self.client.resource(),
            in_flight = self.in_flight.len(),
            "unmounting collection"
        );
        self.mounted = false;
        self.entries = Vector::new();
        self.in_flight.clear();
        self.latest_load = None;
        self.state = LoadState::Uninitialized;
    }

    fn track(&mut self, op: InFlight, request: HttpRequest) -> PendingRequest {
        self.next_op += 1;
        let ticket = Ticket {
            store: self.store_id,
            op: self.next_op,
        };
        if self.mounted {
            self.in_flight.insert(ticket.op, op);
        }
        PendingRequest { ticket, request }
    }

    /// Optimistic changes are only applied to a mounted collection.
    fn local_mode(&self, mode: Mode) -> Mode {
        if self.mounted {
            mode
        } else {
            Mode::Pessimistic
        }
    }

    fn finish_load(
        &mut self,
        op: u64,
        result: Result<HttpResponse, ApiError>,
    ) -> Result<Outcome, ApiError> {
        if self.latest_load != Some(op) {
            debug!(resource = self.client.resource(), "ignoring superseded fetch");
            return Ok(Outcome::Ignored);
        }
        self.latest_load = None;

        let page = match result.and_then(|response| self.client.parse_list(response)) {
            Ok(page) => page,
            Err(err) => {
                warn!(resource = self.client.resource(), error = %err, "fetch failed");
                self.state = LoadState::Errored(err.clone());
                return Err(err);
            }
        };

        let previous = std::mem::take(&mut self.entries);
        let count = page.items.len();
        for item in page.items {
            let Some(id) = item.id else { continue };
            self.install(id, item, None);
        }

        // In-flight bookkeeping outlives the refetch: keep pending flags on
        // the fresh copies and keep placeholders that are still unsaved.
        for old in previous.iter().filter(|entry| entry.is_pending()) {
            match old.key {
                EntryKey::Saved(_) => {
                    let (saves, deletes) = (old.saves, old.deletes);
                    self.modify(old.key, |entry| {
                        entry.saves = saves;
                        entry.deletes = deletes;
                    });
                }
                EntryKey::Unsaved(_) => self.entries.push_back(old.clone()),
            }
        }

        self.range = page.range;
        self.state = LoadState::Ready;
        debug!(resource = self.client.resource(), count, "fetched collection");
        Ok(Outcome::Loaded { count })
    }

    fn finish_create(
        &mut self,
        placeholder: Option<Uuid>,
        result: Result<HttpResponse, ApiError>,
    ) -> Result<Outcome, ApiError> {
        let placeholder = placeholder.map(EntryKey::Unsaved);

        match result.and_then(|response| self.client.parse_create(response)) {
            Ok(item) => {
                let Some(id) = item.id else {
                    return Err(ApiError::Deserialization("item has no id".to_string()));
                };
                self.install(id, item.clone(), placeholder);
                if placeholder.is_some() {
                    self.settle_save(EntryKey::Saved(id));
                }
                debug!(resource = self.client.resource(), id, "create committed");
                Ok(Outcome::Created(item))
            }
            Err(err) => {
                if let Some(key) = placeholder {
                    self.remove(key);
                    debug!(resource = self.client.resource(), error = %err, "create rolled back");
                }
                self.create_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn finish_update(
        &mut self,
        id: ItemId,
        snapshot: Option<Item>,
        result: Result<HttpResponse, ApiError>,
    ) -> Result<Outcome, ApiError> {
        let key = EntryKey::Saved(id);
        let optimistic = snapshot.is_some();

        match result.and_then(|response| self.client.parse_update(response)) {
            Ok(item) => {
                let committed = item.clone();
                self.modify(key, |entry| entry.item = committed);
                if optimistic {
                    self.settle_save(key);
                }
                debug!(resource = self.client.resource(), id, "update committed");
                Ok(Outcome::Updated(item))
            }
            Err(err) => {
                if let Some(before) = snapshot {
                    self.modify(key, |entry| {
                        entry.item = before;
                        entry.saves = entry.saves.saturating_sub(1);
                    });
                    debug!(resource = self.client.resource(), id, error = %err, "update rolled back");
                }
                Err(err)
            }
        }
    }

    fn finish_delete(
        &mut self,
        id: ItemId,
        marked: bool,
        result: Result<HttpResponse, ApiError>,
    ) -> Result<Outcome, ApiError> {
        let key = EntryKey::Saved(id);

        match result.and_then(|response| self.client.parse_delete(response)) {
            Ok(()) => {
                self.remove(key);
                debug!(resource = self.client.resource(), id, "delete committed");
                Ok(Outcome::Deleted(id))
            }
            Err(err) => {
                if marked {
                    self.modify(key, |entry| entry.deletes = entry.deletes.saturating_sub(1));
                    debug!(resource = self.client.resource(), id, error = %err, "delete rolled back");
                }
                Err(err)
            }
        }
    }

    fn position(&self, key: EntryKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    /// Replace the entry under `key` by an edited copy.
    fn modify<R>(&mut self, key: EntryKey, edit: impl FnOnce(&mut Entry) -> R) -> Option<R> {
        let index = self.position(key)?;
        let mut entry = self.entries[index].clone();
        let result = edit(&mut entry);
        self.entries.set(index, entry);
        Some(result)
    }

    fn remove(&mut self, key: EntryKey) {
        if let Some(index) = self.position(key) {
            self.entries.remove(index);
        }
    }

    fn settle_save(&mut self, key: EntryKey) {
        self.modify(key, |entry| entry.saves = entry.saves.saturating_sub(1));
    }

    /// Put a server item into the collection. It takes the slot of `replacing`
    /// if that entry still exists, else the slot of its current copy, else
    /// the end. Any other copy of the same id is dropped.
    fn install(&mut self, id: ItemId, item: Item, replacing: Option<EntryKey>) {
        let key = EntryKey::Saved(id);
        let slot = replacing
            .and_then(|replacing| self.position(replacing))
            .or_else(|| self.position(key));

        let Some(mut index) = slot else {
            self.entries.push_back(Entry::saved(id, item));
            return;
        };

        let mut entry = self.entries[index].clone();
        entry.key = key;
        entry.item = item;
        self.entries.set(index, entry);

        loop {
            let duplicate = self
                .entries
                .iter()
                .enumerate()
                .position(|(i, entry)| i != index && entry.key == key);
            let Some(duplicate) = duplicate else { break };
            warn!(resource = self.client.resource(), id, "dropping duplicate entry");
            self.entries.remove(duplicate);
            if duplicate < index {
                index -= 1;
            }
        }
    }
}
