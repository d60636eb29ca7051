//! Board controller: per-stage paging plus optimistic moves.
//!
//! DESIGN
//! ======
//! All state sits behind one `std::sync::Mutex` that is only held between
//! awaits, so every step reads the latest committed state before mutating it.
//! A stage in the `loading` set is the per-stage lock that keeps `load_more`
//! from requesting the same page twice.
//!
//! Each reset bumps `generation`. Work started under an older generation
//! (page responses, move rollbacks, lock releases) is dropped when it
//! completes, so a freshly reset board never shows stale pages.
//!
//! A `move_across` racing a `load_more` on the same column is last-writer-wins.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tracing::{debug, warn};

use crate::source::BoardSource;
use crate::types::{BoardItem, ColumnState, Counts};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Construction-time board settings. Stages are fixed for the board's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardConfig {
    pub stages: Vec<String>,
    pub page_size: u32,
}

impl BoardConfig {
    #[must_use]
    pub fn new<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stages: stages.into_iter().map(Into::into).collect(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

struct BoardState<T> {
    generation: u64,
    columns: HashMap<String, ColumnState<T>>,
    counts: Counts,
    loading: HashSet<String>,
}

/// Everything needed to undo one optimistic move.
struct MoveSnapshot<T> {
    item: T,
    from_index: usize,
    from_total: u64,
    to_total: u64,
    from_count: Option<u64>,
    to_count: Option<u64>,
}

pub struct BoardController<T, S> {
    config: BoardConfig,
    source: S,
    state: Mutex<BoardState<T>>,
    _item: PhantomData<fn() -> T>,
}

impl<T, S> BoardController<T, S>
where
    T: BoardItem + Clone,
    S: BoardSource<T>,
{
    /// Create a board with every column empty. Nothing is fetched until
    /// [`initialize_board`](Self::initialize_board).
    pub fn new(config: BoardConfig, source: S) -> Self {
        let columns = config
            .stages
            .iter()
            .map(|stage| (stage.clone(), ColumnState::empty()))
            .collect();
        Self {
            config,
            source,
            state: Mutex::new(BoardState {
                generation: 0,
                columns,
                counts: Counts::new(),
                loading: HashSet::new(),
            }),
            _item: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stages(&self) -> &[String] {
        &self.config.stages
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Snapshot of one column, `None` for an unknown stage.
    pub fn column(&self, stage: &str) -> Option<ColumnState<T>> {
        self.lock().columns.get(stage).cloned()
    }

    /// Snapshot of every column in stage order.
    pub fn columns(&self) -> Vec<(String, ColumnState<T>)> {
        let state = self.lock();
        self.config
            .stages
            .iter()
            .filter_map(|stage| state.columns.get(stage).map(|column| (stage.clone(), column.clone())))
            .collect()
    }

    pub fn counts(&self) -> Counts {
        self.lock().counts.clone()
    }

    /// Reset every column, then load page 1 of each stage and the counts
    /// concurrently. A failing stage only clears its own loading flags.
    pub async fn initialize_board(&self) {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.columns = self
                .config
                .stages
                .iter()
                .map(|stage| {
                    let mut column = ColumnState::empty();
                    column.loading = true;
                    column.initial_loading = true;
                    (stage.clone(), column)
                })
                .collect();
            state.loading = self.config.stages.iter().cloned().collect();
            state.generation
        };

        let pages = join_all(self.config.stages.iter().map(|stage| self.load_page(stage, 1, generation)));
        futures::join!(pages, self.load_counts());
    }

    /// Same as [`initialize_board`](Self::initialize_board); used when an
    /// outside filter changes and every column must restart from page 1.
    pub async fn reset_and_reload(&self) {
        self.initialize_board().await;
    }

    /// Append the next page of `stage`. No-op while that stage is loading or
    /// once it has no further pages.
    pub async fn load_more(&self, stage: &str) {
        let (generation, next_page) = {
            let mut state = self.lock();
            let state = &mut *state;
            let Some(column) = state.columns.get_mut(stage) else {
                debug!(%stage, "load_more on unknown stage");
                return;
            };
            if state.loading.contains(stage) || !column.has_next {
                debug!(%stage, has_next = column.has_next, "load_more skipped");
                return;
            }
            state.loading.insert(stage.to_owned());
            column.loading = true;
            (state.generation, column.page + 1)
        };

        self.load_page(stage, next_page, generation).await;
    }

    async fn load_page(&self, stage: &str, page: u32, generation: u64) {
        let result = self.source.fetch_page(stage, page, self.config.page_size).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!(%stage, page, "discarding page from before reset");
            return;
        }
        state.loading.remove(stage);

        let state = &mut *state;
        let mut on_board: HashSet<String> = state
            .columns
            .values()
            .flat_map(|column| column.items.iter().map(|item| item.id().to_owned()))
            .collect();
        let Some(column) = state.columns.get_mut(stage) else {
            return;
        };
        column.loading = false;
        column.initial_loading = false;

        match result {
            Ok(fetched) => {
                column.page = page;
                column.has_next = fetched.pagination.has_next;
                column.total = fetched.pagination.total;
                let before = column.items.len();
                column
                    .items
                    .extend(fetched.data.into_iter().filter(|item| on_board.insert(item.id().to_owned())));
                debug!(%stage, page, added = column.items.len() - before, "page loaded");
            }
            Err(err) => warn!(%stage, page, error = %err, "page load failed"),
        }
    }

    /// Refresh the aggregate counts. Failures keep the previous counts.
    pub async fn load_counts(&self) {
        match self.source.fetch_counts().await {
            Ok(counts) => self.lock().counts = counts,
            Err(err) => warn!(error = %err, "counts refresh failed"),
        }
    }

    /// Move `item_id` from `from` to `to` at `target_index` (default: top),
    /// updating columns and counts before the source confirms. On rejection
    /// the move is undone; on success counts are re-fetched.
    ///
    /// An item not among `from`'s loaded items is left alone.
    pub async fn move_across(&self, item_id: &str, from: &str, to: &str, target_index: Option<usize>) {
        if from == to {
            debug!(%item_id, %from, "move within the same stage ignored");
            return;
        }

        let (snapshot, generation) = {
            let mut state = self.lock();
            let state = &mut *state;
            if !state.columns.contains_key(to) {
                debug!(%to, "move to unknown stage ignored");
                return;
            }
            let Some(source) = state.columns.get_mut(from) else {
                debug!(%from, "move from unknown stage ignored");
                return;
            };
            let Some(from_index) = source.position(item_id) else {
                debug!(%item_id, %from, "item not loaded in source column; move abandoned");
                return;
            };
            let item = source.items.remove(from_index);
            let from_total = source.total;
            source.total = source.total.saturating_sub(1);

            let Some(dest) = state.columns.get_mut(to) else {
                return;
            };
            let to_total = dest.total;
            let index = target_index.unwrap_or(0).min(dest.items.len());
            dest.items.insert(index, item.clone());
            dest.total += 1;

            let from_count = state.counts.get(from).copied();
            let to_count = state.counts.get(to).copied();
            if let Some(count) = state.counts.get_mut(from) {
                *count = count.saturating_sub(1);
            }
            *state.counts.entry(to.to_owned()).or_insert(0) += 1;

            let snapshot = MoveSnapshot {
                item,
                from_index,
                from_total,
                to_total,
                from_count,
                to_count,
            };
            (snapshot, state.generation)
        };

        match self.source.change_stage(item_id, to).await {
            Ok(()) => self.load_counts().await,
            Err(err) => {
                warn!(%item_id, %from, %to, error = %err, "stage change rejected; rolling back");
                self.rollback_move(from, to, snapshot, generation);
            }
        }
    }

    fn rollback_move(&self, from: &str, to: &str, snapshot: MoveSnapshot<T>, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(%from, %to, "board was reset; dropping move rollback");
            return;
        }
        let state = &mut *state;
        let id = snapshot.item.id().to_owned();

        // A later move already took the item out of `to`; that move owns it now.
        let Some(dest) = state.columns.get_mut(to).filter(|dest| dest.position(&id).is_some()) else {
            debug!(item_id = %id, %from, %to, "item moved on before rejection; dropping move rollback");
            return;
        };
        if let Some(index) = dest.position(&id) {
            dest.items.remove(index);
        }
        dest.total = snapshot.to_total;
        if let Some(source) = state.columns.get_mut(from) {
            if source.position(&id).is_none() {
                let index = snapshot.from_index.min(source.items.len());
                source.items.insert(index, snapshot.item);
            }
            source.total = snapshot.from_total;
        }

        restore_count(&mut state.counts, from, snapshot.from_count);
        restore_count(&mut state.counts, to, snapshot.to_count);
    }

    /// Put `stage`'s loaded items in `ordered_ids` order, then persist it.
    /// Loaded items missing from `ordered_ids` drop out of the local view.
    /// A rejected reorder is logged and kept.
    pub async fn reorder_column(&self, stage: &str, ordered_ids: &[String]) {
        {
            let mut state = self.lock();
            let Some(column) = state.columns.get_mut(stage) else {
                debug!(%stage, "reorder on unknown stage ignored");
                return;
            };
            let mut by_id: HashMap<String, T> = column
                .items
                .drain(..)
                .map(|item| (item.id().to_owned(), item))
                .collect();
            column.items = ordered_ids.iter().filter_map(|id| by_id.remove(id)).collect();
        }

        if let Err(err) = self.source.reorder(stage, ordered_ids).await {
            warn!(%stage, error = %err, "reorder failed; keeping local order");
        }
    }
}

fn restore_count(counts: &mut Counts, stage: &str, previous: Option<u64>) {
    match previous {
        Some(count) => {
            counts.insert(stage.to_owned(), count);
        }
        None => {
            counts.remove(stage);
        }
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
