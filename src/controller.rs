use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::Transport;
use crate::config::ApiConfig;
use crate::derived::{self, DistributionRow};
use crate::error::FetchError;
use crate::filters::{queue_params, FilterState, QueueParams};
use crate::loader::{self, StaticDatasets};
use crate::models::{CustomerRiskRecord, QueuePage};
use crate::queue::{self, Pager, QueueWalk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Static,
    Queue,
}

/// Handed out when a fetch cycle starts; its result is only applied if no
/// newer cycle on the same stream has started since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTicket {
    pub stream: Stream,
    pub generation: u64,
}

/// How the current customer collection was retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Nothing committed yet.
    #[default]
    Empty,
    /// The batched walk: every row up to the cap is held in memory.
    Walked,
    /// One server page of `pager.page_size` rows.
    Paged,
}

/// Dashboard state: filters, fetched datasets, paging and status.
#[derive(Debug)]
pub struct Dashboard {
    pub config: ApiConfig,
    pub filters: FilterState,
    pub datasets: StaticDatasets,
    pub customers: Vec<CustomerRiskRecord>,
    pub pager: Pager,
    pub mode: QueueMode,
    pub error: Option<String>,
    in_flight: usize,
    static_generation: u64,
    queue_generation: u64,
}

impl Dashboard {
    pub fn new(config: ApiConfig, filters: FilterState) -> Self {
        let pager = Pager::new(config.page_size);
        Self {
            config,
            filters,
            datasets: StaticDatasets::default(),
            customers: Vec::new(),
            pager,
            mode: QueueMode::Empty,
            error: None,
            in_flight: 0,
            static_generation: 0,
            queue_generation: 0,
        }
    }

    pub fn loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn begin(&mut self, stream: Stream) -> CycleTicket {
        let generation = match stream {
            Stream::Static => {
                self.static_generation += 1;
                self.static_generation
            }
            Stream::Queue => {
                self.queue_generation += 1;
                self.queue_generation
            }
        };
        self.in_flight += 1;
        if stream == Stream::Queue {
            self.error = None;
        }
        CycleTicket { stream, generation }
    }

    fn settle(&mut self, ticket: CycleTicket) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        let current = match ticket.stream {
            Stream::Static => self.static_generation,
            Stream::Queue => self.queue_generation,
        };
        let fresh = ticket.generation == current;
        if !fresh {
            debug!(?ticket, current, "discarding stale response");
        }
        fresh
    }

    /// Replaces every static dataset at once. Returns whether it was applied.
    pub fn commit_static(&mut self, ticket: CycleTicket, datasets: StaticDatasets) -> bool {
        if !self.settle(ticket) {
            return false;
        }
        self.datasets = datasets;
        true
    }

    /// Applies a single-page result. On failure the previous rows stay.
    pub fn commit_page(
        &mut self,
        ticket: CycleTicket,
        page_index: usize,
        result: Result<QueuePage, FetchError>,
    ) -> bool {
        if !self.settle(ticket) {
            return false;
        }
        match result {
            Ok(page) => {
                self.customers = page.items;
                self.mode = QueueMode::Paged;
                self.pager.page = page_index;
                self.pager.total = page.total;
                info!(
                    page = page_index,
                    offset = page.offset,
                    total = page.total,
                    rows = self.customers.len(),
                    "queue page committed"
                );
            }
            Err(err) => self.fail(err),
        }
        true
    }

    /// Applies a batched walk. On failure the previous rows stay.
    pub fn commit_walk(&mut self, ticket: CycleTicket, result: Result<QueueWalk, FetchError>) -> bool {
        if !self.settle(ticket) {
            return false;
        }
        match result {
            Ok(walk) => {
                self.customers = walk.records;
                self.mode = QueueMode::Walked;
                self.pager.page = 0;
                self.pager.total = walk.total;
            }
            Err(err) => self.fail(err),
        }
        true
    }

    fn fail(&mut self, err: FetchError) {
        warn!(error = %err, "queue fetch failed; keeping previous rows");
        self.error = Some(format!("Erro ao carregar dados: {err}"));
    }

    pub fn params(&self, offset: usize, limit: usize) -> QueueParams {
        queue_params(&self.filters.queue, offset, limit)
    }

    /// Mount-time load and manual refresh: static datasets plus the full
    /// batched queue, side by side, under one loading flag.
    pub async fn refresh<T: Transport>(&mut self, transport: &T) {
        let static_ticket = self.begin(Stream::Static);
        let queue_ticket = self.begin(Stream::Queue);
        let params = self.params(0, self.config.batch_size);
        let (batch, cap) = (self.config.batch_size, self.config.batch_cap);

        let (datasets, walk) = tokio::join!(
            loader::load_static(transport),
            queue::fetch_all(transport, &params, batch, cap)
        );

        self.commit_static(static_ticket, datasets);
        self.commit_walk(queue_ticket, walk);
    }

    /// Fetches one page of the queue with the current filters. A page whose
    /// offset does not fit in `usize` is a no-op and returns `false`.
    ///
    /// After a batched walk this switches the collection to paged mode: the
    /// walked rows are replaced by the requested page.
    pub async fn load_page<T: Transport>(&mut self, transport: &T, page_index: usize) -> bool {
        let size = self.pager.page_size;
        let Some(offset) = page_index.checked_mul(size) else {
            warn!(page = page_index, "page offset out of range; ignoring");
            return false;
        };
        let ticket = self.begin(Stream::Queue);
        let params = self.params(offset, size);
        let result = queue::fetch_page(transport, &params).await;
        self.commit_page(ticket, page_index, result);
        true
    }

    /// Moves forward one page; a no-op past the known total.
    pub async fn next_page<T: Transport>(&mut self, transport: &T) -> bool {
        match self.pager.next() {
            Some(page) => self.load_page(transport, page).await,
            None => false,
        }
    }

    /// Moves back one page; a no-op at page zero.
    pub async fn prev_page<T: Transport>(&mut self, transport: &T) -> bool {
        match self.pager.prev() {
            Some(page) => self.load_page(transport, page).await,
            None => false,
        }
    }

    pub fn queue_view(&self) -> Vec<&CustomerRiskRecord> {
        derived::prioritized_queue(
            &self.customers,
            self.filters.threshold(),
            self.filters.category.as_deref(),
        )
    }

    pub fn distribution_view(&self) -> Vec<DistributionRow> {
        derived::distribution(self.datasets.summaries.get(self.filters.dimension))
    }

    pub fn revenue_at_risk(&self) -> f64 {
        derived::revenue_at_risk(&self.datasets.renewal, &self.filters.window)
    }
}

/// Delivers a value only after `delay` passes without a newer one.
/// Scheduling cancels whatever was pending.
pub struct Debouncer<T> {
    delay: Duration,
    seq: u64,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<(u64, T)>,
    rx: mpsc::UnboundedReceiver<(u64, T)>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            delay,
            seq: 0,
            pending: None,
            tx,
            rx,
        }
    }

    pub fn schedule(&mut self, value: T) {
        self.cancel();
        let seq = self.seq;
        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((seq, value));
        }));
    }

    pub fn cancel(&mut self) {
        self.seq += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Waits for the latest scheduled value. Values from cancelled timers
    /// that were already in the channel are skipped.
    pub async fn settled(&mut self) -> T {
        while let Some((seq, value)) = self.rx.recv().await {
            if seq == self.seq {
                self.pending = None;
                return value;
            }
        }
        // `self.tx` keeps the channel open, so this is unreachable.
        std::future::pending().await
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
